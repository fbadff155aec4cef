//! Flow 2 device session.
//!
//! A [`Session`] owns the connection to one device and enforces the
//! lifecycle around it: it is created disconnected, `connect()` acquires the
//! transport handle, and every other operation checks the session state
//! before touching Bluetooth. Live streaming and history fetching are
//! mutually exclusive on one session.
//!
//! Sessions are not meant for concurrent use: operations take `&mut self`,
//! so a single owner serializes them by construction. Wrap access in your
//! own synchronization if several tasks must share one device.

use std::sync::Arc;

use time::OffsetDateTime;
use tracing::{debug, info, warn};

use flow_types::protocol::decode_live_pm_value;
use flow_types::uuid::{BATTERY_LEVEL, LIVE_DATA};

use crate::error::{ConnectionFailureReason, Error, Result};
use crate::transport::{BleTransport, ConnectionConfig, Link, NotificationHandler, Transport};

/// A session with one Flow 2 device.
///
/// # Example
///
/// ```no_run
/// use flow_core::Session;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut session = Session::new("CC:BB:AA:EE:22:11");
///     session.connect().await?;
///
///     let battery = session.read_battery().await?;
///     println!("Battery: {}%", battery);
///
///     session.disconnect().await?;
///     Ok(())
/// }
/// ```
pub struct Session {
    /// BLE device identifier, immutable after construction.
    address: String,
    /// How connections are established.
    transport: Arc<dyn Transport>,
    /// The connection handle; `None` while disconnected.
    link: Option<Box<dyn Link>>,
    /// Whether a live-data subscription is active. Implies `link.is_some()`.
    streaming: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("address", &self.address)
            .field("connected", &self.link.is_some())
            .field("streaming", &self.streaming)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create a session for the device at `address`, using the btleplug
    /// transport with default timeouts. No connection is made yet.
    pub fn new(address: impl Into<String>) -> Self {
        Self::with_transport(address, Arc::new(BleTransport::default()))
    }

    /// Create a session with custom transport timeouts.
    pub fn with_config(address: impl Into<String>, config: ConnectionConfig) -> Self {
        Self::with_transport(address, Arc::new(BleTransport::new(config)))
    }

    /// Create a session over a caller-supplied transport.
    ///
    /// This is the seam used by the mock transport in tests.
    pub fn with_transport(address: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            address: address.into(),
            transport,
            link: None,
            streaming: false,
        }
    }

    /// The device address this session was created for.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Whether the session currently holds a connection.
    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    /// Whether a live-data stream is active.
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    /// Connect to the device.
    ///
    /// Valid only while disconnected; a second connect attempt fails with
    /// [`ConnectionFailureReason::AlreadyConnected`]. Transport faults are
    /// surfaced as [`Error::ConnectionFailed`] carrying the underlying
    /// diagnostic, and the session stays disconnected.
    #[tracing::instrument(level = "info", skip(self), fields(address = %self.address))]
    pub async fn connect(&mut self) -> Result<()> {
        if self.link.is_some() {
            return Err(Error::connection_failed(
                Some(self.address.clone()),
                ConnectionFailureReason::AlreadyConnected,
            ));
        }

        let link = match self.transport.connect(&self.address).await {
            Ok(link) => link,
            Err(err @ Error::ConnectionFailed { .. }) => return Err(err),
            Err(err) => {
                return Err(Error::connection_failed(
                    Some(self.address.clone()),
                    ConnectionFailureReason::BleError(err.to_string()),
                ));
            }
        };

        info!("Connected");
        self.link = Some(link);
        Ok(())
    }

    /// Disconnect from the device.
    ///
    /// Valid from any state and idempotent: the stream is stopped first if
    /// active, the handle is released, and a repeat call is a no-op.
    #[tracing::instrument(level = "info", skip(self), fields(address = %self.address))]
    pub async fn disconnect(&mut self) -> Result<()> {
        let Some(link) = self.link.take() else {
            return Ok(());
        };

        if self.streaming {
            self.streaming = false;
            if let Err(err) = link.unsubscribe(LIVE_DATA).await {
                debug!(error = %err, "Unsubscribe during disconnect failed");
            }
        }

        link.disconnect().await
    }

    /// Read the battery level (0-100).
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn read_battery(&mut self) -> Result<u8> {
        let link = self.require_link()?;

        let data = match link.read(BATTERY_LEVEL).await {
            Ok(data) => data,
            Err(err) => return Err(self.demote_on_fatal(err)),
        };

        if data.is_empty() {
            return Err(Error::InvalidData("Empty battery data".to_string()));
        }
        Ok(data[0])
    }

    /// Start streaming live PM2.5 readings.
    ///
    /// Subscribes to the live-data characteristic. Every notification that
    /// decodes to a PM value invokes `callback(value, arrival_time)`; buffers
    /// that do not decode are dropped silently, since foreign and truncated
    /// packets are ordinary BLE traffic. The callback runs on the
    /// notification dispatch task and must not block it for long.
    ///
    /// A subscribe fault leaves the session connected with no partial
    /// subscription state.
    #[tracing::instrument(level = "info", skip(self, callback), fields(address = %self.address))]
    pub async fn start_stream<F>(&mut self, callback: F) -> Result<()>
    where
        F: Fn(f32, OffsetDateTime) + Send + Sync + 'static,
    {
        let link = self.require_link()?;
        if self.streaming {
            return Err(Error::StreamActive);
        }

        let handler: NotificationHandler = Box::new(move |data| {
            match decode_live_pm_value(data) {
                Some(value) => callback(value, OffsetDateTime::now_utc()),
                None => debug!(len = data.len(), "Dropping unparseable live packet"),
            }
        });

        link.subscribe(LIVE_DATA, handler).await?;
        self.streaming = true;
        info!("Streaming started");
        Ok(())
    }

    /// Stop the live stream.
    ///
    /// No-op when no stream is active.
    #[tracing::instrument(level = "info", skip(self), fields(address = %self.address))]
    pub async fn stop_stream(&mut self) -> Result<()> {
        if !self.streaming {
            return Ok(());
        }
        self.streaming = false;

        let link = self.require_link()?;
        match link.unsubscribe(LIVE_DATA).await {
            Ok(()) => Ok(()),
            Err(err) => Err(self.demote_on_fatal(err)),
        }
    }

    /// Borrow the connection handle, failing while disconnected.
    pub(crate) fn require_link(&self) -> Result<&dyn Link> {
        self.link.as_deref().ok_or(Error::NotConnected)
    }

    /// Surface a mid-session fault, dropping the connection first when the
    /// fault means the link can no longer be trusted.
    pub(crate) fn demote_on_fatal(&mut self, err: Error) -> Error {
        if err.is_connection_fatal() {
            warn!(address = %self.address, error = %err, "Connection-fatal fault, invalidating session");
            self.link = None;
            self.streaming = false;
        }
        err
    }
}

// Best-effort cleanup for sessions dropped while still connected. Callers
// SHOULD disconnect() explicitly; the spawned task may not finish during
// runtime shutdown.
impl Drop for Session {
    fn drop(&mut self) {
        if let Some(link) = self.link.take() {
            warn!(
                address = %self.address,
                "Session dropped without disconnect() - performing best-effort cleanup"
            );
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move {
                    let _ = link.disconnect().await;
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;

    #[test]
    fn test_new_session_is_disconnected() {
        let session = Session::with_transport("CC:BB:AA:EE:22:11", Arc::new(MockTransport::new()));

        assert_eq!(session.address(), "CC:BB:AA:EE:22:11");
        assert!(!session.is_connected());
        assert!(!session.is_streaming());
    }

    #[test]
    fn test_debug_output_excludes_transport_internals() {
        let session = Session::with_transport("CC:BB:AA:EE:22:11", Arc::new(MockTransport::new()));
        let debug_str = format!("{:?}", session);

        assert!(debug_str.contains("CC:BB:AA:EE:22:11"));
        assert!(debug_str.contains("connected: false"));
        assert!(!debug_str.contains("transport"));
    }
}
