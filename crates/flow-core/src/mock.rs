//! Mock transport implementation for testing.
//!
//! This module provides a scriptable [`Transport`] so session behavior can
//! be tested without BLE hardware:
//!
//! - **Scripted reads**: queue per-characteristic responses with
//!   [`MockTransport::push_read`]
//! - **Failure injection**: make connect or any later operation fail
//! - **Notification driving**: deliver synthetic notification buffers to the
//!   captured subscription handler with [`MockTransport::notify`]
//! - **Call counting**: assert which transport operations ran
//!
//! The transport is cheaply cloneable; keep a clone around to script and
//! inspect it after the session has taken ownership of the link.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::transport::{Link, NotificationHandler, Transport};

#[derive(Default)]
struct MockState {
    connect_error: Mutex<Option<String>>,
    should_fail: AtomicBool,
    fail_message: Mutex<String>,
    read_queues: Mutex<HashMap<Uuid, VecDeque<Vec<u8>>>>,
    writes: Mutex<Vec<(Uuid, Vec<u8>)>>,
    handler: Mutex<Option<NotificationHandler>>,
    subscribed: Mutex<Option<Uuid>>,
    connect_calls: AtomicU32,
    read_calls: AtomicU32,
    write_calls: AtomicU32,
    subscribe_calls: AtomicU32,
    unsubscribe_calls: AtomicU32,
    disconnect_calls: AtomicU32,
}

impl MockState {
    fn check_should_fail(&self, operation: &str) -> Result<()> {
        if self.should_fail.load(Ordering::Relaxed) {
            let message = self.fail_message.lock().unwrap().clone();
            return Err(Error::timeout(
                format!("{} ({})", operation, message),
                Duration::from_secs(1),
            ));
        }
        Ok(())
    }
}

/// A scriptable in-memory transport.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use flow_core::{MockTransport, Session};
///
/// #[tokio::main]
/// async fn main() {
///     let transport = MockTransport::new();
///     let mut session = Session::with_transport("MOCK", Arc::new(transport.clone()));
///
///     session.connect().await.unwrap();
///     assert_eq!(transport.connect_calls(), 1);
/// }
/// ```
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<MockState>,
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field(
                "connect_calls",
                &self.state.connect_calls.load(Ordering::Relaxed),
            )
            .field("subscribed", &*self.state.subscribed.lock().unwrap())
            .finish_non_exhaustive()
    }
}

impl MockTransport {
    /// Create a mock transport that succeeds on every operation.
    pub fn new() -> Self {
        Self::default()
    }

    // --- Scripting ---

    /// Make the next `connect` call fail with the given diagnostic.
    pub fn fail_connect(&self, message: &str) {
        *self.state.connect_error.lock().unwrap() = Some(message.to_string());
    }

    /// Make every link operation fail until disabled.
    pub fn set_should_fail(&self, fail: bool, message: Option<&str>) {
        self.state.should_fail.store(fail, Ordering::Relaxed);
        if let Some(msg) = message {
            *self.state.fail_message.lock().unwrap() = msg.to_string();
        }
    }

    /// Queue a response for reads of `characteristic`. Reads pop queued
    /// responses in order; an exhausted queue reads as empty.
    pub fn push_read(&self, characteristic: Uuid, data: Vec<u8>) {
        self.state
            .read_queues
            .lock()
            .unwrap()
            .entry(characteristic)
            .or_default()
            .push_back(data);
    }

    /// Deliver a synthetic notification buffer to the captured handler.
    ///
    /// Returns `false` when no subscription is active.
    pub fn notify(&self, data: &[u8]) -> bool {
        let handler = self.state.handler.lock().unwrap();
        match handler.as_ref() {
            Some(handler) => {
                handler(data);
                true
            }
            None => false,
        }
    }

    // --- Inspection ---

    /// The characteristic currently subscribed, if any.
    pub fn subscribed(&self) -> Option<Uuid> {
        *self.state.subscribed.lock().unwrap()
    }

    /// Every write performed on the link, in order.
    pub fn writes(&self) -> Vec<(Uuid, Vec<u8>)> {
        self.state.writes.lock().unwrap().clone()
    }

    /// Number of `connect` calls.
    pub fn connect_calls(&self) -> u32 {
        self.state.connect_calls.load(Ordering::Relaxed)
    }

    /// Number of `read` calls.
    pub fn read_calls(&self) -> u32 {
        self.state.read_calls.load(Ordering::Relaxed)
    }

    /// Number of `write` calls.
    pub fn write_calls(&self) -> u32 {
        self.state.write_calls.load(Ordering::Relaxed)
    }

    /// Number of `subscribe` calls.
    pub fn subscribe_calls(&self) -> u32 {
        self.state.subscribe_calls.load(Ordering::Relaxed)
    }

    /// Number of `unsubscribe` calls.
    pub fn unsubscribe_calls(&self) -> u32 {
        self.state.unsubscribe_calls.load(Ordering::Relaxed)
    }

    /// Number of `disconnect` calls.
    pub fn disconnect_calls(&self) -> u32 {
        self.state.disconnect_calls.load(Ordering::Relaxed)
    }

    /// Total operations across connect and the whole link surface.
    pub fn total_calls(&self) -> u32 {
        self.connect_calls()
            + self.read_calls()
            + self.write_calls()
            + self.subscribe_calls()
            + self.unsubscribe_calls()
            + self.disconnect_calls()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, _address: &str) -> Result<Box<dyn Link>> {
        self.state.connect_calls.fetch_add(1, Ordering::Relaxed);

        if let Some(message) = self.state.connect_error.lock().unwrap().take() {
            return Err(Error::InvalidData(message));
        }
        self.state.check_should_fail("connect")?;

        Ok(Box::new(MockLink {
            state: Arc::clone(&self.state),
        }))
    }
}

struct MockLink {
    state: Arc<MockState>,
}

#[async_trait]
impl Link for MockLink {
    async fn read(&self, characteristic: Uuid) -> Result<Vec<u8>> {
        self.state.read_calls.fetch_add(1, Ordering::Relaxed);
        self.state.check_should_fail("read")?;

        let response = self
            .state
            .read_queues
            .lock()
            .unwrap()
            .get_mut(&characteristic)
            .and_then(VecDeque::pop_front)
            .unwrap_or_default();
        Ok(response)
    }

    async fn write(&self, characteristic: Uuid, data: &[u8]) -> Result<()> {
        self.state.write_calls.fetch_add(1, Ordering::Relaxed);
        self.state.check_should_fail("write")?;

        self.state
            .writes
            .lock()
            .unwrap()
            .push((characteristic, data.to_vec()));
        Ok(())
    }

    async fn subscribe(&self, characteristic: Uuid, handler: NotificationHandler) -> Result<()> {
        self.state.subscribe_calls.fetch_add(1, Ordering::Relaxed);
        self.state.check_should_fail("subscribe")?;

        *self.state.handler.lock().unwrap() = Some(handler);
        *self.state.subscribed.lock().unwrap() = Some(characteristic);
        Ok(())
    }

    async fn unsubscribe(&self, _characteristic: Uuid) -> Result<()> {
        self.state.unsubscribe_calls.fetch_add(1, Ordering::Relaxed);
        self.state.check_should_fail("unsubscribe")?;

        *self.state.handler.lock().unwrap() = None;
        *self.state.subscribed.lock().unwrap() = None;
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.state.disconnect_calls.fetch_add(1, Ordering::Relaxed);
        *self.state.handler.lock().unwrap() = None;
        *self.state.subscribed.lock().unwrap() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_scripted_reads_pop_in_order() {
        let transport = MockTransport::new();
        let characteristic = Uuid::nil();
        transport.push_read(characteristic, vec![1]);
        transport.push_read(characteristic, vec![2]);

        let link = transport.connect("MOCK").await.unwrap();
        assert_eq!(link.read(characteristic).await.unwrap(), vec![1]);
        assert_eq!(link.read(characteristic).await.unwrap(), vec![2]);
        // Exhausted queue reads as empty
        assert_eq!(link.read(characteristic).await.unwrap(), Vec::<u8>::new());
    }

    #[tokio::test]
    async fn test_notify_without_subscription() {
        let transport = MockTransport::new();
        assert!(!transport.notify(&[0u8; 20]));
    }

    #[tokio::test]
    async fn test_failure_injection_toggles() {
        let transport = MockTransport::new();
        let link = transport.connect("MOCK").await.unwrap();

        transport.set_should_fail(true, Some("link dropped"));
        let err = link.read(Uuid::nil()).await.unwrap_err();
        assert!(err.to_string().contains("link dropped"));

        transport.set_should_fail(false, None);
        assert!(link.read(Uuid::nil()).await.is_ok());
    }
}
