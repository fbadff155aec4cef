//! The BLE transport boundary.
//!
//! The session talks to Bluetooth exclusively through the [`Transport`] and
//! [`Link`] traits: a transport turns an address into a connected link, and
//! the link carries the characteristic-level operations. The production
//! implementation is [`BleTransport`] over btleplug; tests substitute the
//! mock transport from [`crate::mock`].

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central as _, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ConnectionFailureReason, Error, Result};

/// Callback invoked with each raw notification buffer from a subscribed
/// characteristic. Runs on the transport's dispatch task and must not block
/// it for long.
pub type NotificationHandler = Box<dyn Fn(&[u8]) + Send + Sync>;

/// Produces connected links from device addresses.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish a connection to the device at `address`.
    ///
    /// The returned link is the connection handle; dropping or
    /// disconnecting it releases the underlying resources.
    async fn connect(&self, address: &str) -> Result<Box<dyn Link>>;
}

/// An established connection to one device.
#[async_trait]
pub trait Link: Send + Sync {
    /// Read the current value of a characteristic.
    async fn read(&self, characteristic: Uuid) -> Result<Vec<u8>>;

    /// Write a value to a characteristic.
    async fn write(&self, characteristic: Uuid, data: &[u8]) -> Result<()>;

    /// Subscribe to notifications, invoking `handler` for each buffer.
    async fn subscribe(&self, characteristic: Uuid, handler: NotificationHandler) -> Result<()>;

    /// Stop notifications on a characteristic.
    async fn unsubscribe(&self, characteristic: Uuid) -> Result<()>;

    /// Tear down the connection.
    async fn disconnect(&self) -> Result<()>;
}

/// Default timeout for establishing a BLE connection (includes the scan
/// needed to locate the peripheral).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default timeout for BLE characteristic read operations.
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for BLE characteristic write operations.
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for service discovery.
const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// How often the connect scan re-checks discovered peripherals.
const SCAN_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Timeout configuration for BLE operations.
///
/// Increase the values in challenging RF environments (thick walls,
/// interference, long distances).
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use flow_core::transport::ConnectionConfig;
///
/// let config = ConnectionConfig::default()
///     .connect_timeout(Duration::from_secs(25))
///     .read_timeout(Duration::from_secs(15));
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Timeout for locating and connecting to the peripheral.
    pub connect_timeout: Duration,
    /// Timeout for BLE read operations.
    pub read_timeout: Duration,
    /// Timeout for BLE write operations.
    pub write_timeout: Duration,
    /// Timeout for service discovery after connection.
    pub discovery_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
        }
    }
}

impl ConnectionConfig {
    /// Create a new connection config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connect timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the read timeout.
    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the write timeout.
    #[must_use]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the service discovery timeout.
    #[must_use]
    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }
}

/// Production [`Transport`] over the btleplug BLE stack.
#[derive(Debug, Clone, Default)]
pub struct BleTransport {
    config: ConnectionConfig,
}

impl BleTransport {
    /// Create a transport with the given timeout configuration.
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }

    /// Scan until a peripheral matching `address` shows up, or the connect
    /// timeout elapses.
    async fn locate(&self, adapter: &Adapter, address: &str) -> Result<Peripheral> {
        adapter.start_scan(ScanFilter::default()).await?;
        let deadline = tokio::time::Instant::now() + self.config.connect_timeout;

        let found = 'scan: loop {
            for peripheral in adapter.peripherals().await? {
                if peripheral_matches(&peripheral, address).await {
                    break 'scan Some(peripheral);
                }
            }

            if tokio::time::Instant::now() >= deadline {
                break 'scan None;
            }
            tokio::time::sleep(SCAN_POLL_INTERVAL).await;
        };

        let _ = adapter.stop_scan().await;

        found.ok_or_else(|| Error::ConnectionFailed {
            device_id: Some(address.to_string()),
            reason: ConnectionFailureReason::OutOfRange,
        })
    }
}

/// Match a peripheral against a caller-supplied identifier: the Bluetooth
/// address on Linux/Windows, the CoreBluetooth UUID on macOS, or the
/// advertised local name.
async fn peripheral_matches(peripheral: &Peripheral, address: &str) -> bool {
    if format_peripheral_id(peripheral) == address {
        return true;
    }

    let Ok(Some(properties)) = peripheral.properties().await else {
        return false;
    };

    properties.address.to_string().eq_ignore_ascii_case(address)
        || properties.local_name.as_deref() == Some(address)
}

/// Extract a printable identifier from the peripheral.
///
/// On macOS peripheral IDs are CoreBluetooth UUIDs; elsewhere they wrap the
/// MAC address.
fn format_peripheral_id(peripheral: &Peripheral) -> String {
    format!("{:?}", peripheral.id())
        .trim_start_matches("PeripheralId(")
        .trim_end_matches(')')
        .to_string()
}

#[async_trait]
impl Transport for BleTransport {
    #[tracing::instrument(level = "info", skip(self), fields(address = %address))]
    async fn connect(&self, address: &str) -> Result<Box<dyn Link>> {
        let manager = Manager::new().await?;
        let adapter = manager
            .adapters()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::ConnectionFailed {
                device_id: Some(address.to_string()),
                reason: ConnectionFailureReason::AdapterUnavailable,
            })?;

        let peripheral = self.locate(&adapter, address).await?;

        info!("Connecting to device...");
        timeout(self.config.connect_timeout, peripheral.connect())
            .await
            .map_err(|_| Error::ConnectionFailed {
                device_id: Some(address.to_string()),
                reason: ConnectionFailureReason::Timeout,
            })??;

        debug!("Discovering services...");
        timeout(self.config.discovery_timeout, peripheral.discover_services())
            .await
            .map_err(|_| Error::timeout("discover services", self.config.discovery_timeout))??;

        // Cache characteristics for O(1) lookup on every read/write
        let mut characteristics = HashMap::new();
        for service in peripheral.services() {
            for characteristic in service.characteristics {
                characteristics.insert(characteristic.uuid, characteristic);
            }
        }
        debug!(count = characteristics.len(), "Cached characteristics");

        Ok(Box::new(BleLink {
            peripheral,
            characteristics,
            notification_tasks: tokio::sync::Mutex::new(HashMap::new()),
            config: self.config.clone(),
        }))
    }
}

/// A live btleplug connection.
struct BleLink {
    peripheral: Peripheral,
    /// Discovered characteristics keyed by UUID.
    characteristics: HashMap<Uuid, Characteristic>,
    /// One dispatch task per subscribed characteristic, aborted on
    /// unsubscribe or disconnect.
    notification_tasks: tokio::sync::Mutex<HashMap<Uuid, tokio::task::JoinHandle<()>>>,
    config: ConnectionConfig,
}

impl BleLink {
    fn find_characteristic(&self, uuid: Uuid) -> Result<&Characteristic> {
        self.characteristics.get(&uuid).ok_or_else(|| {
            Error::characteristic_not_found(uuid.to_string(), self.peripheral.services().len())
        })
    }
}

#[async_trait]
impl Link for BleLink {
    async fn read(&self, characteristic: Uuid) -> Result<Vec<u8>> {
        let target = self.find_characteristic(characteristic)?;
        let data = timeout(self.config.read_timeout, self.peripheral.read(target))
            .await
            .map_err(|_| {
                Error::timeout(
                    format!("read characteristic {}", characteristic),
                    self.config.read_timeout,
                )
            })??;
        Ok(data)
    }

    async fn write(&self, characteristic: Uuid, data: &[u8]) -> Result<()> {
        let target = self.find_characteristic(characteristic)?;
        timeout(
            self.config.write_timeout,
            self.peripheral.write(target, data, WriteType::WithResponse),
        )
        .await
        .map_err(|_| {
            Error::timeout(
                format!("write characteristic {}", characteristic),
                self.config.write_timeout,
            )
        })??;
        Ok(())
    }

    async fn subscribe(&self, characteristic: Uuid, handler: NotificationHandler) -> Result<()> {
        let target = self.find_characteristic(characteristic)?;
        self.peripheral.subscribe(target).await?;

        let mut stream = self.peripheral.notifications().await?;
        let task = tokio::spawn(async move {
            use futures::StreamExt;
            while let Some(notification) = stream.next().await {
                if notification.uuid == characteristic {
                    handler(&notification.value);
                }
            }
        });

        let mut tasks = self.notification_tasks.lock().await;
        if let Some(previous) = tasks.insert(characteristic, task) {
            previous.abort();
        }
        Ok(())
    }

    async fn unsubscribe(&self, characteristic: Uuid) -> Result<()> {
        if let Some(task) = self.notification_tasks.lock().await.remove(&characteristic) {
            task.abort();
        }
        let target = self.find_characteristic(characteristic)?;
        self.peripheral.unsubscribe(target).await?;
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        {
            let mut tasks = self.notification_tasks.lock().await;
            for (_, task) in tasks.drain() {
                task.abort();
            }
        }

        if let Err(err) = self.peripheral.disconnect().await {
            warn!(error = %err, "BLE disconnect failed");
            return Err(err.into());
        }
        Ok(())
    }
}
