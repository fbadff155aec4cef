//! Error types for flow-core.
//!
//! This module defines all error types that can occur when communicating
//! with a Flow 2 device over Bluetooth Low Energy.
//!
//! Note that decode failures are absent here on purpose: the wire decoders
//! in `flow-types` signal an unparseable buffer with `None`, and the session
//! skips such buffers instead of raising. Only transport and state-machine
//! faults surface as [`Error`].
//!
//! # Connection-fatal faults
//!
//! Mid-session faults fall into two groups:
//!
//! - **Connection-fatal** ([`Error::Bluetooth`], [`Error::Timeout`]): the
//!   link itself is suspect. The session invalidates its handle and drops
//!   back to the disconnected state before surfacing the fault.
//! - **Local** (everything else): the connection is fine, the specific
//!   operation is not. The session state is left untouched.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when communicating with a Flow 2 device.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error
/// variants in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Bluetooth Low Energy error from the backend.
    #[error("Bluetooth error: {0}")]
    Bluetooth(#[from] btleplug::Error),

    /// Operation attempted while not connected to the device.
    #[error("Not connected to device")]
    NotConnected,

    /// Connection could not be established.
    #[error("Connection failed: {reason}")]
    ConnectionFailed {
        /// The device address that failed to connect.
        device_id: Option<String>,
        /// The structured reason for the failure.
        reason: ConnectionFailureReason,
    },

    /// Required BLE characteristic not found on the device.
    #[error("Characteristic not found: {uuid} (searched in {service_count} services)")]
    CharacteristicNotFound {
        /// The UUID that was not found.
        uuid: String,
        /// Number of services that were searched.
        service_count: usize,
    },

    /// Failed to interpret data received from the device.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Operation timed out.
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The timeout duration.
        duration: Duration,
    },

    /// A history fetch was requested while a live stream is active.
    #[error("Live stream active; stop it before fetching history")]
    StreamActive,

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Structured reasons for connection failures.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new reasons
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConnectionFailureReason {
    /// Bluetooth adapter not available or powered off.
    AdapterUnavailable,
    /// Device was not seen during the scan window.
    OutOfRange,
    /// Connection attempt timed out.
    Timeout,
    /// The session already holds a connection.
    AlreadyConnected,
    /// Generic BLE error.
    BleError(String),
    /// Other/unknown error.
    Other(String),
}

impl std::fmt::Display for ConnectionFailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AdapterUnavailable => write!(f, "Bluetooth adapter unavailable"),
            Self::OutOfRange => write!(f, "device out of range"),
            Self::Timeout => write!(f, "connection timed out"),
            Self::AlreadyConnected => write!(f, "session already connected"),
            Self::BleError(msg) => write!(f, "BLE error: {}", msg),
            Self::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl Error {
    /// Create a timeout error with operation context.
    pub fn timeout(operation: impl Into<String>, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a characteristic not found error.
    pub fn characteristic_not_found(uuid: impl Into<String>, service_count: usize) -> Self {
        Self::CharacteristicNotFound {
            uuid: uuid.into(),
            service_count,
        }
    }

    /// Create a configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig(message.into())
    }

    /// Create a connection failure with structured reason.
    pub fn connection_failed(device_id: Option<String>, reason: ConnectionFailureReason) -> Self {
        Self::ConnectionFailed { device_id, reason }
    }

    /// Whether this fault invalidates the connection itself.
    ///
    /// Backend faults and timeouts mean the link can no longer be trusted;
    /// the session reacts by dropping its handle. A missing characteristic
    /// or a malformed payload leaves the link usable.
    #[must_use]
    pub fn is_connection_fatal(&self) -> bool {
        matches!(self, Error::Bluetooth(_) | Error::Timeout { .. })
    }
}

/// Result type alias using flow-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::NotConnected;
        assert_eq!(err.to_string(), "Not connected to device");

        let err = Error::characteristic_not_found("0x2A19", 5);
        assert!(err.to_string().contains("0x2A19"));
        assert!(err.to_string().contains("5 services"));

        let err = Error::InvalidData("bad format".to_string());
        assert_eq!(err.to_string(), "Invalid data: bad format");

        let err = Error::timeout("read battery", Duration::from_secs(10));
        assert!(err.to_string().contains("read battery"));
        assert!(err.to_string().contains("10s"));
    }

    #[test]
    fn test_connection_failed_display_carries_reason() {
        let err = Error::connection_failed(
            Some("CC:BB:AA:EE:22:11".to_string()),
            ConnectionFailureReason::BleError("Bluetooth down".to_string()),
        );
        assert!(err.to_string().contains("Bluetooth down"));

        let err = Error::connection_failed(None, ConnectionFailureReason::AdapterUnavailable);
        assert!(err.to_string().contains("adapter unavailable"));
    }

    #[test]
    fn test_connection_fatal_classification() {
        assert!(Error::timeout("read", Duration::from_secs(1)).is_connection_fatal());

        assert!(!Error::NotConnected.is_connection_fatal());
        assert!(!Error::StreamActive.is_connection_fatal());
        assert!(!Error::InvalidData("oops".to_string()).is_connection_fatal());
        assert!(!Error::characteristic_not_found("x", 1).is_connection_fatal());
    }

    #[test]
    fn test_btleplug_error_conversion() {
        // btleplug::Error doesn't have public constructors for most variants,
        // but we can verify the From impl exists by checking the type compiles
        fn _assert_from_impl<T: From<btleplug::Error>>() {}
        _assert_from_impl::<Error>();
    }
}
