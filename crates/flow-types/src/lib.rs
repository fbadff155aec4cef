//! Platform-agnostic types and wire formats for Flow 2 air quality monitors.
//!
//! This crate holds everything about the Flow 2 protocol that does not
//! require a Bluetooth stack:
//!
//! - Pure decoders for the two binary wire formats (live PM notifications
//!   and history records)
//! - Domain value types for decoded data
//! - UUID constants for the device's BLE characteristics
//!
//! Malformed input never produces an error from the decoders: buffers that
//! cannot be decoded yield `None`, because undersized or foreign packets are
//! an ordinary part of BLE traffic.
//!
//! # Example
//!
//! ```
//! use flow_types::protocol::decode_live_pm_value;
//! use flow_types::PmLevel;
//!
//! let mut packet = [0u8; 20];
//! packet[8..12].copy_from_slice(&18.4f32.to_le_bytes());
//!
//! let pm = decode_live_pm_value(&packet).unwrap();
//! assert_eq!(PmLevel::from_concentration(pm), PmLevel::Moderate);
//! ```

pub mod protocol;
pub mod types;
pub mod uuid;

pub use protocol::{decode_history_record, decode_history_timestamp, decode_live_pm_value};
pub use types::{HistoryRecord, PmLevel};
pub use uuid as uuids;
