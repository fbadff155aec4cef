//! BLE session driver for Flow 2 air quality monitors.
//!
//! This crate manages the session lifecycle with one Flow 2 device:
//! connect and disconnect, battery reads, callback-driven live PM2.5
//! streaming, and batch download of the measurement history the device
//! stored while out of reach.
//!
//! The wire-format decoders and domain types live in [`flow_types`]; this
//! crate owns the state machine that decides when they run, and the
//! transport seam that keeps the whole session testable without hardware.
//!
//! # Quick Start
//!
//! ```no_run
//! use flow_core::Session;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut session = Session::new("CC:BB:AA:EE:22:11");
//!     session.connect().await?;
//!
//!     // Stream live readings
//!     session
//!         .start_stream(|pm, at| println!("{}: {:.1} µg/m³", at, pm))
//!         .await?;
//!     tokio::time::sleep(std::time::Duration::from_secs(30)).await;
//!     session.stop_stream().await?;
//!
//!     // Download stored measurements
//!     let records = session.fetch_history().await?;
//!     println!("{} records", records.len());
//!
//!     session.disconnect().await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod history;
pub mod mock;
pub mod session;
pub mod transport;

// Core exports
pub use error::{ConnectionFailureReason, Error, Result};
pub use history::{HISTORY_DUMP_REQUEST, HistoryOptions};
pub use mock::MockTransport;
pub use session::Session;
pub use transport::{BleTransport, ConnectionConfig, Link, NotificationHandler, Transport};

// Re-export the wire-format layer
pub use flow_types::uuid as uuids;
pub use flow_types::{HistoryRecord, PmLevel, decode_history_timestamp, decode_live_pm_value};
