//! Bluetooth UUIDs for Flow 2 devices.
//!
//! This module contains the UUIDs needed to communicate with a Flow 2 air
//! quality monitor over Bluetooth Low Energy.

use uuid::{Uuid, uuid};

// --- Flow Service UUIDs ---

/// Flow custom measurement service.
pub const FLOW_SERVICE: Uuid = uuid!("4fb51400-9d3e-4f2c-8a7b-6e0c91d4a3f2");

// --- Flow Characteristic UUIDs ---

/// Live-data notifications (20-byte PM packets).
pub const LIVE_DATA: Uuid = uuid!("4fb51501-9d3e-4f2c-8a7b-6e0c91d4a3f2");

/// History record dump (read-based).
pub const HISTORY_DATA: Uuid = uuid!("4fb51502-9d3e-4f2c-8a7b-6e0c91d4a3f2");

/// History dump control (write commands).
pub const HISTORY_CONTROL: Uuid = uuid!("4fb51503-9d3e-4f2c-8a7b-6e0c91d4a3f2");

// --- Standard BLE Service UUIDs ---

/// Battery service.
pub const BATTERY_SERVICE: Uuid = uuid!("0000180f-0000-1000-8000-00805f9b34fb");

/// Battery level characteristic.
pub const BATTERY_LEVEL: Uuid = uuid!("00002a19-0000-1000-8000-00805f9b34fb");
