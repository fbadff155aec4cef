//! Core types for Flow 2 sensor data.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use time::OffsetDateTime;

/// One stored measurement downloaded from the device.
///
/// A record is produced from a fixed-size history buffer: the timestamp is
/// decoded here, the remaining measurement bytes are carried untouched in
/// `payload` for higher layers to interpret.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HistoryRecord {
    /// When the measurement was taken (second resolution).
    pub timestamp: OffsetDateTime,
    /// The record buffer minus the timestamp field, undecoded.
    pub payload: Vec<u8>,
}

/// Qualitative PM2.5 level.
///
/// Bands follow the US EPA 24-hour PM2.5 breakpoints: below 12.0 µg/m³ is
/// good, below 35.5 µg/m³ moderate, anything above that high.
///
/// # Ordering
///
/// Levels are ordered by severity, `Unknown < Good < Moderate < High`, so
/// threshold checks read naturally:
///
/// ```
/// use flow_types::PmLevel;
///
/// let level = PmLevel::from_concentration(40.2);
/// assert!(level >= PmLevel::Moderate);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[non_exhaustive]
#[repr(u8)]
pub enum PmLevel {
    /// Reading was not a finite number.
    Unknown = 0,
    /// Clean air.
    Good = 1,
    /// Elevated particulate matter.
    Moderate = 2,
    /// Unhealthy particulate matter.
    High = 3,
}

impl PmLevel {
    /// Classify a PM2.5 concentration in µg/m³.
    #[must_use]
    pub fn from_concentration(pm: f32) -> Self {
        if !pm.is_finite() {
            PmLevel::Unknown
        } else if pm < 12.0 {
            PmLevel::Good
        } else if pm < 35.5 {
            PmLevel::Moderate
        } else {
            PmLevel::High
        }
    }
}

impl fmt::Display for PmLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PmLevel::Unknown => write!(f, "Unknown"),
            PmLevel::Good => write!(f, "Good"),
            PmLevel::Moderate => write!(f, "Moderate"),
            PmLevel::High => write!(f, "High"),
        }
    }
}
