//! Historical data download.
//!
//! The Flow 2 stores measurements while it is away from the phone and
//! replays them on request: the client writes a dump-request command to the
//! history-control characteristic, then reads the history-data
//! characteristic until the device signals end-of-data with an empty read.
//! Each read returns one or more fixed-size record buffers; records that do
//! not decode are skipped, not fatal to the fetch.

use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use flow_types::HistoryRecord;
use flow_types::protocol::{HISTORY_RECORD_LEN, decode_history_record};
use flow_types::uuid::{HISTORY_CONTROL, HISTORY_DATA};

use crate::error::{Error, Result};
use crate::session::Session;

/// History dump request command, written to the history-control
/// characteristic to start a replay.
/// Format: `[HISTORY_DUMP_REQUEST]`
pub const HISTORY_DUMP_REQUEST: u8 = 0x51;

/// Options for a history fetch.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use flow_core::HistoryOptions;
///
/// let options = HistoryOptions::new()
///     .max_records(500)
///     .read_delay(Duration::from_millis(20));
/// ```
#[derive(Debug, Clone)]
pub struct HistoryOptions {
    /// Size of one record buffer, fixed by the device's characteristic.
    pub record_len: usize,
    /// Byte offset of the timestamp inside each record.
    pub timestamp_offset: usize,
    /// Upper bound on fetched records; the dump stops once reached.
    pub max_records: usize,
    /// Delay between read operations to avoid overwhelming the device.
    pub read_delay: Duration,
}

impl Default for HistoryOptions {
    fn default() -> Self {
        Self {
            record_len: HISTORY_RECORD_LEN,
            timestamp_offset: 0,
            max_records: 4096,
            read_delay: Duration::from_millis(50),
        }
    }
}

impl HistoryOptions {
    /// Create new history options with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the record buffer size.
    #[must_use]
    pub fn record_len(mut self, len: usize) -> Self {
        self.record_len = len;
        self
    }

    /// Set the timestamp offset inside each record.
    #[must_use]
    pub fn timestamp_offset(mut self, offset: usize) -> Self {
        self.timestamp_offset = offset;
        self
    }

    /// Set the record budget.
    #[must_use]
    pub fn max_records(mut self, max: usize) -> Self {
        self.max_records = max;
        self
    }

    /// Set the delay between read operations.
    #[must_use]
    pub fn read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = delay;
        self
    }

    /// Validate the options.
    ///
    /// The timestamp field must fit inside a record, and the budget must
    /// allow at least one record.
    pub fn validate(&self) -> Result<()> {
        if self.max_records == 0 {
            return Err(Error::invalid_config("max_records must be > 0"));
        }
        let Some(timestamp_end) = self.timestamp_offset.checked_add(4) else {
            return Err(Error::invalid_config("timestamp_offset overflows"));
        };
        if timestamp_end > self.record_len {
            return Err(Error::invalid_config(format!(
                "record_len {} cannot hold a timestamp at offset {}",
                self.record_len, self.timestamp_offset
            )));
        }
        Ok(())
    }
}

impl Session {
    /// Fetch the device's stored history with default options.
    pub async fn fetch_history(&mut self) -> Result<Vec<HistoryRecord>> {
        self.fetch_history_with_options(HistoryOptions::default())
            .await
    }

    /// Fetch the device's stored history.
    ///
    /// Drives the dump protocol: one request write, then repeated reads of
    /// the history-data characteristic. Each page is split into
    /// `record_len`-sized buffers and decoded; buffers without a decodable
    /// timestamp are skipped. The dump ends on an empty read, on a page too
    /// short to hold one record, or when `max_records` is reached.
    ///
    /// Mutually exclusive with live streaming: fails with
    /// [`Error::StreamActive`] while a stream is running. Stop the stream
    /// first to fetch history.
    #[tracing::instrument(level = "info", skip(self, options), fields(address = %self.address()))]
    pub async fn fetch_history_with_options(
        &mut self,
        options: HistoryOptions,
    ) -> Result<Vec<HistoryRecord>> {
        options.validate()?;
        self.require_link()?;
        if self.is_streaming() {
            return Err(Error::StreamActive);
        }

        if let Err(err) = self
            .require_link()?
            .write(HISTORY_CONTROL, &[HISTORY_DUMP_REQUEST])
            .await
        {
            return Err(self.demote_on_fatal(err));
        }
        debug!("History dump requested");

        let mut records = Vec::new();

        // Each page normally carries at least one record, so the record
        // budget also bounds the number of round trips.
        for _ in 0..options.max_records {
            if !options.read_delay.is_zero() {
                sleep(options.read_delay).await;
            }

            let page = match self.require_link()?.read(HISTORY_DATA).await {
                Ok(page) => page,
                Err(err) => return Err(self.demote_on_fatal(err)),
            };

            if page.is_empty() {
                debug!("End of history dump");
                break;
            }
            if page.len() < options.record_len {
                warn!(len = page.len(), "Short history page, ending dump");
                break;
            }

            // chunks() lets a truncated trailing record reach the decoder,
            // which rejects it like any other malformed record
            for buffer in page.chunks(options.record_len) {
                match decode_history_record(buffer, options.timestamp_offset) {
                    Some(record) => records.push(record),
                    None => debug!("Skipping undecodable history record"),
                }
                if records.len() >= options.max_records {
                    break;
                }
            }

            if records.len() >= options.max_records {
                warn!(max = options.max_records, "Record budget reached");
                break;
            }
        }

        info!(count = records.len(), "History fetch complete");
        Ok(records)
    }
}
