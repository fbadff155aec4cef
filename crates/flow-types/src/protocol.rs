//! Wire-format decoders for the Flow 2 BLE protocol.
//!
//! The device emits two binary formats: a fixed 20-byte live-data
//! notification carrying the current PM2.5 concentration, and fixed-size
//! history records carrying a Unix timestamp plus measurement fields.
//!
//! All decoders are pure functions. A buffer that cannot be decoded yields
//! `None`: undersized notifications and out-of-bounds offsets are an
//! expected part of normal traffic, not errors.

use bytes::Buf;
use time::OffsetDateTime;

use crate::types::HistoryRecord;

/// Exact length of a live-data notification.
pub const LIVE_NOTIFICATION_LEN: usize = 20;

/// Byte offset of the PM2.5 value inside a live-data notification.
pub const LIVE_PM_OFFSET: usize = 8;

/// Default size of one history record buffer.
pub const HISTORY_RECORD_LEN: usize = 8;

/// Decode the PM2.5 concentration from a live-data notification.
///
/// The notification is 20 bytes; bytes `[8, 12)` hold the concentration in
/// µg/m³ as a little-endian IEEE-754 float. Every other byte is reserved.
/// Buffers of any other length decode to `None`.
///
/// Any 4-byte sequence is a well-formed float bit pattern, so NaN and
/// infinity are valid decodes rather than failures.
///
/// # Examples
///
/// ```
/// use flow_types::protocol::decode_live_pm_value;
///
/// let mut packet = [0u8; 20];
/// packet[8..12].copy_from_slice(&12.5f32.to_le_bytes());
/// assert_eq!(decode_live_pm_value(&packet), Some(12.5));
///
/// assert_eq!(decode_live_pm_value(&[0u8; 19]), None);
/// ```
#[must_use]
pub fn decode_live_pm_value(data: &[u8]) -> Option<f32> {
    if data.len() != LIVE_NOTIFICATION_LEN {
        return None;
    }
    let raw: [u8; 4] = data[LIVE_PM_OFFSET..LIVE_PM_OFFSET + 4].try_into().ok()?;
    Some(f32::from_le_bytes(raw))
}

/// Decode a Unix timestamp from a history record buffer.
///
/// Bytes `[offset, offset + 4)` hold seconds since the epoch as a
/// little-endian unsigned 32-bit integer. Offsets that leave fewer than
/// four bytes in the buffer decode to `None`; the `usize` parameter makes
/// negative offsets unrepresentable.
///
/// The full unsigned range is valid: timestamps through the year 2106
/// decode to an instant, not an error.
///
/// # Examples
///
/// ```
/// use flow_types::protocol::decode_history_timestamp;
/// use time::OffsetDateTime;
///
/// let packet = 1_609_459_200u32.to_le_bytes();
/// assert_eq!(
///     decode_history_timestamp(&packet, 0),
///     OffsetDateTime::from_unix_timestamp(1_609_459_200).ok()
/// );
///
/// assert_eq!(decode_history_timestamp(&[0u8; 10], 10), None);
/// ```
#[must_use]
pub fn decode_history_timestamp(data: &[u8], offset: usize) -> Option<OffsetDateTime> {
    let end = offset.checked_add(4)?;
    if end > data.len() {
        return None;
    }
    let mut field = &data[offset..end];
    let seconds = field.get_u32_le();
    OffsetDateTime::from_unix_timestamp(i64::from(seconds)).ok()
}

/// Decode one history record buffer.
///
/// The timestamp sits at `timestamp_offset`; every remaining byte of the
/// buffer is carried as the record's undecoded measurement payload. Returns
/// `None` exactly when the timestamp cannot be decoded.
#[must_use]
pub fn decode_history_record(data: &[u8], timestamp_offset: usize) -> Option<HistoryRecord> {
    let timestamp = decode_history_timestamp(data, timestamp_offset)?;
    let mut payload = Vec::with_capacity(data.len() - 4);
    payload.extend_from_slice(&data[..timestamp_offset]);
    payload.extend_from_slice(&data[timestamp_offset + 4..]);
    Some(HistoryRecord { timestamp, payload })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live_packet(pm: f32) -> [u8; 20] {
        let mut packet = [0u8; 20];
        packet[LIVE_PM_OFFSET..LIVE_PM_OFFSET + 4].copy_from_slice(&pm.to_le_bytes());
        packet
    }

    fn instant(seconds: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(seconds).unwrap()
    }

    // --- decode_live_pm_value tests ---

    #[test]
    fn test_live_pm_normal_value() {
        let result = decode_live_pm_value(&live_packet(12.5)).unwrap();
        assert!((result - 12.5).abs() < 0.001);
    }

    #[test]
    fn test_live_pm_zero() {
        let result = decode_live_pm_value(&live_packet(0.0)).unwrap();
        assert!(result.abs() < 0.001);
    }

    #[test]
    fn test_live_pm_severe_pollution() {
        let result = decode_live_pm_value(&live_packet(350.7)).unwrap();
        assert!((result - 350.7).abs() < 0.001);
    }

    #[test]
    fn test_live_pm_ignores_surrounding_bytes() {
        let mut packet = live_packet(25.8);
        packet[..8].copy_from_slice(&[0xFF, 0xAA, 0x55, 0x00, 0x11, 0x22, 0x33, 0x44]);
        packet[12..].copy_from_slice(&[0xDE; 8]);

        let result = decode_live_pm_value(&packet).unwrap();
        assert!((result - 25.8).abs() < 0.001);
    }

    #[test]
    fn test_live_pm_too_short() {
        assert_eq!(decode_live_pm_value(&[0u8; 19]), None);
        assert_eq!(decode_live_pm_value(&[0u8; 10]), None);
        assert_eq!(decode_live_pm_value(&[]), None);
    }

    #[test]
    fn test_live_pm_too_long() {
        assert_eq!(decode_live_pm_value(&[0u8; 21]), None);
    }

    #[test]
    fn test_live_pm_nan_bit_pattern_is_a_valid_decode() {
        let mut packet = [0u8; 20];
        packet[8..12].copy_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF]);

        let result = decode_live_pm_value(&packet).unwrap();
        assert!(result.is_nan());
    }

    #[test]
    fn test_live_pm_infinity_bit_pattern_is_a_valid_decode() {
        let result = decode_live_pm_value(&live_packet(f32::INFINITY)).unwrap();
        assert!(result.is_infinite());
    }

    // --- decode_history_timestamp tests ---

    #[test]
    fn test_timestamp_at_start_of_buffer() {
        // 2021-01-01 00:00:00 UTC
        let mut packet = vec![0u8; 14];
        packet[..4].copy_from_slice(&1_609_459_200u32.to_le_bytes());

        assert_eq!(
            decode_history_timestamp(&packet, 0),
            Some(instant(1_609_459_200))
        );
    }

    #[test]
    fn test_timestamp_at_custom_offset() {
        let mut packet = vec![0xFFu8; 14];
        packet[4..8].copy_from_slice(&1_609_459_200u32.to_le_bytes());

        assert_eq!(
            decode_history_timestamp(&packet, 4),
            Some(instant(1_609_459_200))
        );
    }

    #[test]
    fn test_timestamp_epoch() {
        let packet = 0u32.to_le_bytes();
        assert_eq!(decode_history_timestamp(&packet, 0), Some(instant(0)));
    }

    #[test]
    fn test_timestamp_buffer_too_short() {
        assert_eq!(decode_history_timestamp(&[0x00, 0x01, 0x02], 0), None);
        assert_eq!(decode_history_timestamp(&[0u8; 6], 4), None);
    }

    #[test]
    fn test_timestamp_offset_beyond_bounds() {
        assert_eq!(decode_history_timestamp(&[0u8; 10], 20), None);
    }

    #[test]
    fn test_timestamp_offset_at_exact_boundary() {
        // offset 10 needs bytes 10..14, buffer ends at 9
        assert_eq!(decode_history_timestamp(&[0u8; 10], 10), None);
    }

    #[test]
    fn test_timestamp_one_byte_short() {
        assert_eq!(decode_history_timestamp(&[0u8; 7], 4), None);
    }

    #[test]
    fn test_timestamp_offset_overflow() {
        assert_eq!(decode_history_timestamp(&[0u8; 10], usize::MAX), None);
    }

    #[test]
    fn test_timestamp_minimum_buffer() {
        let packet = 1_609_459_200u32.to_le_bytes();
        assert_eq!(
            decode_history_timestamp(&packet, 0),
            Some(instant(1_609_459_200))
        );
    }

    #[test]
    fn test_timestamp_in_last_four_bytes_of_large_packet() {
        let mut packet = vec![0u8; 244];
        packet[240..].copy_from_slice(&1_700_000_000u32.to_le_bytes());

        assert_eq!(
            decode_history_timestamp(&packet, 240),
            Some(instant(1_700_000_000))
        );
    }

    #[test]
    fn test_timestamp_full_u32_range() {
        // 0xFFFFFFFF = Feb 7, 2106 (valid, not an error)
        let packet = u32::MAX.to_le_bytes();
        let decoded = decode_history_timestamp(&packet, 0).unwrap();
        assert_eq!(decoded.year(), 2106);
    }

    #[test]
    fn test_multiple_timestamps_in_one_buffer() {
        let mut packet = Vec::new();
        packet.extend_from_slice(&1_609_459_200u32.to_le_bytes());
        packet.extend_from_slice(&[0xFF; 4]);
        packet.extend_from_slice(&1_640_995_200u32.to_le_bytes());
        packet.extend_from_slice(&[0xAA; 4]);
        packet.extend_from_slice(&1_672_531_200u32.to_le_bytes());

        assert_eq!(
            decode_history_timestamp(&packet, 0),
            Some(instant(1_609_459_200))
        );
        assert_eq!(
            decode_history_timestamp(&packet, 8),
            Some(instant(1_640_995_200))
        );
        assert_eq!(
            decode_history_timestamp(&packet, 16),
            Some(instant(1_672_531_200))
        );
    }

    // --- decode_history_record tests ---

    #[test]
    fn test_record_default_layout() {
        let mut buffer = vec![0u8; HISTORY_RECORD_LEN];
        buffer[..4].copy_from_slice(&1_705_324_200u32.to_le_bytes());
        buffer[4..].copy_from_slice(&[0x10, 0x20, 0x30, 0x40]);

        let record = decode_history_record(&buffer, 0).unwrap();
        assert_eq!(record.timestamp, instant(1_705_324_200));
        assert_eq!(record.payload, vec![0x10, 0x20, 0x30, 0x40]);
    }

    #[test]
    fn test_record_timestamp_mid_buffer_keeps_surrounding_payload() {
        let mut buffer = vec![0xABu8; 10];
        buffer[2..6].copy_from_slice(&1_700_000_000u32.to_le_bytes());

        let record = decode_history_record(&buffer, 2).unwrap();
        assert_eq!(record.timestamp, instant(1_700_000_000));
        assert_eq!(record.payload, vec![0xAB; 6]);
    }

    #[test]
    fn test_record_too_short() {
        assert_eq!(decode_history_record(&[0u8; 3], 0), None);
        assert_eq!(decode_history_record(&[0u8; 8], 5), None);
    }

    // --- property tests ---

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn live_pm_rejects_every_other_length(data in proptest::collection::vec(any::<u8>(), 0..64)) {
                prop_assume!(data.len() != LIVE_NOTIFICATION_LEN);
                prop_assert_eq!(decode_live_pm_value(&data), None);
            }

            #[test]
            fn live_pm_decodes_bytes_8_to_12(data in proptest::collection::vec(any::<u8>(), 20..=20)) {
                let expected = f32::from_le_bytes(data[8..12].try_into().unwrap());
                let decoded = decode_live_pm_value(&data).unwrap();
                // Bit-level comparison so NaN patterns compare equal
                prop_assert_eq!(decoded.to_bits(), expected.to_bits());
            }

            #[test]
            fn timestamp_bounds_are_exact(
                data in proptest::collection::vec(any::<u8>(), 0..64),
                offset in 0usize..80,
            ) {
                let decoded = decode_history_timestamp(&data, offset);
                if offset + 4 <= data.len() {
                    let seconds = u32::from_le_bytes(data[offset..offset + 4].try_into().unwrap());
                    let expected = OffsetDateTime::from_unix_timestamp(i64::from(seconds)).unwrap();
                    prop_assert_eq!(decoded, Some(expected));
                } else {
                    prop_assert_eq!(decoded, None);
                }
            }
        }
    }
}
