use chrono::NaiveDate;

use crate::core::forms::dates::date_from_epoch_millis;

/// End-of-block-data followed by a null reference, written just before the
/// serialized millisecond field of a legacy date object.
const MARKER: [u8; 2] = [0x78, 0x70];

/// Exclusive bounds on accepted timestamps (roughly 2001 to 2065).
const MIN_MILLIS: i64 = 1_000_000_000_000;
const MAX_MILLIS: i64 = 3_000_000_000_000;

/// Extracts the date stored in an object-serialized legacy date blob.
///
/// Returns `None` when the marker is missing, fewer than eight bytes follow
/// it, or the timestamp falls outside the plausible window.
pub fn decode_legacy_date(bytes: &[u8]) -> Option<NaiveDate> {
    let idx = bytes.windows(MARKER.len()).position(|w| w == MARKER)?;
    let start = idx + MARKER.len();
    let raw: [u8; 8] = bytes.get(start..start + 8)?.try_into().ok()?;
    let millis = i64::from_be_bytes(raw);
    if millis <= MIN_MILLIS || millis >= MAX_MILLIS {
        return None;
    }
    date_from_epoch_millis(millis)
}
