//! Upload age evaluation.
//!
//! Ages are whole hours, truncated toward zero. An upload is stale only when
//! its age is strictly greater than the cleanup threshold.

use crate::error::{Error, Result};
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

/// Longest slice of a rejected marker body echoed back in errors.
const MAX_ECHOED_BODY: usize = 64;

/// Whole hours elapsed between `start` and `now`.
///
/// Negative when `start` lies in the future (clock skew between the registry
/// and this host); such uploads are never stale.
pub fn hours_since(start: OffsetDateTime, now: OffsetDateTime) -> i64 {
    (now - start).whole_hours()
}

/// Staleness rule shared by both reapers.
pub fn is_stale(age_hours: i64, threshold_hours: i64) -> bool {
    age_hours > threshold_hours
}

/// Parse the body of an upload marker (`YYYY-MM-DDTHH:MM:SSZ`, UTC).
///
/// The format is matched exactly: no surrounding whitespace, no fractional
/// seconds, no numeric offset in place of `Z`.
pub fn parse_marker_timestamp(body: &[u8]) -> Result<OffsetDateTime> {
    let text = std::str::from_utf8(body).map_err(|e| Error::MarkerTimestamp {
        value: echo(&String::from_utf8_lossy(body)),
        reason: e.to_string(),
    })?;

    PrimitiveDateTime::parse(
        text,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z"),
    )
    .map(PrimitiveDateTime::assume_utc)
    .map_err(|e| Error::MarkerTimestamp {
        value: echo(text),
        reason: e.to_string(),
    })
}

/// Render an instant the way the registry writes upload markers.
pub fn format_marker_timestamp(instant: OffsetDateTime) -> Result<String> {
    instant
        .to_offset(UtcOffset::UTC)
        .format(format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second]Z"
        ))
        .map_err(|e| Error::MarkerTimestamp {
            value: instant.to_string(),
            reason: e.to_string(),
        })
}

fn echo(text: &str) -> String {
    text.chars().take(MAX_ECHOED_BODY).collect()
}
