//! Scheduled publish time parsing.

use crate::error::{Error, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Naive forms accepted for `publish_time`, interpreted in the configured offset
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Forms carrying their own offset, without seconds (RFC 3339 requires them)
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M%:z", "%Y-%m-%d %H:%M%:z"];

/// Build the offset used for naive timestamps.
pub fn local_offset(minutes_east: i32) -> Result<FixedOffset> {
    FixedOffset::east_opt(minutes_east * 60).ok_or_else(|| {
        Error::Config(format!(
            "publish_offset_minutes {} is outside ±24h",
            minutes_east
        ))
    })
}

/// Parse an ISO-8601 publish time into UTC.
///
/// Timestamps with an explicit offset (`Z`, `+05:30`) are honoured as given.
/// Naive timestamps are taken to be in `local`, so with the default +05:30
/// `2025-02-01T18:30:00` becomes `2025-02-01T13:00:00Z`.
pub fn parse_publish_time(input: &str, local: FixedOffset) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return Err(Error::validation("Missing publish_time"));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(input, format) {
            return Ok(dt.with_timezone(&Utc));
        }
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(input, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .ok_or_else(|| Error::validation("Invalid publish_time format"))?;

    local
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| Error::validation("Invalid publish_time format"))
}
