//! Timestamp parsing/formatting and a flexible CLI time argument parser.
//!
//! All persisted timestamps are whole Unix seconds (UTC); see `spec.md` §3.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};

/// `parse_timestamp`/`format_timestamp` failure: a string too short or
/// non-numeric to be `YYYY-MM-DDTHH:MM:SSZ`, or a negative second count
/// passed to `format_timestamp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidTimestamp {
    pub input: String,
    pub message: String,
}

impl std::fmt::Display for InvalidTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid timestamp '{}': {}", self.input, self.message)
    }
}

impl std::error::Error for InvalidTimestamp {}

/// Parses a strict `YYYY-MM-DDTHH:MM:SSZ` string into Unix seconds.
///
/// Rejects strings shorter than 20 characters or with non-numeric date/time
/// fields, per `spec.md` §7's `InvalidTimestamp` contract.
pub fn parse_timestamp(s: &str) -> Result<i64, InvalidTimestamp> {
    if s.len() < 20 {
        return Err(InvalidTimestamp {
            input: s.to_string(),
            message: "string shorter than 20 characters".to_string(),
        });
    }
    let dt = DateTime::parse_from_rfc3339(s).map_err(|e| InvalidTimestamp {
        input: s.to_string(),
        message: e.to_string(),
    })?;
    Ok(dt.timestamp())
}

/// Formats Unix seconds as `YYYY-MM-DDTHH:MM:SSZ`. Rejects negative input.
pub fn format_timestamp(secs: i64) -> Result<String, InvalidTimestamp> {
    if secs < 0 {
        return Err(InvalidTimestamp {
            input: secs.to_string(),
            message: "timestamp must be non-negative".to_string(),
        });
    }
    let dt = Utc
        .timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| InvalidTimestamp {
            input: secs.to_string(),
            message: "out of range for UTC datetime".to_string(),
        })?;
    Ok(dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
}

/// Flexible time argument parser for CLI flags such as `baseline-compare
/// --since`. Accepts, in order: a strict `parse_timestamp` ISO-8601 string,
/// a bare Unix timestamp, or a relative offset (`-1h`, `-30m`, `-2d`) taken
/// relative to `now`.
pub fn parse_time_flexible(input: &str, now: i64) -> Result<i64, InvalidTimestamp> {
    let input = input.trim();

    if let Ok(ts) = parse_timestamp(input) {
        return Ok(ts);
    }

    if let Ok(ts) = input.parse::<i64>() {
        return Ok(ts);
    }

    if let Some(delta) = parse_relative_offset(input) {
        return Ok(now - delta);
    }

    Err(InvalidTimestamp {
        input: input.to_string(),
        message: "expected ISO-8601 (YYYY-MM-DDTHH:MM:SSZ), a unix timestamp, or a relative \
                  offset like -1h/-30m/-2d"
            .to_string(),
    })
}

fn parse_relative_offset(input: &str) -> Option<i64> {
    let input = input.strip_prefix('-')?;
    if input.is_empty() {
        return None;
    }
    let (num_str, unit) = input.split_at(input.len() - 1);
    let num: i64 = num_str.parse().ok()?;
    let secs = match unit {
        "s" => num,
        "m" => num * 60,
        "h" => num * 3600,
        "d" => num * 86400,
        _ => return None,
    };
    Some(secs)
}

/// Helper used by tests to round-trip a `NaiveDate`/`NaiveDateTime` pair
/// into the seconds-since-epoch that `parse_timestamp`/`format_timestamp`
/// operate on, without depending on `chrono`'s `DateTime::timestamp` at
/// call sites outside this module.
#[cfg(test)]
fn ymd_hms_to_secs(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> i64 {
    let date = NaiveDate::from_ymd_opt(y, mo, d).unwrap();
    let time = NaiveTime::from_hms_opt(h, mi, s).unwrap();
    let ndt = NaiveDateTime::new(date, time);
    Utc.from_utc_datetime(&ndt).timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_for_a_range_of_valid_timestamps() {
        let cases = [
            (1970, 1, 1, 0, 0, 0),
            (2000, 2, 29, 12, 30, 45),
            (2038, 1, 19, 3, 14, 7),
            (2105, 12, 31, 23, 59, 59),
        ];
        for (y, mo, d, h, mi, s) in cases {
            let secs = ymd_hms_to_secs(y, mo, d, h, mi, s);
            let formatted = format_timestamp(secs).unwrap();
            let parsed = parse_timestamp(&formatted).unwrap();
            assert_eq!(parsed, secs, "round trip failed for {formatted}");
        }
    }

    #[test]
    fn format_negative_timestamp_fails() {
        assert!(format_timestamp(-1).is_err());
    }

    #[test]
    fn parse_short_string_fails() {
        assert!(parse_timestamp("2024-01-01").is_err());
    }

    #[test]
    fn parse_non_numeric_fields_fail() {
        assert!(parse_timestamp("2024-01-01TXX:00:00Z").is_err());
    }

    #[test]
    fn flexible_parser_accepts_unix_seconds() {
        assert_eq!(parse_time_flexible("1700000000", 0).unwrap(), 1_700_000_000);
    }

    #[test]
    fn flexible_parser_accepts_relative_offsets() {
        assert_eq!(parse_time_flexible("-1h", 10_000).unwrap(), 10_000 - 3600);
        assert_eq!(parse_time_flexible("-30m", 10_000).unwrap(), 10_000 - 1800);
        assert_eq!(parse_time_flexible("-2d", 100_000).unwrap(), 100_000 - 172_800);
    }

    #[test]
    fn flexible_parser_rejects_garbage() {
        assert!(parse_time_flexible("not-a-time", 0).is_err());
    }
}
