//! Store keys: a fixed-width UTC timestamp, a separator byte and the raw
//! grouping key. Byte order of keys is chronological order of their starts.

use chrono::{DateTime, NaiveDate, NaiveDateTime, SubsecRound, TimeZone, Utc};

use crate::error::{Error, Result};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";
/// Width of `YYYY-MM-DD HH:MM:SS.mmm`.
pub const TIME_WIDTH: usize = 23;
pub const SEPARATOR: u8 = b'|';

/// Latest instant whose rendering keeps a four digit year.
fn latest_encodable() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(9999, 12, 31)
        .and_then(|d| d.and_hms_milli_opt(23, 59, 59, 999))
        .map(|n| Utc.from_utc_datetime(&n))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

fn earliest_encodable() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(0, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|n| Utc.from_utc_datetime(&n))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Renders `start` at millisecond precision, always exactly [`TIME_WIDTH`] bytes.
/// Instants outside years 0000..=9999 are clamped to the nearest representable one.
pub fn encode_time(start: DateTime<Utc>) -> String {
    let clamped = start.clamp(earliest_encodable(), latest_encodable());
    clamped.trunc_subsecs(3).format(TIME_FORMAT).to_string()
}

pub fn encode_key(start: DateTime<Utc>, grouping_key: &str) -> Vec<u8> {
    let time = encode_time(start);
    let mut key = Vec::with_capacity(TIME_WIDTH + 1 + grouping_key.len());
    key.extend_from_slice(time.as_bytes());
    key.push(SEPARATOR);
    key.extend_from_slice(grouping_key.as_bytes());
    key
}

/// Lower sentinel for every key at `start`: sorts before any real grouping key.
pub fn bound_key(start: DateTime<Utc>) -> Vec<u8> {
    encode_key(start, "")
}

pub fn decode_key(bytes: &[u8]) -> Result<(DateTime<Utc>, String)> {
    if bytes.len() <= TIME_WIDTH {
        return Err(Error::MalformedKey(format!(
            "key of {} bytes is shorter than its timestamp prefix",
            bytes.len()
        )));
    }
    if bytes[TIME_WIDTH] != SEPARATOR {
        return Err(Error::MalformedKey(format!(
            "expected separator at byte {}, found {:#04x}",
            TIME_WIDTH, bytes[TIME_WIDTH]
        )));
    }

    let prefix = std::str::from_utf8(&bytes[..TIME_WIDTH])
        .map_err(|_| Error::MalformedKey("timestamp prefix is not UTF-8".to_string()))?;
    let naive = NaiveDateTime::parse_from_str(prefix, TIME_FORMAT)
        .map_err(|e| Error::MalformedKey(format!("bad timestamp {prefix:?}: {e}")))?;

    let grouping_key = std::str::from_utf8(&bytes[TIME_WIDTH + 1..])
        .map_err(|_| Error::MalformedKey("grouping key is not UTF-8".to_string()))?;
    if grouping_key.is_empty() {
        return Err(Error::MalformedKey("empty grouping key".to_string()));
    }

    let start = Utc.from_utc_datetime(&naive);
    if encode_time(start) != prefix {
        return Err(Error::MalformedKey(format!("non-canonical timestamp {prefix:?}")));
    }
    Ok((start, grouping_key.to_string()))
}
