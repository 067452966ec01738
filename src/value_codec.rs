//! Store values: the record fields in MessagePack with named fields, so
//! values written by older or newer builds still decode.

use chrono::{DateTime, TimeZone, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::record::{ExecutionRecord, ResourceUsage};

const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(default)]
struct StoredValue {
    version: u32,
    command_line: String,
    // Copies of the key fields. The key wins on read.
    grouping_key: String,
    start_ms: i64,
    wall_ns: u64,
    user_ns: u64,
    system_ns: u64,
    exit_code: i32,
    usage: ResourceUsage,
}

fn nanos(d: Duration) -> u64 {
    u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
}

pub fn encode_value(record: &ExecutionRecord) -> Result<Vec<u8>> {
    let stored = StoredValue {
        version: FORMAT_VERSION,
        command_line: record.command_line.clone(),
        grouping_key: record.grouping_key.clone(),
        start_ms: record.start.timestamp_millis(),
        wall_ns: nanos(record.wall),
        user_ns: nanos(record.user),
        system_ns: nanos(record.system),
        exit_code: record.exit_code,
        usage: record.usage.clone(),
    };
    Ok(rmp_serde::to_vec_named(&stored)?)
}

/// Rebuilds a record from its value bytes. `start` and `grouping_key` come
/// from the already decoded key.
pub fn decode_value(
    bytes: &[u8],
    start: DateTime<Utc>,
    grouping_key: &str,
) -> Result<ExecutionRecord> {
    let stored: StoredValue =
        rmp_serde::from_slice(bytes).map_err(|e| Error::MalformedValue(e.to_string()))?;

    if stored.version > FORMAT_VERSION {
        debug!("value written by format version {}, reading known fields", stored.version);
    }
    if !stored.grouping_key.is_empty() && stored.grouping_key != grouping_key {
        debug!(
            "value grouping key {:?} differs from key {:?}, using the key",
            stored.grouping_key, grouping_key
        );
    }
    if let Some(value_start) = Utc.timestamp_millis_opt(stored.start_ms).single() {
        if stored.start_ms != 0 && value_start != start {
            debug!("value start {value_start} differs from key start {start}, using the key");
        }
    }

    let command_line = if stored.command_line.is_empty() {
        grouping_key.to_string()
    } else {
        stored.command_line
    };

    Ok(ExecutionRecord {
        command_line,
        grouping_key: grouping_key.to_string(),
        start,
        wall: Duration::from_nanos(stored.wall_ns),
        user: Duration::from_nanos(stored.user_ns),
        system: Duration::from_nanos(stored.system_ns),
        exit_code: stored.exit_code,
        usage: stored.usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample() -> ExecutionRecord {
        ExecutionRecord {
            command_line: "make -j8".to_string(),
            grouping_key: "make -j8".to_string(),
            start: Utc.timestamp_millis_opt(1_704_067_200_250).unwrap(),
            wall: Duration::from_millis(12_345),
            user: Duration::from_micros(40_000_123),
            system: Duration::from_nanos(1_500_000_007),
            exit_code: 2,
            usage: ResourceUsage {
                max_rss_kb: 81_920,
                signals: 3,
                voluntary_switches: 17,
                ..ResourceUsage::default()
            },
        }
    }

    #[test]
    fn round_trips_all_fields() {
        let record = sample();
        let bytes = encode_value(&record).expect("encode");
        let decoded = decode_value(&bytes, record.start, &record.grouping_key).expect("decode");
        assert_eq!(decoded, record);
    }

    #[test]
    fn key_fields_win_over_value_copies() {
        let record = sample();
        let bytes = encode_value(&record).expect("encode");
        let other_start = Utc.timestamp_millis_opt(42).unwrap();
        let decoded = decode_value(&bytes, other_start, "renamed").expect("decode");
        assert_eq!(decoded.start, other_start);
        assert_eq!(decoded.grouping_key, "renamed");
        assert_eq!(decoded.command_line, "make -j8");
        assert_eq!(decoded.wall, record.wall);
    }

    #[test]
    fn tolerates_missing_and_unknown_fields() {
        #[derive(Serialize)]
        struct OldValue {
            wall_ns: u64,
            exit_code: i32,
            future_field: &'static str,
        }
        let bytes = rmp_serde::to_vec_named(&OldValue {
            wall_ns: 1_000_000_000,
            exit_code: 1,
            future_field: "ignored",
        })
        .unwrap();
        let start = Utc.timestamp_millis_opt(0).unwrap();
        let decoded = decode_value(&bytes, start, "sleep 1").expect("decode");
        assert_eq!(decoded.wall, Duration::from_secs(1));
        assert_eq!(decoded.exit_code, 1);
        assert_eq!(decoded.command_line, "sleep 1");
        assert_eq!(decoded.usage, ResourceUsage::default());
    }

    #[test]
    fn garbage_is_malformed() {
        let start = Utc.timestamp_millis_opt(0).unwrap();
        assert!(matches!(
            decode_value(&[0xc1, 0x00, 0xff], start, "x"),
            Err(Error::MalformedValue(_))
        ));
        assert!(matches!(decode_value(&[], start, "x"), Err(Error::MalformedValue(_))));
    }

    proptest! {
        #[test]
        fn numeric_fields_round_trip(
            wall in 0u64..u64::MAX,
            user in 0u64..u64::MAX,
            exit_code in any::<i32>(),
            signals in any::<i64>(),
        ) {
            let mut record = sample();
            record.wall = Duration::from_nanos(wall);
            record.user = Duration::from_nanos(user);
            record.exit_code = exit_code;
            record.usage.signals = signals;
            let bytes = encode_value(&record).unwrap();
            let decoded = decode_value(&bytes, record.start, &record.grouping_key).unwrap();
            prop_assert_eq!(decoded, record);
        }
    }
}
