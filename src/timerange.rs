//! Time-range tokens: `A-B`, `A-`, `-B` or a single timestamp meaning the
//! 24 hours that follow it. Timestamps are local time.

use chrono::{DateTime, Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, Offset, TimeZone, Utc};
use log::debug;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    /// Everything up to `now`, used when no range token is given.
    pub fn until(now: DateTime<Local>) -> Self {
        Self {
            start: DateTime::<Utc>::default(),
            end: now.with_timezone(&Utc),
        }
    }

    pub fn is_inverted(&self) -> bool {
        self.start > self.end
    }
}

type TimeParser = fn(&str, NaiveDate) -> Option<NaiveDateTime>;

fn split_date_time(token: &str) -> Option<(&str, &str)> {
    token.split_once('_')
}

fn dmy(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%d.%m.%Y").ok()
}

fn ymd(s: &str) -> Option<NaiveDate> {
    // Years need four digits so `1-1` or `24-1-1` are not read as dates.
    let year = s.split('-').next()?;
    if year.len() != 4 {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

fn hour_minute(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M").ok()
}

fn hour(s: &str) -> Option<NaiveTime> {
    if s.is_empty() || s.len() > 2 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveTime::from_hms_opt(s.parse().ok()?, 0, 0)
}

fn date_with(
    date: fn(&str) -> Option<NaiveDate>,
    time: fn(&str) -> Option<NaiveTime>,
    token: &str,
) -> Option<NaiveDateTime> {
    let (d, t) = split_date_time(token)?;
    Some(date(d)?.and_time(time(t)?))
}

// First match wins.
const FORMATS: &[TimeParser] = &[
    |s, _| date_with(dmy, hour_minute, s),
    |s, _| date_with(dmy, hour, s),
    |s, _| dmy(s)?.and_hms_opt(0, 0, 0),
    |s, today| Some(today.and_time(hour_minute(s)?)),
    |s, _| date_with(ymd, hour_minute, s),
    |s, _| date_with(ymd, hour, s),
    |s, _| ymd(s)?.and_hms_opt(0, 0, 0),
];

/// Resolves a wall-clock time in `tz`. A time skipped by a forward DST
/// transition keeps the offset in force before it, so it lands just past
/// the gap.
fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Option<DateTime<Utc>> {
    if let Some(local) = tz.from_local_datetime(&naive).earliest() {
        return Some(local.with_timezone(&Utc));
    }
    let before = tz.from_local_datetime(&(naive - Duration::hours(3))).earliest()?;
    let offset = before.offset().fix();
    let shift = Duration::seconds(i64::from(offset.local_minus_utc()));
    let resolved = Utc.from_utc_datetime(&(naive - shift));
    debug!("{naive} does not exist locally, using {resolved}");
    Some(resolved)
}

/// Parses one timestamp token in local time. Tokens without a date are
/// anchored to the local date of `now`.
pub fn parse_timestamp(token: &str, now: DateTime<Local>) -> Result<DateTime<Utc>> {
    let today = now.date_naive();
    FORMATS
        .iter()
        .find_map(|parse| parse(token, today))
        .and_then(|naive| resolve_local(&Local, naive))
        .ok_or_else(|| Error::TimeParse {
            token: token.to_string(),
        })
}

/// Tries `token` split at byte `at` as `A-B`; a single failing side falls
/// back to the epoch (start) or `now` (end).
fn parse_split(token: &str, at: usize, now: DateTime<Local>) -> Option<TimeRange> {
    let (a, b) = (&token[..at], &token[at + 1..]);
    let end = parse_timestamp(b, now);
    let start = parse_timestamp(a, now);
    match (start, end) {
        (Err(_), Err(_)) => None,
        (start, end) => Some(TimeRange {
            start: start.unwrap_or_default(),
            end: end.unwrap_or_else(|_| now.with_timezone(&Utc)),
        }),
    }
}

/// Parses a range token. On `Err` the caller should use
/// [`TimeRange::until`] and treat the token as a keyword.
pub fn parse_range(token: &str, now: DateTime<Local>) -> Result<TimeRange> {
    for (at, _) in token.match_indices('-') {
        if let Some(range) = parse_split(token, at, now) {
            return Ok(range);
        }
    }

    let start = parse_timestamp(token, now)?;
    Ok(TimeRange {
        start,
        end: start + Duration::hours(24),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, LocalResult};

    fn local(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Local> {
        Local
            .from_local_datetime(&NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, 0).unwrap())
            .earliest()
            .unwrap()
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        local(y, m, d, h, min).with_timezone(&Utc)
    }

    fn now() -> DateTime<Local> {
        local(2024, 6, 15, 12, 0)
    }

    #[test]
    fn parses_each_timestamp_form() {
        assert_eq!(parse_timestamp("3.12.1998_12:43", now()).unwrap(), utc(1998, 12, 3, 12, 43));
        assert_eq!(parse_timestamp("3.12.1998_07", now()).unwrap(), utc(1998, 12, 3, 7, 0));
        assert_eq!(parse_timestamp("10.10.1995", now()).unwrap(), utc(1995, 10, 10, 0, 0));
        assert_eq!(parse_timestamp("09:30", now()).unwrap(), utc(2024, 6, 15, 9, 30));
        assert_eq!(parse_timestamp("2024-01-02", now()).unwrap(), utc(2024, 1, 2, 0, 0));
        assert_eq!(parse_timestamp("2024-01-02_18:05", now()).unwrap(), utc(2024, 1, 2, 18, 5));
    }

    #[test]
    fn rejects_non_timestamps() {
        for token in ["", "python", "32.1.2020", "1.1.2020_25", "12", "24-1-1", "Walltime>1s"] {
            assert!(parse_timestamp(token, now()).is_err(), "{token:?} parsed");
        }
    }

    #[test]
    fn full_range() {
        let range = parse_range("3.12.1998-4.12.1999_12:43", now()).unwrap();
        assert_eq!(range.start, utc(1998, 12, 3, 0, 0));
        assert_eq!(range.end, utc(1999, 12, 4, 12, 43));
    }

    #[test]
    fn open_ends_fall_back() {
        let from = parse_range("2.1.2006-", now()).unwrap();
        assert_eq!(from.start, utc(2006, 1, 2, 0, 0));
        assert_eq!(from.end, now().with_timezone(&Utc));

        let to = parse_range("-1.1.2008", now()).unwrap();
        assert_eq!(to.start, DateTime::<Utc>::default());
        assert_eq!(to.end, utc(2008, 1, 1, 0, 0));
    }

    #[test]
    fn single_timestamp_covers_a_day() {
        let range = parse_range("10.10.1995", now()).unwrap();
        assert_eq!(range.start, utc(1995, 10, 10, 0, 0));
        assert_eq!(range.end, range.start + Duration::hours(24));
    }

    #[test]
    fn iso_dates_split_at_the_right_dash() {
        let range = parse_range("2024-01-01-2024-01-02", now()).unwrap();
        assert_eq!(range.start, utc(2024, 1, 1, 0, 0));
        assert_eq!(range.end, utc(2024, 1, 2, 0, 0));

        let open = parse_range("2024-01-02-", now()).unwrap();
        assert_eq!(open.start, utc(2024, 1, 2, 0, 0));
        assert_eq!(open.end, now().with_timezone(&Utc));

        let day = parse_range("2024-01-01", now()).unwrap();
        assert_eq!(day.end - day.start, Duration::hours(24));
    }

    #[test]
    fn keywords_are_not_ranges() {
        assert!(parse_range("python", now()).is_err());
        assert!(parse_range("-f", now()).is_err());
        assert!(parse_range("--verbose", now()).is_err());
    }

    /// UTC+1 until 2024-03-31 01:00 UTC, UTC+2 afterwards; local 02:00-03:00
    /// on that day does not exist.
    #[derive(Debug, Clone, Copy)]
    struct SpringForward;

    impl SpringForward {
        fn switch() -> NaiveDateTime {
            NaiveDate::from_ymd_opt(2024, 3, 31).unwrap().and_hms_opt(1, 0, 0).unwrap()
        }

        fn offset(hours: i32) -> FixedOffset {
            FixedOffset::east_opt(hours * 3600).unwrap()
        }
    }

    impl TimeZone for SpringForward {
        type Offset = FixedOffset;

        fn from_offset(_: &FixedOffset) -> Self {
            SpringForward
        }

        fn offset_from_local_date(&self, _: &NaiveDate) -> LocalResult<FixedOffset> {
            LocalResult::Single(Self::offset(1))
        }

        fn offset_from_local_datetime(&self, local: &NaiveDateTime) -> LocalResult<FixedOffset> {
            let winter = *local - Duration::hours(1) < Self::switch();
            let summer = *local - Duration::hours(2) >= Self::switch();
            match (winter, summer) {
                (true, true) => LocalResult::Ambiguous(Self::offset(1), Self::offset(2)),
                (true, false) => LocalResult::Single(Self::offset(1)),
                (false, true) => LocalResult::Single(Self::offset(2)),
                (false, false) => LocalResult::None,
            }
        }

        fn offset_from_utc_date(&self, _: &NaiveDate) -> FixedOffset {
            Self::offset(1)
        }

        fn offset_from_utc_datetime(&self, utc: &NaiveDateTime) -> FixedOffset {
            if *utc < Self::switch() {
                Self::offset(1)
            } else {
                Self::offset(2)
            }
        }
    }

    fn naive(d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap().and_hms_opt(h, min, 0).unwrap()
    }

    #[test]
    fn time_in_dst_gap_moves_past_it() {
        let resolved = resolve_local(&SpringForward, naive(31, 2, 30)).unwrap();
        assert_eq!(resolved, Utc.from_utc_datetime(&naive(31, 1, 30)));
        assert_eq!(resolved.with_timezone(&SpringForward).naive_local(), naive(31, 3, 30));

        let resolved = resolve_local(&SpringForward, naive(31, 2, 0)).unwrap();
        assert_eq!(resolved, Utc.from_utc_datetime(&naive(31, 1, 0)));

        let ordinary = resolve_local(&SpringForward, naive(31, 12, 0)).unwrap();
        assert_eq!(ordinary, Utc.from_utc_datetime(&naive(31, 10, 0)));
        let winter = resolve_local(&SpringForward, naive(30, 12, 0)).unwrap();
        assert_eq!(winter, Utc.from_utc_datetime(&naive(30, 11, 0)));
    }

    #[test]
    fn inverted_range_is_reported_not_rejected() {
        let range = parse_range("2.1.2020-1.1.2020", now()).unwrap();
        assert!(range.is_inverted());
    }
}
