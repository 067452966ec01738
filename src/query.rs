use chrono::{DateTime, Local};
use log::{debug, warn};

use crate::error::Result;
use crate::key_codec;
use crate::keyword::KeywordSet;
use crate::record::ExecutionRecord;
use crate::store::HistoryStore;
use crate::timerange::{self, TimeRange};
use crate::value_codec;

/// Per-scan counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScanStats {
    pub scanned: usize,
    pub emitted: usize,
    pub malformed: usize,
    pub rejected_by_text: usize,
    pub rejected_by_relation: usize,
}

impl ScanStats {
    /// Well-formed entries that failed any keyword, text or relational.
    pub fn unmatched(&self) -> usize {
        self.rejected_by_text + self.rejected_by_relation
    }
}

#[derive(Debug, Clone, Default)]
pub struct Query {
    /// `None` scans the whole store.
    pub range: Option<TimeRange>,
    pub keywords: KeywordSet,
}

impl Query {
    /// Every record, oldest first.
    pub fn all() -> Self {
        Self::default()
    }

    /// Builds a search from `[timeRangeToken] [keyword...]`. When the first
    /// token is not a time range it is used as a keyword and the range
    /// covers everything until `now`.
    pub fn from_args<S: AsRef<str>>(args: &[S], now: DateTime<Local>) -> Self {
        let (range, keyword_tokens) = match args.first() {
            Some(first) => match timerange::parse_range(first.as_ref(), now) {
                Ok(range) => (range, &args[1..]),
                Err(err) => {
                    debug!("{err}, using it as a keyword");
                    (TimeRange::until(now), args)
                }
            },
            None => (TimeRange::until(now), args),
        };

        if range.is_inverted() {
            warn!("start of the time range {} is after its end {}", range.start, range.end);
        }

        let keywords = KeywordSet::classify(keyword_tokens);
        debug!("search min: {}", range.start);
        debug!("search max: {}", range.end);
        debug!("keywords: {} {:?}", keywords.text.len(), keywords.text);
        debug!(
            "relational keywords: {} [{}]",
            keywords.relational.len(),
            keywords
                .relational
                .iter()
                .map(|k| k.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Self {
            range: Some(range),
            keywords,
        }
    }

    /// Scans the store in key order and hands every matching record to
    /// `emit`. Unreadable entries are skipped with a warning.
    pub fn run<F>(&self, store: &HistoryStore, mut emit: F) -> Result<ScanStats>
    where
        F: FnMut(ExecutionRecord),
    {
        let entries = match &self.range {
            Some(range) => store.range(
                key_codec::bound_key(range.start),
                key_codec::bound_key(range.end),
            ),
            None => store.entries(),
        };

        let mut stats = ScanStats::default();
        for entry in entries {
            let (key, value) = entry?;
            stats.scanned += 1;
            if let Some(record) = self.evaluate(&key, &value, &mut stats) {
                stats.emitted += 1;
                emit(record);
            }
        }
        Ok(stats)
    }

    #[cfg(test)]
    pub fn collect(&self, store: &HistoryStore) -> Result<(Vec<ExecutionRecord>, ScanStats)> {
        let mut records = Vec::new();
        let stats = self.run(store, |r| records.push(r))?;
        Ok((records, stats))
    }

    fn evaluate(&self, key: &[u8], value: &[u8], stats: &mut ScanStats) -> Option<ExecutionRecord> {
        let (start, grouping_key) = match key_codec::decode_key(key) {
            Ok(decoded) => decoded,
            Err(err) => {
                warn!("{err}, skipping entry");
                stats.malformed += 1;
                return None;
            }
        };

        if !self.keywords.matches_text(&grouping_key) {
            stats.rejected_by_text += 1;
            return None;
        }

        let record = match value_codec::decode_value(value, start, &grouping_key) {
            Ok(record) => record,
            Err(err) => {
                warn!("{err}, skipping entry {grouping_key:?}");
                stats.malformed += 1;
                return None;
            }
        };

        if !self.keywords.matches_record(&record) {
            stats.rejected_by_relation += 1;
            return None;
        }
        Some(record)
    }
}
