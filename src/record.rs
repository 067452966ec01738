use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// OS resource counters collected for the child. Stored as opaque payload;
/// only `signals` is reachable from the query language.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ResourceUsage {
    pub max_rss_kb: i64,           // Peak resident set size
    pub minor_faults: i64,         // Page reclaims
    pub major_faults: i64,         // Page faults needing I/O
    pub swaps: i64,                // Times swapped out
    pub block_in: i64,             // Block input operations
    pub block_out: i64,            // Block output operations
    pub msgs_sent: i64,            // IPC messages sent
    pub msgs_received: i64,        // IPC messages received
    pub signals: i64,              // Signals delivered
    pub voluntary_switches: i64,   // Voluntary context switches
    pub involuntary_switches: i64, // Involuntary context switches
}

/// One measured invocation.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ExecutionRecord {
    pub command_line: String,  // argv joined by spaces
    pub grouping_key: String,  // Searched by text keywords, suffix of the store key
    pub start: DateTime<Utc>,  // When the child was spawned, millisecond resolution
    pub wall: Duration,        // Elapsed wall-clock time
    pub user: Duration,        // CPU time in user mode
    pub system: Duration,      // CPU time in kernel mode
    pub exit_code: i32,        // -1 if the child was killed by a signal
    pub usage: ResourceUsage,  // Remaining rusage counters
}

impl ExecutionRecord {
    pub fn signal_count(&self) -> i64 {
        self.usage.signals
    }
}

/// Derives the grouping key for a command line. Currently the identity.
pub fn grouping_key(command_line: &str) -> String {
    command_line.to_string()
}

/// Joins argv the way the command was typed.
pub fn command_line(args: &[String]) -> String {
    args.join(" ")
}
