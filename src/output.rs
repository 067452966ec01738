use chrono::Local;
use colored::*;

use crate::record::ExecutionRecord;

/// `\t1.00 real\t0.00 user\t0.00 sys`, the summary printed after a run.
pub fn format_durations(record: &ExecutionRecord) -> String {
    format!(
        "\t{:.2} real\t{:.2} user\t{:.2} sys",
        record.wall.as_secs_f64(),
        record.user.as_secs_f64(),
        record.system.as_secs_f64()
    )
}

/// One dump/search line: local start, grouping key, durations.
pub fn format_line(record: &ExecutionRecord, time_format: &str, color: bool) -> String {
    let start = record.start.with_timezone(&Local).format(time_format).to_string();
    let durations = format_durations(record);
    if color {
        let key = if record.exit_code == 0 {
            record.grouping_key.green()
        } else {
            record.grouping_key.red()
        };
        format!("{}\t{}\t= {}", start.dimmed(), key, durations)
    } else {
        format!("{}\t{}\t= {}", start, record.grouping_key, durations)
    }
}

pub fn format_json(record: &ExecutionRecord) -> serde_json::Result<String> {
    serde_json::to_string(record)
}
