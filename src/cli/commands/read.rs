use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use colored::Colorize;
use serde_json::Value;

use crate::adapters::log::json_lines_log::JsonLinesLog;
use crate::cli::output;
use crate::core::errors::Result;
use crate::core::models::log_entry::LogReadout;
use crate::core::services::history_query::{CapturedQuery, HistoryFilter, filter_records};
use crate::core::traits::capture_log::CaptureLog;

/// Characters of query text shown per row in table output.
const PREVIEW_CHARS: usize = 100;

/// Options for the `qhlog read` command.
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    pub hours: Option<u64>,
    pub search: Option<String>,
    pub min_cpu_ms: Option<f64>,
    pub last: Option<usize>,
    pub json: bool,
}

/// Execute the `qhlog read` command.
///
/// Flattens captured entries into per-query rows and prints those that
/// pass the filters. Damaged lines in the log are reported, never fatal.
pub fn execute(log_path: &Path, opts: &ReadOptions) -> Result<()> {
    let log = JsonLinesLog::new(log_path);
    let readout = log.read()?;

    let filter = HistoryFilter {
        since: since_hours(opts.hours),
        search: opts.search.clone(),
        min_cpu_ms: opts.min_cpu_ms,
    };
    let rows = filter_records(&readout.entries, &filter);

    // Apply --last N (take from the end)
    let skip = opts
        .last
        .map(|n| rows.len().saturating_sub(n))
        .unwrap_or(0);
    let display = &rows[skip..];

    if opts.json {
        for row in display {
            println!("{}", row_json(row));
        }
        report_damage(&readout, log_path, true);
        return Ok(());
    }

    if display.is_empty() {
        output::header("qhlog read");
        output::warning("No captured queries found");
        if opts.search.is_some() || opts.min_cpu_ms.is_some() || opts.hours.is_some() {
            println!("  Try widening the filters (e.g. --all).");
        }
        report_damage(&readout, log_path, false);
        return Ok(());
    }

    output::header(&format!("qhlog read ({} queries)", display.len()));
    println!();
    for row in display {
        print_row(row);
    }
    report_damage(&readout, log_path, false);

    Ok(())
}

/// Lower bound for `--hours`, `None` for all history. Windows too large
/// to represent also mean all history.
pub fn since_hours(hours: Option<u64>) -> Option<DateTime<Utc>> {
    let hours = i64::try_from(hours?).ok()?;
    Utc::now().checked_sub_signed(Duration::try_hours(hours)?)
}

/// Warn about lines the reader had to skip. With `to_stderr` the
/// warnings stay out of stdout, for JSON output.
pub fn report_damage(readout: &LogReadout, log_path: &Path, to_stderr: bool) {
    let warn = if to_stderr {
        output::warning_stderr
    } else {
        output::warning
    };
    if readout.truncated_tail {
        warn(&format!(
            "Ignored an incomplete final line in {}",
            log_path.display()
        ));
    }
    if readout.skipped_lines > 0 {
        warn(&format!(
            "Skipped {} malformed line(s) in {}",
            readout.skipped_lines,
            log_path.display()
        ));
    }
}

/// The record's own fields plus the capture time.
fn row_json(row: &CapturedQuery<'_>) -> Value {
    let mut fields = row.record.0.clone();
    fields.insert(
        "captured_at".to_string(),
        Value::String(row.captured_at.to_rfc3339()),
    );
    Value::Object(fields)
}

fn print_row(row: &CapturedQuery<'_>) {
    let cpu = format_ms(row.cpu_time_ms());
    let elapsed = format_ms(row.record.number_field("elapsed_time_ms"));
    let last_run = row
        .record
        .get("last_execution_time")
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .unwrap_or_else(|| "—".to_string());

    println!(
        "  {} {} CPU {} {} Elapsed {} {} Last run {}",
        row.captured_at.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
        "│".dimmed(),
        cpu,
        "│".dimmed(),
        elapsed,
        "│".dimmed(),
        last_run,
    );

    let preview: String = row.query_text().chars().take(PREVIEW_CHARS).collect();
    println!("    {}", preview);
}

fn format_ms(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.0}ms"))
        .unwrap_or_else(|| "—".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::capture_record::CaptureRecord;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn row_json_adds_capture_time() {
        let record: CaptureRecord =
            serde_json::from_value(json!({"query_text": "SELECT 1"})).unwrap();
        let row = CapturedQuery {
            captured_at: Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap(),
            record: &record,
        };
        let value = row_json(&row);
        assert_eq!(value["query_text"], "SELECT 1");
        assert_eq!(value["captured_at"], "2026-01-02T03:04:05+00:00");
    }

    #[test]
    fn since_hours_none_means_everything() {
        assert!(since_hours(None).is_none());
        let since = since_hours(Some(24)).unwrap();
        assert!(since < Utc::now());
    }

    #[test]
    fn format_ms_rounds() {
        assert_eq!(format_ms(Some(12.6)), "13ms");
        assert_eq!(format_ms(None), "—");
    }
}
