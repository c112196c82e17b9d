use std::path::Path;

use colored::Colorize;

use crate::adapters::log::json_lines_log::JsonLinesLog;
use crate::cli::commands::read::{report_damage, since_hours};
use crate::cli::output;
use crate::core::errors::Result;
use crate::core::services::history_query::{HistoryFilter, filter_records, summarize};
use crate::core::traits::capture_log::CaptureLog;

/// Execute the `qhlog summary` command.
///
/// Groups captured queries by normalized text and prints the most
/// frequent patterns with their CPU totals.
pub fn execute(log_path: &Path, hours: Option<u64>, top: usize) -> Result<()> {
    let log = JsonLinesLog::new(log_path);
    let readout = log.read()?;

    let filter = HistoryFilter {
        since: since_hours(hours),
        ..HistoryFilter::default()
    };
    let rows = filter_records(&readout.entries, &filter);

    output::header("qhlog summary");
    if rows.is_empty() {
        output::warning("No captured queries found");
        report_damage(&readout, log_path, false);
        return Ok(());
    }

    let patterns = summarize(&rows, usize::MAX);
    println!("  Total query executions logged: {}", rows.len());
    println!("  Unique query patterns: {}", patterns.len());

    println!(
        "\n{}",
        format!("  Top {} most frequent queries", top.min(patterns.len())).bold()
    );
    for (i, pattern) in patterns.iter().take(top).enumerate() {
        println!("  {}. {}", i + 1, pattern.pattern);
        println!(
            "     {} Executions: {} | Avg CPU: {:.0}ms | Total CPU: {:.0}ms",
            "•".dimmed(),
            pattern.executions,
            pattern.avg_cpu_ms(),
            pattern.total_cpu_ms,
        );
    }

    report_damage(&readout, log_path, false);
    Ok(())
}
