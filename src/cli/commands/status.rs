use std::path::Path;

use chrono::Utc;

use crate::adapters::log::json_lines_log::JsonLinesLog;
use crate::cli::output;
use crate::core::errors::Result;
use crate::core::traits::capture_log::CaptureLog;

/// Execute the `qhlog status` command.
///
/// Displays an overview of the capture log: size, entry count, capture
/// window and any damaged lines.
pub fn execute(log_path: &Path) -> Result<()> {
    output::header("qhlog status");
    output::field("Log file", log_path.display());

    if !log_path.exists() {
        output::warning("No capture log yet");
        println!("  Run 'qhlog run' to start capturing.");
        return Ok(());
    }

    let size = std::fs::metadata(log_path)?.len();
    let readout = JsonLinesLog::new(log_path).read()?;

    println!("  Size: {}", format_bytes(size));
    output::success(&format!(
        "{} entries, {} records",
        readout.entries.len(),
        readout.record_count()
    ));

    match (readout.first_capture(), readout.last_capture()) {
        (Some(first), Some(last)) => {
            println!("  First capture: {}", first.format("%Y-%m-%d %H:%M:%S UTC"));
            println!("  Last capture: {}", last.format("%Y-%m-%d %H:%M:%S UTC"));
            let age = Utc::now().signed_duration_since(last);
            println!("  Last capture age: {}", format_age(age.num_seconds()));
        }
        _ => output::warning("No complete entries in the log"),
    }

    if readout.skipped_lines > 0 {
        output::warning(&format!("{} malformed line(s)", readout.skipped_lines));
    }
    if readout.truncated_tail {
        output::warning("Final line is incomplete (interrupted write)");
    } else if readout.skipped_lines == 0 {
        output::success("All lines intact");
    }

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    match bytes {
        b if b >= MIB => format!("{:.1} MiB", b as f64 / MIB as f64),
        b if b >= KIB => format!("{:.1} KiB", b as f64 / KIB as f64),
        b => format!("{b} B"),
    }
}

fn format_age(seconds: i64) -> String {
    let seconds = seconds.max(0);
    match seconds {
        s if s < 60 => format!("{s}s"),
        s if s < 3600 => format!("{}m {}s", s / 60, s % 60),
        s => format!("{}h {}m", s / 3600, (s % 3600) / 60),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_are_human_readable() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KiB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MiB");
    }

    #[test]
    fn age_is_human_readable() {
        assert_eq!(format_age(-5), "0s");
        assert_eq!(format_age(42), "42s");
        assert_eq!(format_age(125), "2m 5s");
        assert_eq!(format_age(7260), "2h 1m");
    }
}
