use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::core::errors::{CaptureError, Result};
use crate::core::models::log_entry::{LogEntry, LogReadout};
use crate::core::traits::capture_log::CaptureLog;

/// Capture log that appends entries as JSON lines to a file.
///
/// Each line is a self-contained JSON object representing one `LogEntry`.
/// A line is written with a single `write_all` on a file opened in append
/// mode and synced before `append` returns. Readers can therefore parse
/// the file line by line and drop an incomplete final line left by a
/// crash without losing anything before it.
pub struct JsonLinesLog {
    log_path: PathBuf,
}

impl JsonLinesLog {
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: log_path.into(),
        }
    }

    fn persistence_error(&self, reason: impl Into<String>) -> CaptureError {
        CaptureError::Persistence {
            path: self.log_path.clone(),
            reason: reason.into(),
        }
    }

    fn read_error(&self, detail: impl Into<String>) -> CaptureError {
        CaptureError::LogRead {
            path: self.log_path.clone(),
            detail: detail.into(),
        }
    }
}

/// True when the file is non-empty and its last byte is not a newline.
fn has_torn_tail(file: &mut File) -> std::io::Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(false);
    }
    file.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

impl CaptureLog for JsonLinesLog {
    fn append(&self, entry: &LogEntry) -> Result<()> {
        let line = serde_json::to_string(entry)
            .map_err(|e| self.persistence_error(format!("failed to serialize entry: {e}")))?;

        if let Some(parent) = self.log_path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent)
                .map_err(|e| self.persistence_error(format!("cannot create directory: {e}")))?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&self.log_path)
            .map_err(|e| self.persistence_error(format!("cannot open log: {e}")))?;

        // A crash mid-write can leave a fragment without its newline.
        // Start on a fresh line so the fragment stays isolated.
        let torn = has_torn_tail(&mut file)
            .map_err(|e| self.persistence_error(format!("cannot inspect log tail: {e}")))?;

        let mut payload = String::with_capacity(line.len() + 2);
        if torn {
            tracing::warn!(
                log_path = %self.log_path.display(),
                "log ends with an incomplete line, starting a new one"
            );
            payload.push('\n');
        }
        payload.push_str(&line);
        payload.push('\n');

        file.write_all(payload.as_bytes())
            .map_err(|e| self.persistence_error(format!("failed to write entry: {e}")))?;
        file.sync_data()
            .map_err(|e| self.persistence_error(format!("failed to sync log: {e}")))?;

        Ok(())
    }

    fn read(&self) -> Result<LogReadout> {
        if !self.log_path.exists() {
            return Ok(LogReadout::default());
        }

        let file = File::open(&self.log_path).map_err(|e| self.read_error(e.to_string()))?;
        let mut reader = BufReader::new(file);
        let mut readout = LogReadout::default();
        let mut buf = Vec::new();
        let mut line_num = 0usize;
        // Bad line held back until we know whether it is the last one.
        let mut pending_bad: Option<usize> = None;

        loop {
            buf.clear();
            let read = reader
                .read_until(b'\n', &mut buf)
                .map_err(|e| self.read_error(format!("error at line {}: {e}", line_num + 1)))?;
            if read == 0 {
                break;
            }
            line_num += 1;

            let terminated = buf.last() == Some(&b'\n');
            let text = String::from_utf8_lossy(&buf);
            let trimmed = text.trim();
            if trimmed.is_empty() {
                continue;
            }

            if let Some(bad) = pending_bad.take() {
                tracing::warn!(line = bad, log_path = %self.log_path.display(), "skipping malformed log line");
                readout.skipped_lines += 1;
            }

            let parsed = serde_json::from_str::<LogEntry>(trimmed)
                .ok()
                .filter(LogEntry::is_consistent);

            match parsed {
                Some(entry) if terminated => readout.entries.push(entry),
                // Unparsable, or parsed but never got its newline.
                _ => pending_bad = Some(line_num),
            }
        }

        if pending_bad.is_some() {
            readout.truncated_tail = true;
        }

        Ok(readout)
    }

    fn path(&self) -> &Path {
        &self.log_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::capture_record::CaptureRecord;
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use tempfile::TempDir;

    fn sample_entry(minute: u32, records: usize) -> LogEntry {
        let records = (0..records)
            .map(|i| {
                serde_json::from_value::<CaptureRecord>(json!({
                    "query_text": format!("SELECT {i}"),
                    "cpu_time_ms": i * 10,
                }))
                .unwrap()
            })
            .collect();
        LogEntry::new(Utc.with_ymd_and_hms(2026, 4, 2, 10, minute, 0).unwrap(), records)
    }

    fn log_in(tmp: &TempDir) -> JsonLinesLog {
        JsonLinesLog::new(tmp.path().join("query_history_log.jsonl"))
    }

    #[test]
    fn append_and_read_round_trip() {
        let tmp = TempDir::new().unwrap();
        let log = log_in(&tmp);

        let entry = sample_entry(0, 3);
        log.append(&entry).unwrap();

        let readout = log.read().unwrap();
        assert_eq!(readout.entries, vec![entry]);
        assert_eq!(readout.skipped_lines, 0);
        assert!(!readout.truncated_tail);
    }

    #[test]
    fn each_entry_is_one_line() {
        let tmp = TempDir::new().unwrap();
        let log = log_in(&tmp);

        log.append(&sample_entry(0, 2)).unwrap();
        log.append(&sample_entry(5, 0)).unwrap();
        log.append(&sample_entry(10, 1)).unwrap();

        let content = fs::read_to_string(log.path()).unwrap();
        assert!(content.ends_with('\n'));
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        for line in lines {
            serde_json::from_str::<LogEntry>(line).unwrap();
        }
    }

    #[test]
    fn creates_missing_parent_directories() {
        let tmp = TempDir::new().unwrap();
        let log = JsonLinesLog::new(tmp.path().join("nested/dir/log.jsonl"));

        log.append(&sample_entry(0, 1)).unwrap();
        assert!(log.path().exists());
    }

    #[test]
    fn read_nonexistent_file_returns_empty() {
        let log = JsonLinesLog::new("/nonexistent/qhlog/log.jsonl");
        let readout = log.read().unwrap();
        assert!(readout.entries.is_empty());
        assert!(!readout.truncated_tail);
    }

    #[test]
    fn truncated_last_line_is_ignored() {
        let tmp = TempDir::new().unwrap();
        let log = log_in(&tmp);
        for minute in 0..4 {
            log.append(&sample_entry(minute, 2)).unwrap();
        }

        // Cut the final line in half, as a crash mid-write would.
        let content = fs::read_to_string(log.path()).unwrap();
        let cut = content.len() - 20;
        fs::write(log.path(), &content[..cut]).unwrap();

        let readout = log.read().unwrap();
        assert_eq!(readout.entries.len(), 3);
        assert!(readout.truncated_tail);
        assert_eq!(readout.skipped_lines, 0);
        assert_eq!(readout.entries[2], sample_entry(2, 2));
    }

    #[test]
    fn complete_json_without_newline_counts_as_torn() {
        let tmp = TempDir::new().unwrap();
        let log = log_in(&tmp);
        log.append(&sample_entry(0, 1)).unwrap();

        let mut content = fs::read_to_string(log.path()).unwrap();
        content.push_str(&serde_json::to_string(&sample_entry(1, 1)).unwrap());
        fs::write(log.path(), content).unwrap();

        let readout = log.read().unwrap();
        assert_eq!(readout.entries.len(), 1);
        assert!(readout.truncated_tail);
    }

    #[test]
    fn corrupted_last_line_does_not_affect_earlier_lines() {
        let tmp = TempDir::new().unwrap();
        let log = log_in(&tmp);
        for minute in 0..3 {
            log.append(&sample_entry(minute, 1)).unwrap();
        }
        let mut content = fs::read_to_string(log.path()).unwrap();
        content.push_str("{\"captured_at\": garbage}\n");
        fs::write(log.path(), content).unwrap();

        let readout = log.read().unwrap();
        assert_eq!(readout.entries.len(), 3);
        assert!(readout.truncated_tail);
    }

    #[test]
    fn malformed_middle_line_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let log = log_in(&tmp);
        log.append(&sample_entry(0, 1)).unwrap();
        let mut content = fs::read_to_string(log.path()).unwrap();
        content.push_str("not json\n");
        fs::write(log.path(), content).unwrap();
        log.append(&sample_entry(1, 1)).unwrap();

        let readout = log.read().unwrap();
        assert_eq!(readout.entries.len(), 2);
        assert_eq!(readout.skipped_lines, 1);
        assert!(!readout.truncated_tail);
    }

    #[test]
    fn inconsistent_record_count_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let log = log_in(&tmp);
        let mut bad = sample_entry(0, 2);
        bad.record_count = 5;
        fs::write(log.path(), format!("{}\n", serde_json::to_string(&bad).unwrap())).unwrap();
        log.append(&sample_entry(1, 1)).unwrap();

        let readout = log.read().unwrap();
        assert_eq!(readout.entries.len(), 1);
        assert_eq!(readout.skipped_lines, 1);
    }

    #[test]
    fn append_after_torn_tail_starts_a_new_line() {
        let tmp = TempDir::new().unwrap();
        let log = log_in(&tmp);
        log.append(&sample_entry(0, 1)).unwrap();
        let mut content = fs::read_to_string(log.path()).unwrap();
        content.push_str("{\"captured_at\":\"2026-04-02T10:0");
        fs::write(log.path(), content).unwrap();

        log.append(&sample_entry(2, 1)).unwrap();

        let readout = log.read().unwrap();
        assert_eq!(readout.entries, vec![sample_entry(0, 1), sample_entry(2, 1)]);
        assert_eq!(readout.skipped_lines, 1);
        assert!(!readout.truncated_tail);
    }

    #[test]
    fn reading_twice_gives_identical_results() {
        let tmp = TempDir::new().unwrap();
        let log = log_in(&tmp);
        log.append(&sample_entry(0, 2)).unwrap();
        log.append(&sample_entry(1, 0)).unwrap();
        let mut content = fs::read_to_string(log.path()).unwrap();
        content.push_str("{\"partial");
        fs::write(log.path(), content).unwrap();

        assert_eq!(log.read().unwrap(), log.read().unwrap());
    }

    #[test]
    fn append_to_directory_is_a_persistence_error() {
        let tmp = TempDir::new().unwrap();
        let log = JsonLinesLog::new(tmp.path());

        let err = log.append(&sample_entry(0, 1)).unwrap_err();
        assert!(matches!(err, CaptureError::Persistence { .. }));
    }
}
