use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

use crate::core::models::capture_record::CaptureRecord;

/// One completed poll cycle, persisted as exactly one log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub captured_at: DateTime<Utc>,
    pub record_count: usize,
    pub records: Vec<CaptureRecord>,
}

impl LogEntry {
    /// Build an entry for a cycle that started at `captured_at`.
    ///
    /// The timestamp is truncated to microseconds so that what is read
    /// back compares equal to what was written.
    pub fn new(captured_at: DateTime<Utc>, records: Vec<CaptureRecord>) -> Self {
        Self {
            captured_at: captured_at.trunc_subsecs(6),
            record_count: records.len(),
            records,
        }
    }

    /// `record_count` must agree with `records`; a mismatch means the line
    /// was edited or damaged after it was written.
    pub fn is_consistent(&self) -> bool {
        self.record_count == self.records.len()
    }
}

/// Result of reading a capture log back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogReadout {
    /// Entries in file order.
    pub entries: Vec<LogEntry>,
    /// Malformed lines before the last one.
    pub skipped_lines: usize,
    /// The final line was incomplete (no newline, or unparsable).
    pub truncated_tail: bool,
}

impl LogReadout {
    pub fn record_count(&self) -> usize {
        self.entries.iter().map(|e| e.records.len()).sum()
    }

    pub fn first_capture(&self) -> Option<DateTime<Utc>> {
        self.entries.first().map(|e| e.captured_at)
    }

    pub fn last_capture(&self) -> Option<DateTime<Utc>> {
        self.entries.last().map(|e| e.captured_at)
    }
}
