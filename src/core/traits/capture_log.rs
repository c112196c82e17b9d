use std::path::Path;

use crate::core::errors::Result;
use crate::core::models::log_entry::{LogEntry, LogReadout};

/// Port for the append-only capture log.
pub trait CaptureLog: Send {
    /// Durably append one entry as one line. When this returns `Ok`, the
    /// entry survives a process crash.
    fn append(&self, entry: &LogEntry) -> Result<()>;

    /// Read every intact entry. Damaged lines are reported, not fatal.
    fn read(&self) -> Result<LogReadout>;

    fn path(&self) -> &Path;
}
