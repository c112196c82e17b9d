use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::errors::{CaptureError, Result};

/// Seconds between the start of two cycles unless configured.
pub const DEFAULT_INTERVAL_SECS: u64 = 300;
/// Records requested per poll unless configured.
pub const DEFAULT_TOP_N: usize = 100;
/// Log file used when no path is configured.
pub const DEFAULT_LOG_FILE: &str = "query_history_log.jsonl";
/// Per-request timeout for the network sources unless configured.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Longest accepted interval: one year.
pub const MAX_INTERVAL_SECS: u64 = 365 * 24 * 60 * 60;

/// Immutable settings for one capture loop, validated at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    pub interval: Duration,
    pub top_n: usize,
    pub log_path: PathBuf,
    /// Stop after this many cycles. `None` runs until stopped.
    pub max_cycles: Option<u64>,
}

impl CaptureConfig {
    /// Build a config, rejecting values that would fail mid-run.
    pub fn validated(
        interval: Duration,
        top_n: usize,
        log_path: PathBuf,
        max_cycles: Option<u64>,
    ) -> Result<Self> {
        if interval.is_zero() {
            return Err(CaptureError::InvalidConfig {
                detail: "interval must be a positive number of seconds".into(),
            });
        }
        if interval > Duration::from_secs(MAX_INTERVAL_SECS) {
            return Err(CaptureError::InvalidConfig {
                detail: format!(
                    "interval of {}s is too long, the maximum is {MAX_INTERVAL_SECS}s (one year)",
                    interval.as_secs()
                ),
            });
        }
        if top_n == 0 {
            return Err(CaptureError::InvalidConfig {
                detail: "top-n must be a positive number of records".into(),
            });
        }
        if max_cycles == Some(0) {
            return Err(CaptureError::InvalidConfig {
                detail: "max-cycles must be at least 1".into(),
            });
        }
        validate_log_path(&log_path)?;

        Ok(Self {
            interval,
            top_n,
            log_path,
            max_cycles,
        })
    }
}

/// Check that `path` can be appended to, without creating the log itself.
///
/// Missing parent directories are created. An existing file must open in
/// append mode; otherwise a throwaway file is created next to it.
pub fn validate_log_path(path: &Path) -> Result<()> {
    let invalid = |detail: String| CaptureError::InvalidConfig { detail };

    if path.as_os_str().is_empty() {
        return Err(invalid("log path is empty".into()));
    }
    if path.is_dir() {
        return Err(invalid(format!(
            "log path {} is a directory, expected a file",
            path.display()
        )));
    }

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    if !parent.exists() {
        std::fs::create_dir_all(parent).map_err(|e| {
            invalid(format!("cannot create log directory {}: {e}", parent.display()))
        })?;
    }

    if path.exists() {
        OpenOptions::new()
            .append(true)
            .open(path)
            .map_err(|e| invalid(format!("log file {} is not writable: {e}", path.display())))?;
    } else {
        tempfile::NamedTempFile::new_in(parent).map_err(|e| {
            invalid(format!(
                "log directory {} is not writable: {e}",
                parent.display()
            ))
        })?;
    }

    Ok(())
}
