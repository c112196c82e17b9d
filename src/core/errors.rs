use std::path::PathBuf;

/// All domain errors for qhlog.
///
/// Each variant provides enough context to diagnose the issue
/// without needing a debugger.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error(
        "Invalid configuration: {detail}\n\n  \
         qhlog validates interval, top-n and the log path before capturing.\n  \
         Check your flags, environment variables and qhlog.toml."
    )]
    InvalidConfig { detail: String },

    #[error(
        "Authentication failed: {reason}\n\n  \
         Solutions:\n    \
         → Refresh the access token (default variable: QHLOG_ACCESS_TOKEN)\n    \
         → Check that the identity can read query history on the endpoint"
    )]
    Authentication { reason: String },

    #[error("Transport error: {reason}")]
    Transport { reason: String },

    #[error("Source returned an error: {reason}")]
    Remote { reason: String },

    #[error(
        "Could not persist capture to {path}: {reason}\n\n  \
         This cycle's records were NOT written. The next cycle will retry.\n  \
         Check free disk space and permissions on the log file."
    )]
    Persistence { path: PathBuf, reason: String },

    #[error("Could not read capture log {path}: {detail}")]
    LogRead { path: PathBuf, detail: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CaptureError {
    /// Authentication, transport and remote failures: the source could not
    /// deliver records this cycle, try again next tick.
    pub fn is_source_unavailable(&self) -> bool {
        matches!(
            self,
            Self::Authentication { .. } | Self::Transport { .. } | Self::Remote { .. }
        )
    }

    /// Only configuration errors stop the process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. })
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, CaptureError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_errors_are_recoverable() {
        let auth = CaptureError::Authentication {
            reason: "expired".into(),
        };
        let transport = CaptureError::Transport {
            reason: "timeout".into(),
        };
        assert!(auth.is_source_unavailable());
        assert!(transport.is_source_unavailable());
        assert!(!auth.is_fatal());
    }

    #[test]
    fn persistence_is_not_a_source_error() {
        let err = CaptureError::Persistence {
            path: PathBuf::from("log.jsonl"),
            reason: "disk full".into(),
        };
        assert!(!err.is_source_unavailable());
        assert!(!err.is_fatal());
        assert!(err.to_string().contains("log.jsonl"));
    }

    #[test]
    fn config_errors_are_fatal() {
        let err = CaptureError::InvalidConfig {
            detail: "interval must be positive".into(),
        };
        assert!(err.is_fatal());
    }
}
