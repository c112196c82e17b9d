use std::path::PathBuf;

use crate::core::errors::{CaptureError, Result};
use crate::core::models::capture_record::CaptureRecord;
use crate::core::traits::source::CaptureSource;

/// Replays a JSON fixture (an array of row objects) on every poll.
///
/// The file is re-read each call, so editing it while the loop runs
/// changes what the next cycle captures. Useful for dry runs of a
/// deployment before pointing it at a real endpoint.
pub struct FileSource {
    fixture: PathBuf,
}

impl FileSource {
    pub fn new(fixture: impl Into<PathBuf>) -> Self {
        Self {
            fixture: fixture.into(),
        }
    }
}

impl CaptureSource for FileSource {
    fn fetch_top_queries(&self, n: usize) -> Result<Vec<CaptureRecord>> {
        let content =
            std::fs::read_to_string(&self.fixture).map_err(|e| CaptureError::Transport {
                reason: format!("cannot read fixture {}: {e}", self.fixture.display()),
            })?;

        let mut records: Vec<CaptureRecord> =
            serde_json::from_str(&content).map_err(|e| CaptureError::Remote {
                reason: format!(
                    "fixture {} is not a JSON array of objects: {e}",
                    self.fixture.display()
                ),
            })?;

        records.truncate(n);
        Ok(records)
    }

    fn name(&self) -> &str {
        "file"
    }
}
