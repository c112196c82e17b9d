use crate::core::errors::Result;
use crate::core::models::capture_record::CaptureRecord;

/// Port for fetching the current query history.
///
/// Implementations live in `adapters::sources` (TdsQuerySource, HttpQuerySource,
/// FileSource). The capture loop only depends on this trait and treats
/// every error as "source unavailable this cycle".
pub trait CaptureSource: Send {
    /// Fetch at most `n` records, in the order the source returns them.
    fn fetch_top_queries(&self, n: usize) -> Result<Vec<CaptureRecord>>;

    /// Human-readable name of this source (e.g. "http", "file").
    fn name(&self) -> &str;
}
