use serde_json::{Map, Value};

use crate::core::models::capture_record::CaptureRecord;

/// Longest `query_text` kept per record, in characters.
pub const QUERY_TEXT_LIMIT: usize = 500;

/// The query-history statement for the top `n` most recently executed
/// statements on the SQL endpoint.
pub fn query_history_sql(n: usize) -> String {
    format!(
        "SELECT TOP ({n}) \
         qs.execution_count, \
         qs.creation_time, \
         qs.last_execution_time, \
         qs.total_worker_time / 1000 AS cpu_time_ms, \
         qs.total_elapsed_time / 1000 AS elapsed_time_ms, \
         qs.total_logical_reads AS logical_reads, \
         qs.total_logical_writes AS logical_writes, \
         st.text AS query_text \
         FROM sys.dm_exec_query_stats AS qs \
         CROSS APPLY sys.dm_exec_sql_text(qs.sql_handle) AS st \
         ORDER BY qs.last_execution_time DESC"
    )
}

/// Cap `query_text` at `QUERY_TEXT_LIMIT` characters; other fields pass
/// through untouched.
pub fn normalize_row(mut row: Map<String, Value>) -> CaptureRecord {
    if let Some(Value::String(text)) = row.get_mut("query_text")
        && text.chars().count() > QUERY_TEXT_LIMIT
    {
        *text = text.chars().take(QUERY_TEXT_LIMIT).collect();
    }
    CaptureRecord::new(row)
}
