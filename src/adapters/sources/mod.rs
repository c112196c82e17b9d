pub mod file_source;
pub mod http_source;
pub mod query_history;
pub mod tds_source;
