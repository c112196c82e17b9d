use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::core::models::capture_record::CaptureRecord;
use crate::core::models::log_entry::LogEntry;

/// Field holding the statement text in query-history rows.
pub const QUERY_TEXT_FIELD: &str = "query_text";
/// Field holding CPU time in milliseconds.
pub const CPU_TIME_FIELD: &str = "cpu_time_ms";

/// Characters of normalized query text used as the grouping key.
const PATTERN_PREFIX_CHARS: usize = 100;

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));

/// Filters applied when reading captured history back.
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    /// Only entries captured at or after this instant.
    pub since: Option<DateTime<Utc>>,
    /// Case-insensitive substring of `query_text`.
    pub search: Option<String>,
    /// Minimum `cpu_time_ms`.
    pub min_cpu_ms: Option<f64>,
}

/// A record together with the capture it came from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapturedQuery<'a> {
    pub captured_at: DateTime<Utc>,
    pub record: &'a CaptureRecord,
}

impl CapturedQuery<'_> {
    pub fn query_text(&self) -> &str {
        self.record.str_field(QUERY_TEXT_FIELD).unwrap_or("")
    }

    pub fn cpu_time_ms(&self) -> Option<f64> {
        self.record.number_field(CPU_TIME_FIELD)
    }
}

/// Flatten entries into per-record rows that pass `filter`, in log order.
///
/// Records without a `cpu_time_ms` field never pass a CPU threshold.
pub fn filter_records<'a>(entries: &'a [LogEntry], filter: &HistoryFilter) -> Vec<CapturedQuery<'a>> {
    let search = filter.search.as_ref().map(|s| s.to_lowercase());

    entries
        .iter()
        .filter(|entry| filter.since.is_none_or(|since| entry.captured_at >= since))
        .flat_map(|entry| {
            entry.records.iter().map(move |record| CapturedQuery {
                captured_at: entry.captured_at,
                record,
            })
        })
        .filter(|row| {
            search
                .as_deref()
                .is_none_or(|needle| row.query_text().to_lowercase().contains(needle))
        })
        .filter(|row| {
            filter
                .min_cpu_ms
                .is_none_or(|min| row.cpu_time_ms().is_some_and(|cpu| cpu >= min))
        })
        .collect()
}

/// Aggregate statistics for one normalized query text.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPattern {
    pub pattern: String,
    pub executions: usize,
    pub total_cpu_ms: f64,
}

impl QueryPattern {
    pub fn avg_cpu_ms(&self) -> f64 {
        if self.executions == 0 {
            0.0
        } else {
            self.total_cpu_ms / self.executions as f64
        }
    }
}

/// Collapse whitespace and keep the first 100 characters.
pub fn normalize_pattern(query_text: &str) -> String {
    WHITESPACE
        .replace_all(query_text.trim(), " ")
        .chars()
        .take(PATTERN_PREFIX_CHARS)
        .collect()
}

/// Group rows by normalized query text and return the `top` most frequent.
///
/// Ties are broken by total CPU, then by pattern text, so output is stable.
pub fn summarize(rows: &[CapturedQuery<'_>], top: usize) -> Vec<QueryPattern> {
    let mut groups: HashMap<String, QueryPattern> = HashMap::new();

    for row in rows {
        let pattern = normalize_pattern(row.query_text());
        let group = groups.entry(pattern.clone()).or_insert_with(|| QueryPattern {
            pattern,
            executions: 0,
            total_cpu_ms: 0.0,
        });
        group.executions += 1;
        group.total_cpu_ms += row.cpu_time_ms().unwrap_or(0.0);
    }

    let mut patterns: Vec<QueryPattern> = groups.into_values().collect();
    patterns.sort_by(|a, b| {
        b.executions
            .cmp(&a.executions)
            .then_with(|| b.total_cpu_ms.total_cmp(&a.total_cpu_ms))
            .then_with(|| a.pattern.cmp(&b.pattern))
    });
    patterns.truncate(top);
    patterns
}
