use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One row of query history as returned by a capture source.
///
/// The capture loop treats it as an opaque document and serializes the
/// whole object. Only the reader commands look inside, through the
/// typed accessors below.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaptureRecord(pub Map<String, Value>);

impl CaptureRecord {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String field, or `None` when absent or not a string.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Numeric field. Numbers encoded as strings are accepted too, since
    /// some endpoints return decimals as text.
    pub fn number_field(&self, key: &str) -> Option<f64> {
        match self.0.get(key)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl From<Map<String, Value>> for CaptureRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> CaptureRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn serializes_as_plain_object() {
        let rec = record(json!({"query_text": "SELECT 1", "cpu_time_ms": 12}));
        let line = serde_json::to_string(&rec).unwrap();
        assert!(line.starts_with('{'));
        assert!(line.contains("\"query_text\":\"SELECT 1\""));
    }

    #[test]
    fn number_field_accepts_numeric_strings() {
        let rec = record(json!({"a": 5, "b": "7.5", "c": "n/a", "d": null}));
        assert_eq!(rec.number_field("a"), Some(5.0));
        assert_eq!(rec.number_field("b"), Some(7.5));
        assert_eq!(rec.number_field("c"), None);
        assert_eq!(rec.number_field("d"), None);
        assert_eq!(rec.number_field("missing"), None);
    }

    #[test]
    fn str_field_ignores_non_strings() {
        let rec = record(json!({"query_text": "SELECT 1", "count": 3}));
        assert_eq!(rec.str_field("query_text"), Some("SELECT 1"));
        assert_eq!(rec.str_field("count"), None);
    }
}
