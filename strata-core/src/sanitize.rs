//! Field-level sanitization of cached payloads.
//!
//! The sanitizer walks a result tree and drops every object field whose name
//! is either explicitly excluded or starts with the reserved prefix. Arrays are
//! walked element by element; scalars pass through unchanged. Only the cached
//! copy is sanitized: callers always receive the original value.

use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Prefix marking internal fields that are never persisted to a cache.
pub const RESERVED_PREFIX: &str = "_";

/// Recursive field filter for cached payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sanitizer {
    excluded: BTreeSet<String>,
    reserved_prefix: String,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new(RESERVED_PREFIX)
    }
}

impl Sanitizer {
    /// Create a sanitizer with no explicit exclusions.
    ///
    /// An empty prefix disables prefix filtering.
    pub fn new(reserved_prefix: impl Into<String>) -> Self {
        Self {
            excluded: BTreeSet::new(),
            reserved_prefix: reserved_prefix.into(),
        }
    }

    /// Add field names that must never be cached.
    pub fn with_excluded<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Return a copy of this sanitizer that also excludes `fields`.
    pub fn extended<I, S>(&self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.clone().with_excluded(fields)
    }

    pub fn excluded(&self) -> impl Iterator<Item = &str> {
        self.excluded.iter().map(String::as_str)
    }

    pub fn reserved_prefix(&self) -> &str {
        &self.reserved_prefix
    }

    /// Whether a field with this name is dropped from cached payloads.
    pub fn is_excluded(&self, field: &str) -> bool {
        (!self.reserved_prefix.is_empty() && field.starts_with(&self.reserved_prefix))
            || self.excluded.contains(field)
    }

    /// Produce the cacheable copy of `value`.
    pub fn sanitize(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) => Value::Object(self.sanitize_object(map)),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.sanitize(v)).collect()),
            scalar => scalar.clone(),
        }
    }

    fn sanitize_object(&self, map: &Map<String, Value>) -> Map<String, Value> {
        map.iter()
            .filter(|(field, _)| !self.is_excluded(field))
            .map(|(field, v)| (field.clone(), self.sanitize(v)))
            .collect()
    }

    /// Sanitize and serialize `value` to the store transport form (JSON text).
    pub fn to_payload(&self, value: &Value) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.sanitize(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strips_declared_and_reserved_fields() {
        let sanitizer = Sanitizer::default().with_excluded(["secret"]);
        let result = json!({"id": 1, "_internal": "x", "secret": "y"});
        assert_eq!(sanitizer.sanitize(&result), json!({"id": 1}));
    }

    #[test]
    fn test_sanitizes_nested_records_and_sequences() {
        let sanitizer = Sanitizer::default().with_excluded(["password"]);
        let result = json!([
            {"id": 1, "profile": {"password": "p", "_rev": 3, "name": "a"}},
            {"id": 2, "tags": [{"_score": 0.5, "label": "x"}]}
        ]);
        assert_eq!(
            sanitizer.sanitize(&result),
            json!([
                {"id": 1, "profile": {"name": "a"}},
                {"id": 2, "tags": [{"label": "x"}]}
            ])
        );
    }

    #[test]
    fn test_scalars_pass_through() {
        let sanitizer = Sanitizer::default();
        assert_eq!(sanitizer.sanitize(&json!(42)), json!(42));
        assert_eq!(sanitizer.sanitize(&json!("_not_a_field")), json!("_not_a_field"));
        assert_eq!(sanitizer.sanitize(&Value::Null), Value::Null);
    }

    #[test]
    fn test_original_value_is_untouched() {
        let sanitizer = Sanitizer::default();
        let original = json!({"id": 1, "_internal": true});
        let _ = sanitizer.sanitize(&original);
        assert_eq!(original, json!({"id": 1, "_internal": true}));
    }

    #[test]
    fn test_empty_prefix_disables_prefix_filtering() {
        let sanitizer = Sanitizer::new("");
        let result = json!({"_keep": 1, "": 2});
        assert_eq!(sanitizer.sanitize(&result), result);
    }

    #[test]
    fn test_custom_prefix() {
        let sanitizer = Sanitizer::new("$");
        let result = json!({"$meta": 1, "_id": 2});
        assert_eq!(sanitizer.sanitize(&result), json!({"_id": 2}));
    }

    #[test]
    fn test_extended_does_not_modify_base() {
        let base = Sanitizer::default().with_excluded(["a"]);
        let extended = base.extended(["b"]);
        assert!(extended.is_excluded("a"));
        assert!(extended.is_excluded("b"));
        assert!(!base.is_excluded("b"));
    }

    #[test]
    fn test_to_payload_is_json_text() {
        let sanitizer = Sanitizer::default();
        let payload = sanitizer.to_payload(&json!({"id": 7, "_x": 1})).unwrap();
        let decoded: Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(decoded, json!({"id": 7}));
    }
}
