//! Accumulating request validation.
//!
//! Each rule checks one field independently; a failing field never stops the
//! remaining fields from being checked, so a response can report every
//! violation at once. Rules are pure: the validator holds the submitted data
//! and collects (field, message) pairs plus the validated values.

use regex::Regex;
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

pub type FieldErrors = BTreeMap<String, String>;

pub struct RequestValidator {
    data: Map<String, Value>,
    errors: FieldErrors,
    validated: Map<String, Value>,
}

impl RequestValidator {
    /// Build a validator over a JSON body. Non-object bodies validate as if
    /// every field were absent.
    pub fn new(data: &Value) -> Self {
        Self {
            data: data.as_object().cloned().unwrap_or_default(),
            errors: BTreeMap::new(),
            validated: Map::new(),
        }
    }

    /// Fails when the field is absent, null, or a whitespace-only string.
    pub fn required(&mut self, field: &str) -> &mut Self {
        match self.data.get(field) {
            None | Some(Value::Null) => self.fail(field, format!("{} must not be empty", field)),
            Some(Value::String(s)) if s.trim().is_empty() => {
                self.fail(field, format!("{} must not be empty", field))
            }
            Some(v) => {
                let v = v.clone();
                self.pass(field, v);
            }
        }
        self
    }

    /// Type check plus trim and length bounds. `pattern`, when given, must
    /// match the trimmed value.
    pub fn string(
        &mut self,
        field: &str,
        min_length: usize,
        max_length: Option<usize>,
        pattern: Option<&Regex>,
    ) -> &mut Self {
        let Some(Value::String(raw)) = self.data.get(field) else {
            self.fail(field, format!("{} must be a string", field));
            return self;
        };
        let value = raw.trim().to_string();
        // Bounds are character counts, not byte lengths; multibyte input
        // must not hit the limits early.
        let length = value.chars().count();
        if length < min_length {
            self.fail(
                field,
                format!("{} must be at least {} characters", field, min_length),
            );
            return self;
        }
        if let Some(max) = max_length {
            if length > max {
                self.fail(field, format!("{} must be at most {} characters", field, max));
                return self;
            }
        }
        if let Some(re) = pattern {
            if !re.is_match(&value) {
                self.fail(field, format!("{} does not match required pattern", field));
                return self;
            }
        }
        self.pass(field, Value::String(value));
        self
    }

    /// Accepts only absolute URLs with a scheme and a non-empty host.
    pub fn url(&mut self, field: &str) -> &mut Self {
        let Some(Value::String(raw)) = self.data.get(field) else {
            self.fail(field, format!("{} must be a string", field));
            return self;
        };
        let value = raw.trim().to_string();
        let ok = match url::Url::parse(&value) {
            Ok(parsed) => parsed.host_str().map_or(false, |h| !h.is_empty()),
            Err(_) => false,
        };
        if ok {
            self.pass(field, Value::String(value));
        } else {
            self.fail(field, format!("{} must be a valid URL", field));
        }
        self
    }

    /// Coerces JSON numbers and numeric strings; enforces inclusive bounds.
    pub fn integer(&mut self, field: &str, min: Option<i64>, max: Option<i64>) -> &mut Self {
        let coerced = match self.data.get(field) {
            Some(Value::Number(n)) => n.as_i64(),
            Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
            _ => None,
        };
        let Some(value) = coerced else {
            self.fail(field, format!("{} must be an integer", field));
            return self;
        };
        if let Some(min) = min {
            if value < min {
                self.fail(field, format!("{} must be at least {}", field, min));
                return self;
            }
        }
        if let Some(max) = max {
            if value > max {
                self.fail(field, format!("{} must be at most {}", field, max));
                return self;
            }
        }
        self.pass(field, Value::Number(Number::from(value)));
        self
    }

    /// Must be a JSON object; all missing required keys are reported in one
    /// message.
    pub fn object(&mut self, field: &str, required_keys: &[&str]) -> &mut Self {
        let Some(Value::Object(map)) = self.data.get(field) else {
            self.fail(field, format!("{} must be an object", field));
            return self;
        };
        let missing: Vec<&str> = required_keys
            .iter()
            .filter(|k| !map.contains_key(**k))
            .copied()
            .collect();
        if missing.is_empty() {
            let v = Value::Object(map.clone());
            self.pass(field, v);
        } else {
            self.fail(
                field,
                format!("{} is missing required keys: {}", field, missing.join(", ")),
            );
        }
        self
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn validated(&self) -> &Map<String, Value> {
        &self.validated
    }

    /// Validated data on success, the full error map otherwise.
    pub fn finish(self) -> Result<Map<String, Value>, FieldErrors> {
        if self.errors.is_empty() {
            Ok(self.validated)
        } else {
            Err(self.errors)
        }
    }

    fn pass(&mut self, field: &str, value: Value) {
        self.errors.remove(field);
        self.validated.insert(field.to_string(), value);
    }

    fn fail(&mut self, field: &str, message: String) {
        self.validated.remove(field);
        self.errors.insert(field.to_string(), message);
    }
}

/// Re-key nested-object errors under a parent field, e.g. `connection.host`.
pub fn namespace_errors(prefix: &str, errors: FieldErrors) -> FieldErrors {
    errors
        .into_iter()
        .map(|(k, v)| (format!("{}.{}", prefix, k), v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_fields_all_reported() {
        let mut v = RequestValidator::new(&json!({}));
        v.required("sql");
        v.required("connection");
        assert!(!v.is_valid());
        let errors = v.finish().unwrap_err();
        assert!(errors.contains_key("sql"));
        assert!(errors.contains_key("connection"));
    }

    #[test]
    fn one_failure_does_not_block_others() {
        let mut v = RequestValidator::new(&json!({"prompt": "hi"}));
        v.required("reference_url");
        v.required("prompt");
        v.string("prompt", 1, Some(1000), None);
        assert_eq!(v.errors().len(), 1);
        assert!(v.errors().contains_key("reference_url"));
        assert_eq!(v.validated()["prompt"], json!("hi"));
    }

    #[test]
    fn whitespace_only_string_is_empty() {
        let mut v = RequestValidator::new(&json!({"sql": "   "}));
        v.required("sql");
        assert!(v.errors().contains_key("sql"));
    }

    #[test]
    fn string_trims_and_bounds() {
        let mut v = RequestValidator::new(&json!({"prompt": "  cat  "}));
        v.string("prompt", 1, Some(1000), None);
        assert_eq!(v.validated()["prompt"], json!("cat"));

        let mut v = RequestValidator::new(&json!({"prompt": ""}));
        v.string("prompt", 1, Some(1000), None);
        assert!(v.errors().contains_key("prompt"));

        let long = "x".repeat(1001);
        let mut v = RequestValidator::new(&json!({ "prompt": long }));
        v.string("prompt", 1, Some(1000), None);
        assert!(v.errors().contains_key("prompt"));
    }

    #[test]
    fn length_bounds_count_characters_not_bytes() {
        // 600 CJK characters are 1800 bytes; they fit a 1000-character cap.
        let prompt = "画".repeat(600);
        let mut v = RequestValidator::new(&json!({ "prompt": prompt }));
        v.string("prompt", 1, Some(1000), None);
        assert!(v.is_valid());

        // Two characters are six bytes; still under a three-character floor.
        let mut v = RequestValidator::new(&json!({"prompt": "画猫"}));
        v.string("prompt", 3, None, None);
        assert!(v.errors().contains_key("prompt"));
    }

    #[test]
    fn non_string_is_rejected_by_string_rule() {
        let mut v = RequestValidator::new(&json!({"sql": 42}));
        v.string("sql", 1, Some(10000), None);
        assert_eq!(v.errors()["sql"], "sql must be a string");
    }

    #[test]
    fn url_accepts_scheme_and_host() {
        let mut v = RequestValidator::new(&json!({"reference_url": "https://host/path"}));
        v.url("reference_url");
        assert!(v.is_valid());
    }

    #[test]
    fn url_rejects_invalid_forms() {
        for bad in ["not-a-url", "ftp://", ""] {
            let mut v = RequestValidator::new(&json!({ "reference_url": bad }));
            v.url("reference_url");
            assert!(
                v.errors().contains_key("reference_url"),
                "expected rejection for {:?}",
                bad
            );
        }
    }

    #[test]
    fn integer_bounds_are_inclusive() {
        for (port, ok) in [(0i64, false), (1, true), (65535, true), (65536, false)] {
            let mut v = RequestValidator::new(&json!({ "port": port }));
            v.integer("port", Some(1), Some(65535));
            assert_eq!(v.is_valid(), ok, "port={}", port);
        }
    }

    #[test]
    fn integer_coerces_numeric_strings() {
        let mut v = RequestValidator::new(&json!({"port": "3306"}));
        v.integer("port", Some(1), Some(65535));
        assert_eq!(v.validated()["port"], json!(3306));

        let mut v = RequestValidator::new(&json!({"port": "abc"}));
        v.integer("port", Some(1), Some(65535));
        assert!(v.errors().contains_key("port"));
    }

    #[test]
    fn object_reports_all_missing_keys_in_one_message() {
        let mut v = RequestValidator::new(&json!({"connection": {"host": "h"}}));
        v.object("connection", &["host", "user", "password", "database"]);
        let msg = &v.errors()["connection"];
        assert!(msg.contains("user"));
        assert!(msg.contains("password"));
        assert!(msg.contains("database"));
        assert!(!msg.contains("host,"));
    }

    #[test]
    fn namespacing_prefixes_nested_errors() {
        let mut v = RequestValidator::new(&json!({"host": 1}));
        v.string("host", 1, None, None);
        let errors = namespace_errors("connection", v.finish().unwrap_err());
        assert!(errors.contains_key("connection.host"));
    }

    #[test]
    fn string_pattern_is_enforced() {
        let re = Regex::new(r"^[a-z]+$").unwrap();
        let mut v = RequestValidator::new(&json!({"name": "abc123"}));
        v.string("name", 1, None, Some(&re));
        assert!(v.errors().contains_key("name"));
    }
}
