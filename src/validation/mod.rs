// validation/mod.rs - Request validators run before handlers touch the store
//
// Each framework module exposes one function per endpoint returning
// `Result<(), ApiError>`; all failures for a request are collected and
// reported together as `400 Validation failed`.

pub mod hrms;
pub mod nose;
pub mod webhunter;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{ApiError, FieldError};
use crate::services::dates::parse_datetime;
use crate::services::query::QueryParams;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Required,
    Optional,
}

use Presence::{Optional, Required};

/// Collects field errors for one request source (`body`, `query`, `params`).
/// Paths are dotted; a `*` segment visits every element of an array and is
/// reported as `parent[index]`.
pub struct Validator<'a> {
    source: &'a Value,
    location: &'static str,
    errors: Vec<FieldError>,
}

impl<'a> Validator<'a> {
    pub fn body(source: &'a Value) -> Self {
        Self { source, location: "body", errors: vec![] }
    }

    pub fn params(source: &'a Value) -> Self {
        Self { source, location: "params", errors: vec![] }
    }

    pub fn query(source: &'a Value) -> Self {
        Self { source, location: "query", errors: vec![] }
    }

    /// Core rule: every value at `path` must satisfy `valid`. Missing or null
    /// values fail only when `presence` is `Required`.
    pub fn check(
        &mut self,
        path: &str,
        presence: Presence,
        message: &str,
        valid: impl Fn(&Value) -> bool,
    ) -> &mut Self {
        for (field, value) in resolve(self.source, path) {
            let ok = match value {
                None | Some(Value::Null) => presence == Optional,
                Some(v) => valid(v),
            };
            if !ok {
                let reported = value.cloned().unwrap_or(Value::Null);
                self.errors.push(FieldError::new(field, message, reported, self.location));
            }
        }
        self
    }

    /// Trimmed character length within `min..=max`.
    pub fn length(&mut self, path: &str, presence: Presence, min: usize, max: usize, message: &str) -> &mut Self {
        self.check(path, presence, message, |v| {
            v.as_str()
                .map(|s| (min..=max).contains(&s.trim().chars().count()))
                .unwrap_or(false)
        })
    }

    pub fn one_of(&mut self, path: &str, presence: Presence, allowed: &[&str], message: &str) -> &mut Self {
        self.check(path, presence, message, |v| v.as_str().map(|s| allowed.contains(&s)).unwrap_or(false))
    }

    pub fn email(&mut self, path: &str, presence: Presence, message: &str) -> &mut Self {
        self.check(path, presence, message, |v| v.as_str().map(|s| EMAIL_RE.is_match(s.trim())).unwrap_or(false))
    }

    pub fn iso_date(&mut self, path: &str, presence: Presence, message: &str) -> &mut Self {
        self.check(path, presence, message, |v| v.as_str().and_then(parse_datetime).is_some())
    }

    /// Number (or numeric string) within `min..=max`.
    pub fn number(&mut self, path: &str, presence: Presence, min: f64, max: f64, message: &str) -> &mut Self {
        self.check(path, presence, message, |v| as_number(v).map(|n| n >= min && n <= max).unwrap_or(false))
    }

    /// Integer (or integer string) of at least `min`.
    pub fn integer(&mut self, path: &str, presence: Presence, min: i64, message: &str) -> &mut Self {
        self.check(path, presence, message, |v| as_integer(v).map(|n| n >= min).unwrap_or(false))
    }

    pub fn boolean(&mut self, path: &str, presence: Presence, message: &str) -> &mut Self {
        self.check(path, presence, message, |v| {
            v.is_boolean() || matches!(v.as_str(), Some("true") | Some("false"))
        })
    }

    pub fn array(&mut self, path: &str, presence: Presence, min_items: usize, message: &str) -> &mut Self {
        self.check(path, presence, message, |v| v.as_array().map(|a| a.len() >= min_items).unwrap_or(false))
    }

    pub fn object(&mut self, path: &str, presence: Presence, message: &str) -> &mut Self {
        self.check(path, presence, message, Value::is_object)
    }

    pub fn pattern(&mut self, path: &str, presence: Presence, re: &Regex, message: &str) -> &mut Self {
        self.check(path, presence, message, |v| v.as_str().map(|s| re.is_match(s.trim())).unwrap_or(false))
    }

    /// Fails when anything is present at `path`.
    pub fn absent(&mut self, path: &str, message: &str) -> &mut Self {
        self.check(path, Optional, message, |_| false)
    }

    /// Adds an error for a cross-field rule evaluated by the caller.
    pub fn reject(&mut self, field: &str, message: &str) -> &mut Self {
        let value = resolve(self.source, field)
            .into_iter()
            .next()
            .and_then(|(_, v)| v.cloned())
            .unwrap_or(Value::Null);
        self.errors.push(FieldError::new(field, message, value, self.location));
        self
    }

    pub fn source(&self) -> &'a Value {
        self.source
    }

    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn finish(self) -> Result<(), ApiError> {
        finish_all(vec![self])
    }
}

/// Combine validators over several sources into one outcome.
pub fn finish_all(validators: Vec<Validator<'_>>) -> Result<(), ApiError> {
    let errors: Vec<FieldError> = validators.into_iter().flat_map(|v| v.errors).collect();
    if errors.is_empty() {
        return Ok(());
    }
    let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
    tracing::warn!(?fields, "Validation failed");
    Err(ApiError::validation_failed(errors))
}

/// Query string as a JSON object so it can be validated like a body.
pub fn query_value(params: &QueryParams) -> Value {
    Value::Object(
        params
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect::<Map<String, Value>>(),
    )
}

pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

pub fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Expand `path` against `source` into `(reported field name, value)` pairs.
fn resolve<'v>(source: &'v Value, path: &str) -> Vec<(String, Option<&'v Value>)> {
    let mut current: Vec<(String, Option<&'v Value>)> = vec![(String::new(), Some(source))];
    for segment in path.split('.') {
        let mut next = Vec::new();
        for (name, value) in current {
            if segment == "*" {
                if let Some(Value::Array(items)) = value {
                    for (i, item) in items.iter().enumerate() {
                        next.push((format!("{}[{}]", name, i), Some(item)));
                    }
                }
                continue;
            }
            let child = value.and_then(|v| v.get(segment));
            let field = if name.is_empty() { segment.to_string() } else { format!("{}.{}", name, segment) };
            next.push((field, child));
        }
        current = next;
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn required_and_optional() {
        let body = json!({"firstName": "A", "email": "ada@example.com"});
        let mut v = Validator::body(&body);
        v.length("firstName", Required, 2, 50, "First name must be between 2 and 50 characters")
            .length("lastName", Required, 2, 50, "Last name must be between 2 and 50 characters")
            .email("email", Required, "Valid email is required")
            .iso_date("personalInfo.dateOfBirth", Optional, "Valid date of birth is required");
        let fields: Vec<&str> = v.errors().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["firstName", "lastName"]);
        assert_eq!(v.errors()[0].value, json!("A"));
        assert_eq!(v.errors()[0].location, "body");
        assert!(v.finish().is_err());
    }

    #[test]
    fn wildcards_report_indexed_fields() {
        let body = json!({
            "description": {"objectives": ["long enough objective", "short"]},
            "funding": {"sources": [{"organization": "NSF", "amount": -1}]}
        });
        let mut v = Validator::body(&body);
        v.length("description.objectives.*", Required, 10, 500, "Each objective must be between 10 and 500 characters")
            .number("funding.sources.*.amount", Optional, 0.0, f64::MAX, "Funding amount must be a positive number")
            .length("timeline.milestones.*.title", Optional, 5, 100, "Milestone title must be between 5 and 100 characters");
        let fields: Vec<&str> = v.errors().iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, vec!["description.objectives[1]", "funding.sources[0].amount"]);
    }

    #[test]
    fn numbers_accept_numeric_strings() {
        assert_eq!(as_number(&json!("12.5")), Some(12.5));
        assert_eq!(as_number(&json!("abc")), None);
        assert_eq!(as_integer(&json!(3.0)), Some(3));
        assert_eq!(as_integer(&json!(3.5)), None);
    }

    #[test]
    fn query_sources() {
        let params: QueryParams = [("page".to_string(), "0".to_string())].into_iter().collect();
        let q = query_value(&params);
        let mut v = Validator::query(&q);
        v.integer("page", Optional, 1, "Page must be a positive integer");
        assert_eq!(v.errors()[0].location, "query");
    }
}
