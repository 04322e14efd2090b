use std::collections::HashMap;

use serde_json::{json, Map, Value};

use crate::config::CONFIG;
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::middleware::Pagination;

pub type QueryParams = HashMap<String, String>;

const DEFAULT_LIMIT: i64 = 20;

/// Validated `page`/`limit`/`sortBy`/`sortOrder` query parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    pub page: i64,
    pub limit: i64,
    pub sort_by: String,
    pub descending: bool,
}

impl PageRequest {
    pub fn from_params(params: &QueryParams) -> Result<Self, ApiError> {
        Self::with_default_sort(params, "createdAt")
    }

    pub fn with_default_sort(params: &QueryParams, default_sort: &str) -> Result<Self, ApiError> {
        let page = match non_empty(params, "page") {
            Some(raw) => parse_leading_int(raw)
                .filter(|p| *p >= 1)
                .ok_or_else(|| ApiError::bad_request("Page must be a positive integer"))?,
            None => 1,
        };

        let max = CONFIG.filter.max_limit.unwrap_or(100);
        let limit = match non_empty(params, "limit") {
            Some(raw) => parse_leading_int(raw)
                .filter(|l| (1..=max).contains(l))
                .ok_or_else(|| ApiError::bad_request(format!("Limit must be between 1 and {}", max)))?,
            None => DEFAULT_LIMIT.min(max),
        };

        if (page - 1).checked_mul(limit).is_none() {
            return Err(ApiError::bad_request("Page is out of range"));
        }

        let descending = match non_empty(params, "sortOrder") {
            Some(order) if order.eq_ignore_ascii_case("asc") => false,
            Some(order) if order.eq_ignore_ascii_case("desc") => true,
            Some(_) => return Err(ApiError::bad_request("Sort order must be \"asc\" or \"desc\"")),
            None => true,
        };

        let sort_by = non_empty(params, "sortBy").unwrap_or(default_sort).to_string();

        Ok(Self { page, limit, sort_by, descending })
    }

    pub fn offset(&self) -> i64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }

    pub fn order(&self) -> Value {
        json!({ self.sort_by.as_str(): if self.descending { -1 } else { 1 } })
    }

    pub fn to_filter_data(&self, where_clause: Value) -> FilterData {
        FilterData::new(where_clause)
            .order(self.order())
            .limit(self.limit)
            .offset(self.offset())
    }

    pub fn pagination(&self, total: u64) -> Pagination {
        Pagination::new(total, self.page as u64, self.limit as u64)
    }

    /// Slice an already-filtered in-memory list to this page.
    pub fn window<T: Clone>(&self, items: &[T]) -> Vec<T> {
        items
            .iter()
            .skip(usize::try_from(self.offset()).unwrap_or(usize::MAX))
            .take(usize::try_from(self.limit).unwrap_or(0))
            .cloned()
            .collect()
    }
}

/// `parseInt` semantics: leading sign and digits, trailing junk ignored.
fn parse_leading_int(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    let end = trimmed
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || (*i == 0 && (*c == '-' || *c == '+'))))
        .map(|(i, _)| i)
        .unwrap_or(trimmed.len());
    trimmed[..end].parse().ok()
}

pub fn non_empty<'a>(params: &'a QueryParams, key: &str) -> Option<&'a str> {
    params.get(key).map(|s| s.trim()).filter(|s| !s.is_empty())
}

/// Collects `filters[<path>]=<value>` parameters into equality conditions.
pub fn bracket_filters(params: &QueryParams) -> Map<String, Value> {
    params
        .iter()
        .filter_map(|(key, value)| {
            let path = key.strip_prefix("filters[")?.strip_suffix(']')?;
            if path.is_empty() || value.trim().is_empty() {
                return None;
            }
            Some((path.to_string(), Value::String(value.trim().to_string())))
        })
        .collect()
}

/// Case-insensitive substring match on literal user text.
pub fn contains_ci(text: &str) -> Value {
    json!({"$regex": regex::escape(text), "$options": "i"})
}

/// Accumulates list-endpoint conditions. Absent or empty values are skipped,
/// so optional query parameters can be passed straight through.
#[derive(Debug, Default, Clone)]
pub struct FilterBuilder {
    conditions: Map<String, Value>,
    groups: Vec<Value>,
}

impl FilterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, path: &str, value: Option<&str>) -> Self {
        if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
            self.conditions.insert(path.to_string(), Value::String(v.to_string()));
        }
        self
    }

    pub fn condition(mut self, path: &str, condition: Value) -> Self {
        self.conditions.insert(path.to_string(), condition);
        self
    }

    pub fn contains(mut self, path: &str, value: Option<&str>) -> Self {
        if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
            self.conditions.insert(path.to_string(), contains_ci(v));
        }
        self
    }

    /// Adds `{$or: [{path: contains(value)} ...]}` across `paths`.
    pub fn search(mut self, paths: &[&str], value: Option<&str>) -> Self {
        if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
            let alternatives: Vec<Value> = paths.iter().map(|p| json!({ *p: contains_ci(v) })).collect();
            self.groups.push(json!({ "$or": alternatives }));
        }
        self
    }

    pub fn any_of(mut self, alternatives: Vec<Value>) -> Self {
        if !alternatives.is_empty() {
            self.groups.push(json!({ "$or": alternatives }));
        }
        self
    }

    pub fn merge(mut self, extra: Map<String, Value>) -> Self {
        self.conditions.extend(extra);
        self
    }

    pub fn build(self) -> Value {
        let mut filter = self.conditions;
        match self.groups.len() {
            0 => {}
            1 => {
                if let Some(Value::Object(group)) = self.groups.into_iter().next() {
                    filter.extend(group);
                }
            }
            _ => {
                filter.insert("$and".to_string(), Value::Array(self.groups));
            }
        }
        Value::Object(filter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn page_defaults() {
        let page = PageRequest::from_params(&params(&[])).unwrap();
        assert_eq!(page, PageRequest { page: 1, limit: 20, sort_by: "createdAt".into(), descending: true });
        assert_eq!(page.offset(), 0);
        assert_eq!(page.order(), json!({"createdAt": -1}));
    }

    #[test]
    fn page_validation_messages() {
        let err = PageRequest::from_params(&params(&[("page", "0")])).unwrap_err();
        assert_eq!(err.message(), "Page must be a positive integer");
        let err = PageRequest::from_params(&params(&[("page", "abc")])).unwrap_err();
        assert_eq!(err.message(), "Page must be a positive integer");
        let err = PageRequest::from_params(&params(&[("limit", "101")])).unwrap_err();
        assert_eq!(err.message(), "Limit must be between 1 and 100");
        assert!(PageRequest::from_params(&params(&[("sortOrder", "sideways")])).is_err());

        let page = PageRequest::from_params(&params(&[("page", "3"), ("limit", "10"), ("sortOrder", "asc")])).unwrap();
        assert_eq!(page.offset(), 20);
        assert!(!page.descending);
    }

    #[test]
    fn huge_page_is_rejected_not_overflowed() {
        let err = PageRequest::from_params(&params(&[("page", "9223372036854775807"), ("limit", "100")])).unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.message(), "Page is out of range");

        let page = PageRequest::from_params(&params(&[("page", "9223372036854775807"), ("limit", "1")])).unwrap();
        assert_eq!(page.offset(), i64::MAX - 1);
        assert!(page.window(&[1, 2, 3]).is_empty());

        let forged = PageRequest { page: i64::MAX, limit: 100, sort_by: "createdAt".into(), descending: true };
        assert_eq!(forged.offset(), i64::MAX);
        assert!(forged.window(&[1, 2, 3]).is_empty());
    }

    #[test]
    fn builder_skips_empty_and_groups_ors() {
        let filter = FilterBuilder::new()
            .eq("status", Some("active"))
            .eq("employment.department", Some(""))
            .eq("missing", None)
            .contains("employment.position.title", Some("eng"))
            .search(&["firstName", "lastName"], Some("ada"))
            .build();
        assert_eq!(filter["status"], "active");
        assert!(filter.get("employment.department").is_none());
        assert_eq!(filter["employment.position.title"]["$options"], "i");
        assert_eq!(filter["$or"].as_array().unwrap().len(), 2);

        let two = FilterBuilder::new()
            .search(&["a"], Some("x"))
            .any_of(vec![json!({"b": 1})])
            .build();
        assert_eq!(two["$and"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn search_text_is_literal() {
        assert_eq!(contains_ci("a.b")["$regex"], "a\\.b");
    }

    #[test]
    fn collects_bracket_filters() {
        let extra = bracket_filters(&params(&[
            ("filters[status]", "active"),
            ("filters[employment.department]", "Research"),
            ("filters[]", "x"),
            ("q", "ada"),
        ]));
        assert_eq!(extra.len(), 2);
        assert_eq!(extra["employment.department"], "Research");
    }
}
