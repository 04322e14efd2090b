use std::cmp::Ordering;

use serde_json::Value;

use super::error::FilterError;
use super::filter_where::DOC_COLUMN;
use super::matcher::{compare_scalars, resolve};
use super::types::{FieldPath, FilterOrderInfo, SortDirection};

pub struct FilterOrder;

impl FilterOrder {
    /// Accepts `"field"`, `"-field"`, `"a desc, b"`, `["a", "-b"]` or `{"a": 1, "b": -1}`.
    pub fn validate_and_parse(order: &Value) -> Result<Vec<FilterOrderInfo>, FilterError> {
        match order {
            Value::String(s) => Self::parse_order_string(s),
            Value::Array(arr) => {
                let mut out = Vec::new();
                for v in arr {
                    if let Value::String(s) = v {
                        out.extend(Self::parse_order_string(s)?);
                    }
                }
                Ok(out)
            }
            Value::Object(obj) => {
                let mut out = Vec::new();
                for (k, v) in obj {
                    let sort = match v {
                        Value::Number(n) if n.as_i64() == Some(-1) => SortDirection::Desc,
                        Value::String(s) if s.eq_ignore_ascii_case("desc") => SortDirection::Desc,
                        _ => SortDirection::Asc,
                    };
                    out.push(FilterOrderInfo { path: Self::validate_path(k)?, sort });
                }
                Ok(out)
            }
            _ => Ok(vec![]),
        }
    }

    fn parse_order_string(s: &str) -> Result<Vec<FilterOrderInfo>, FilterError> {
        let mut out = Vec::new();
        for part in s.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                continue;
            }
            let mut it = trimmed.split_whitespace();
            if let Some(col) = it.next() {
                let (col, mut sort) = match col.strip_prefix('-') {
                    Some(rest) => (rest, SortDirection::Desc),
                    None => (col, SortDirection::Asc),
                };
                if let Some(dir) = it.next() {
                    sort = if dir.eq_ignore_ascii_case("desc") { SortDirection::Desc } else { SortDirection::Asc };
                }
                out.push(FilterOrderInfo { path: Self::validate_path(col)?, sort });
            }
        }
        Ok(out)
    }

    /// Sort paths are inlined into SQL, so segments are restricted to word characters.
    fn validate_path(path: &str) -> Result<FieldPath, FilterError> {
        let parsed = FieldPath::parse(path).ok_or_else(|| FilterError::InvalidField(path.to_string()))?;
        let valid = parsed
            .segments()
            .iter()
            .all(|s| s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
        if !valid {
            return Err(FilterError::InvalidField(path.to_string()));
        }
        Ok(parsed)
    }

    pub fn generate(infos: &[FilterOrderInfo]) -> String {
        let mut parts: Vec<String> = infos
            .iter()
            .map(|i| format!("{} #> '{{{}}}' {} NULLS LAST", DOC_COLUMN, i.path.segments().join(","), i.sort.to_sql()))
            .collect();
        // Stable tie-break on the document key
        parts.push("key ASC".to_string());
        format!("ORDER BY {}", parts.join(", "))
    }

    /// In-memory counterpart of `generate`: jsonb type ordering, missing values last.
    pub fn compare(a: &Value, b: &Value, infos: &[FilterOrderInfo]) -> Ordering {
        for info in infos {
            let left = resolve(a, info.path.segments()).into_iter().next();
            let right = resolve(b, info.path.segments()).into_iter().next();
            let ord = match (left, right) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(x), Some(y)) => {
                    let ord = compare_values(x, y);
                    if info.sort == SortDirection::Desc {
                        ord.reverse()
                    } else {
                        ord
                    }
                }
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::String(_) => 1,
        Value::Number(_) => 2,
        Value::Bool(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match compare_scalars(a, b) {
        Some(ord) => ord,
        None => match type_rank(a).cmp(&type_rank(b)) {
            Ordering::Equal => a.to_string().cmp(&b.to_string()),
            other => other,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_all_spec_shapes() {
        let from_object = FilterOrder::validate_and_parse(&json!({"createdAt": -1})).unwrap();
        assert_eq!(from_object[0].sort, SortDirection::Desc);

        let from_prefix = FilterOrder::validate_and_parse(&json!("-audit.lastModified, title")).unwrap();
        assert_eq!(from_prefix.len(), 2);
        assert_eq!(from_prefix[0].path.dotted(), "audit.lastModified");
        assert_eq!(from_prefix[0].sort, SortDirection::Desc);
        assert_eq!(from_prefix[1].sort, SortDirection::Asc);

        assert!(FilterOrder::validate_and_parse(&json!({"title'); DROP": 1})).is_err());
    }

    #[test]
    fn renders_jsonb_order_by() {
        let infos = FilterOrder::validate_and_parse(&json!({"timeline.startDate": -1})).unwrap();
        assert_eq!(
            FilterOrder::generate(&infos),
            "ORDER BY doc #> '{timeline,startDate}' DESC NULLS LAST, key ASC"
        );
    }

    #[test]
    fn missing_values_sort_last_both_ways() {
        let mut docs = vec![json!({"n": 2}), json!({}), json!({"n": 10})];
        let asc = FilterOrder::validate_and_parse(&json!("n")).unwrap();
        docs.sort_by(|a, b| FilterOrder::compare(a, b, &asc));
        assert_eq!(docs, vec![json!({"n": 2}), json!({"n": 10}), json!({})]);

        let desc = FilterOrder::validate_and_parse(&json!("-n")).unwrap();
        docs.sort_by(|a, b| FilterOrder::compare(a, b, &desc));
        assert_eq!(docs, vec![json!({"n": 10}), json!({"n": 2}), json!({})]);
    }
}
