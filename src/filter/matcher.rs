use std::cmp::Ordering;

use serde_json::Value;

use super::filter_where::truthy;
use super::types::{FilterNode, FilterOp, FilterWhereInfo};

/// Evaluate a parsed filter against one document in memory. Semantics follow
/// the SQL rendering: paths fan out over arrays, comparisons between
/// different JSON types never match, and null equality also matches a
/// missing field.
pub fn matches(node: &FilterNode, doc: &Value) -> bool {
    match node {
        FilterNode::And(children) => children.iter().all(|c| matches(c, doc)),
        FilterNode::Or(children) => children.iter().any(|c| matches(c, doc)),
        FilterNode::Not(inner) => !matches(inner, doc),
        FilterNode::Condition(condition) => condition_matches(condition, doc),
    }
}

fn condition_matches(condition: &FilterWhereInfo, doc: &Value) -> bool {
    let found = resolve(doc, condition.path.segments());
    match condition.operator {
        FilterOp::Eq => equals(&found, &condition.data),
        FilterOp::Ne => !equals(&found, &condition.data),
        FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte => candidates(&found).into_iter().any(|v| {
            match compare_scalars(v, &condition.data) {
                Some(ord) => match condition.operator {
                    FilterOp::Gt => ord == Ordering::Greater,
                    FilterOp::Gte => ord != Ordering::Less,
                    FilterOp::Lt => ord == Ordering::Less,
                    _ => ord != Ordering::Greater,
                },
                None => false,
            }
        }),
        FilterOp::In => in_list(&found, &condition.data),
        FilterOp::NIn => !in_list(&found, &condition.data),
        FilterOp::Regex => match &condition.pattern {
            Some(re) => candidates(&found)
                .into_iter()
                .any(|v| v.as_str().map(|s| re.is_match(s)).unwrap_or(false)),
            None => false,
        },
        FilterOp::Exists => found.is_empty() != truthy(&condition.data),
    }
}

/// All values reachable at `path`, descending into array elements.
pub fn resolve<'a>(doc: &'a Value, path: &[String]) -> Vec<&'a Value> {
    let mut current = vec![doc];
    for segment in path {
        let mut next = Vec::new();
        for value in current {
            match value {
                Value::Object(map) => {
                    if let Some(child) = map.get(segment) {
                        next.push(child);
                    }
                }
                Value::Array(items) => {
                    if let Ok(index) = segment.parse::<usize>() {
                        if let Some(child) = items.get(index) {
                            next.push(child);
                        }
                    } else {
                        next.extend(items.iter().filter_map(|item| item.get(segment)));
                    }
                }
                _ => {}
            }
        }
        current = next;
    }
    current
}

/// Leaf values for comparison: arrays contribute their elements.
fn candidates<'a>(found: &[&'a Value]) -> Vec<&'a Value> {
    let mut out = Vec::new();
    for value in found {
        match value {
            Value::Array(items) => out.extend(items.iter()),
            other => out.push(*other),
        }
    }
    out
}

fn equals(found: &[&Value], expected: &Value) -> bool {
    match expected {
        Value::Null => found.is_empty() || candidates(found).iter().any(|v| v.is_null()),
        Value::Array(_) | Value::Object(_) => found.iter().any(|v| *v == expected),
        _ => candidates(found)
            .into_iter()
            .any(|v| compare_scalars(v, expected) == Some(Ordering::Equal)),
    }
}

fn in_list(found: &[&Value], list: &Value) -> bool {
    list.as_array()
        .map(|values| values.iter().any(|expected| equals(found, expected)))
        .unwrap_or(false)
}

/// Ordering between two scalars of the same JSON type.
pub fn compare_scalars(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::filter_where::FilterWhere;
    use serde_json::json;

    fn check(filter: Value, doc: &Value) -> bool {
        matches(&FilterWhere::parse(&filter).unwrap(), doc)
    }

    fn project() -> Value {
        json!({
            "projectId": "PROJ000001",
            "status": "active",
            "classification": {"keywords": ["genomics", "ml"]},
            "funding": {"totalBudget": {"amount": 250000}},
            "team": {
                "principalInvestigator": {"userId": "u1"},
                "coInvestigators": [{"userId": "u2", "status": "active"}, {"userId": "u3", "status": "left"}]
            },
            "publications": [{"title": "First"}],
            "timeline": {"expectedEndDate": "2025-06-01T00:00:00Z", "actualEndDate": null}
        })
    }

    #[test]
    fn equality_and_comparison() {
        let doc = project();
        assert!(check(json!({"status": "active"}), &doc));
        assert!(!check(json!({"status": "completed"}), &doc));
        assert!(check(json!({"funding.totalBudget.amount": {"$gt": 0}}), &doc));
        assert!(check(json!({"funding.totalBudget.amount": {"$lte": 250000.0}}), &doc));
        assert!(!check(json!({"funding.totalBudget.amount": {"$gt": "0"}}), &doc));
        assert!(check(json!({"timeline.expectedEndDate": {"$lt": "2026-01-01T00:00:00Z"}}), &doc));
    }

    #[test]
    fn arrays_fan_out() {
        let doc = project();
        assert!(check(json!({"classification.keywords": "ml"}), &doc));
        assert!(check(json!({"team.coInvestigators.userId": "u3"}), &doc));
        assert!(check(json!({"team.coInvestigators.1.status": "left"}), &doc));
        assert!(check(json!({"publications.0": {"$exists": true}}), &doc));
        assert!(!check(json!({"publications.1": {"$exists": true}}), &doc));
    }

    #[test]
    fn logical_operators() {
        let doc = project();
        let anyone = json!({"$or": [
            {"team.principalInvestigator.userId": "u9"},
            {"team.coInvestigators.userId": "u2"}
        ]});
        assert!(check(anyone, &doc));
        assert!(!check(json!({"$and": [{"status": "active"}, {"status": {"$ne": "active"}}]}), &doc));
        assert!(check(json!({"status": {"$not": {"$in": ["completed", "cancelled"]}}}), &doc));
        assert!(check(json!({"status": {"$nin": ["completed"]}}), &doc));
    }

    #[test]
    fn regex_and_nulls() {
        let doc = project();
        assert!(check(json!({"projectId": {"$regex": "proj0+1", "$options": "i"}}), &doc));
        assert!(!check(json!({"projectId": {"$regex": "proj0+1"}}), &doc));
        assert!(check(json!({"timeline.actualEndDate": null}), &doc));
        assert!(check(json!({"timeline.missing": null}), &doc));
        assert!(!check(json!({"status": null}), &doc));
    }
}
