use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};

use super::ids::object_id;

/// Keys a client update may never overwrite.
const SYSTEM_KEYS: &[&str] = &["_id", "createdAt", "updatedAt", "audit"];

pub fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Stamp a new document with `_id`, timestamps and a version 1 audit block.
pub fn stamp_created(doc: &mut Value, user_id: &str, now: DateTime<Utc>) {
    let ts = timestamp(now);
    if let Value::Object(map) = doc {
        map.entry("_id").or_insert_with(|| Value::String(object_id()));
        map.insert("createdAt".into(), Value::String(ts.clone()));
        map.insert("updatedAt".into(), Value::String(ts.clone()));
        map.insert(
            "audit".into(),
            json!({
                "createdBy": user_id,
                "updatedBy": user_id,
                "lastModified": ts,
                "version": 1
            }),
        );
    }
}

/// Refresh `updatedAt` and bump the audit version.
pub fn stamp_updated(doc: &mut Value, user_id: &str, now: DateTime<Utc>) {
    let ts = timestamp(now);
    let version = get_path(doc, "audit.version").and_then(Value::as_i64).unwrap_or(0) + 1;
    set_path(doc, "updatedAt", Value::String(ts.clone()));
    set_path(doc, "audit.updatedBy", Value::String(user_id.to_string()));
    set_path(doc, "audit.lastModified", Value::String(ts));
    set_path(doc, "audit.version", Value::from(version));
}

pub fn get_path<'a>(doc: &'a Value, dotted: &str) -> Option<&'a Value> {
    dotted.split('.').try_fold(doc, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

pub fn get_path_mut<'a>(doc: &'a mut Value, dotted: &str) -> Option<&'a mut Value> {
    dotted.split('.').try_fold(doc, |current, segment| match current {
        Value::Object(map) => map.get_mut(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(move |i| items.get_mut(i)),
        _ => None,
    })
}

/// String at `dotted`, or `""`.
pub fn text_at<'a>(doc: &'a Value, dotted: &str) -> &'a str {
    get_path(doc, dotted).and_then(Value::as_str).unwrap_or("")
}

/// Set `dotted` to `value`, creating (or replacing non-object) intermediates.
pub fn set_path(doc: &mut Value, dotted: &str, value: Value) {
    let mut current = doc;
    let mut segments = dotted.split('.').peekable();
    while let Some(segment) = segments.next() {
        if !current.is_object() {
            *current = Value::Object(Map::new());
        }
        let Value::Object(map) = current else { return };
        if segments.peek().is_none() {
            map.insert(segment.to_string(), value);
            return;
        }
        current = map.entry(segment.to_string()).or_insert_with(|| Value::Object(Map::new()));
    }
}

/// Set `dotted` only when nothing is there yet.
pub fn set_default(doc: &mut Value, dotted: &str, value: Value) {
    if get_path(doc, dotted).map_or(true, Value::is_null) {
        set_path(doc, dotted, value);
    }
}

/// Apply a client update: dotted keys set nested fields, plain keys replace
/// the whole top-level field. System keys and `protected` keys are ignored.
/// Returns the names of the fields that were written.
pub fn apply_update(doc: &mut Value, updates: &Map<String, Value>, protected: &[&str]) -> Vec<String> {
    let mut written = Vec::new();
    for (key, value) in updates {
        let root = key.split('.').next().unwrap_or(key);
        if SYSTEM_KEYS.contains(&root) || protected.contains(&root) {
            continue;
        }
        set_path(doc, key, value.clone());
        written.push(key.clone());
    }
    written
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamps_and_bumps_version() {
        let now = Utc::now();
        let mut doc = json!({"firstName": "Ada"});
        stamp_created(&mut doc, "u1", now);
        assert!(doc["_id"].is_string());
        assert_eq!(doc["audit"]["version"], 1);
        assert_eq!(doc["createdAt"], doc["updatedAt"]);

        stamp_updated(&mut doc, "u2", now);
        stamp_updated(&mut doc, "u2", now);
        assert_eq!(doc["audit"]["version"], 3);
        assert_eq!(doc["audit"]["createdBy"], "u1");
        assert_eq!(doc["audit"]["updatedBy"], "u2");
    }

    #[test]
    fn dotted_paths() {
        let mut doc = json!({"employment": {"position": {"title": "Engineer"}}, "tags": ["a", "b"]});
        assert_eq!(text_at(&doc, "employment.position.title"), "Engineer");
        assert_eq!(text_at(&doc, "tags.1"), "b");
        assert_eq!(text_at(&doc, "employment.missing"), "");

        set_path(&mut doc, "employment.endDate", json!("2024-01-01"));
        set_path(&mut doc, "compensation.salary.amount", json!(100));
        assert_eq!(doc["employment"]["position"]["title"], "Engineer");
        assert_eq!(doc["compensation"]["salary"]["amount"], 100);

        set_default(&mut doc, "compensation.salary.currency", json!("USD"));
        set_default(&mut doc, "compensation.salary.amount", json!(5));
        assert_eq!(doc["compensation"]["salary"]["currency"], "USD");
        assert_eq!(doc["compensation"]["salary"]["amount"], 100);
    }

    #[test]
    fn update_skips_protected_keys() {
        let mut doc = json!({"employeeId": "EMP000001", "firstName": "Ada", "audit": {"version": 1}});
        let updates = json!({
            "employeeId": "EMP999999",
            "firstName": "Grace",
            "audit.version": 99,
            "employment.department": "Research"
        });
        let written = apply_update(&mut doc, updates.as_object().unwrap(), &["employeeId"]);
        assert_eq!(written, vec!["employment.department".to_string(), "firstName".to_string()]);
        assert_eq!(doc["employeeId"], "EMP000001");
        assert_eq!(doc["firstName"], "Grace");
        assert_eq!(doc["audit"]["version"], 1);
    }
}
