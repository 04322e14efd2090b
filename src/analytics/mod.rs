// analytics/mod.rs - Aggregations computed in memory over fetched documents
//
// Every report is a pure function of the documents and an injected `now`,
// so handlers fetch, call, and wrap the result in the response envelope.

pub mod hrms;
pub mod nose;
pub mod quality;

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Map, Value};

use crate::services::dates::{month_key, month_start};
use crate::services::documents::get_path;

/// Lookback windows accepted by the `timeRange` query parameter.
pub fn range_start(now: DateTime<Utc>, time_range: &str, default: &str) -> (String, DateTime<Utc>) {
    let days = |range: &str| match range {
        "1month" => Some(30),
        "3months" => Some(90),
        "6months" => Some(180),
        "1year" => Some(365),
        "2years" => Some(730),
        _ => None,
    };
    match days(time_range) {
        Some(d) => (time_range.to_string(), now - Duration::days(d)),
        None => (default.to_string(), now - Duration::days(days(default).unwrap_or(180))),
    }
}

/// Tally of the string at `path`, using `fallback` when it is missing.
pub fn count_by(docs: &[Value], path: &str, fallback: &str) -> Map<String, Value> {
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for doc in docs {
        let key = get_path(doc, path).and_then(Value::as_str).unwrap_or(fallback);
        *counts.entry(key.to_string()).or_default() += 1;
    }
    counts.into_iter().map(|(k, v)| (k, Value::from(v))).collect()
}

pub fn number_at(doc: &Value, path: &str) -> f64 {
    get_path(doc, path).and_then(Value::as_f64).unwrap_or(0.0)
}

pub fn array_at<'a>(doc: &'a Value, path: &str) -> &'a [Value] {
    get_path(doc, path).and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[])
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Two-decimal rounding for rates and averages.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `[{month, count}]` for every month from `start` through `now`, with
/// `dates` counted into the month they fall in.
pub fn monthly_counts(start: DateTime<Utc>, now: DateTime<Utc>, dates: impl IntoIterator<Item = DateTime<Utc>>) -> Vec<Value> {
    let mut months: BTreeMap<String, u64> = BTreeMap::new();
    let first = month_start(start, 0);
    let mut back = 0;
    loop {
        let cursor = month_start(now, back);
        if cursor < first {
            break;
        }
        months.insert(month_key(cursor), 0);
        back += 1;
    }
    for date in dates {
        if let Some(count) = months.get_mut(&month_key(date)) {
            *count += 1;
        }
    }
    months.into_iter().map(|(month, count)| json!({"month": month, "count": count})).collect()
}

/// `[{month, <field>}]` sorted by month for whatever months occur.
pub fn sparse_monthly(entries: impl IntoIterator<Item = (DateTime<Utc>, f64)>, field: &str) -> Vec<Value> {
    let mut months: BTreeMap<String, f64> = BTreeMap::new();
    for (date, amount) in entries {
        *months.entry(month_key(date)).or_default() += amount;
    }
    months
        .into_iter()
        .map(|(month, amount)| {
            let mut row = Map::new();
            row.insert("month".into(), Value::String(month));
            row.insert(field.into(), json!(amount));
            Value::Object(row)
        })
        .collect()
}
