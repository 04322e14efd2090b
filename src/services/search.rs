use serde_json::{json, Value};

use super::documents::get_path;
use super::query::contains_ci;

/// Results returned by the `/search/*` endpoints.
pub const SEARCH_LIMIT: usize = 50;

/// Lowercased whitespace-separated terms of a search query.
pub fn terms(q: &str) -> Vec<String> {
    q.split_whitespace().map(str::to_lowercase).collect()
}

/// Filter matching documents where any term appears in any of `fields`.
pub fn any_term_filter(terms: &[String], fields: &[&str]) -> Value {
    let alternatives: Vec<Value> = terms
        .iter()
        .flat_map(|term| fields.iter().map(move |f| json!({ *f: contains_ci(term) })))
        .collect();
    json!({ "$or": alternatives })
}

/// Number of (term, field) pairs that hit. String arrays count per element.
pub fn score(doc: &Value, terms: &[String], fields: &[&str]) -> usize {
    let mut hits = 0;
    for field in fields {
        let texts: Vec<String> = match get_path(doc, field) {
            Some(Value::String(s)) => vec![s.to_lowercase()],
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).map(str::to_lowercase).collect(),
            _ => continue,
        };
        hits += terms.iter().filter(|t| texts.iter().any(|text| text.contains(t.as_str()))).count();
    }
    hits
}

/// Highest score first; ties keep store order. Truncated to `SEARCH_LIMIT`.
pub fn rank(mut docs: Vec<Value>, terms: &[String], fields: &[&str]) -> Vec<Value> {
    let mut scored: Vec<(usize, Value)> = docs.drain(..).map(|d| (score(&d, terms, fields), d)).collect();
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().take(SEARCH_LIMIT).map(|(_, d)| d).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::Filter;

    const FIELDS: &[&str] = &["firstName", "lastName", "employment.position.title"];

    #[test]
    fn ranks_by_hits() {
        let docs = vec![
            json!({"firstName": "Ada", "lastName": "Byron", "employment": {"position": {"title": "Analyst"}}}),
            json!({"firstName": "Ada", "lastName": "Lovelace", "employment": {"position": {"title": "Lovelace Fellow"}}}),
            json!({"firstName": "Grace", "lastName": "Hopper"}),
        ];
        let t = terms("ada  LOVELACE");
        let ranked = rank(docs, &t, FIELDS);
        assert_eq!(ranked[0]["lastName"], "Lovelace");
        assert_eq!(score(&ranked[2], &t, FIELDS), 0);
    }

    #[test]
    fn any_term_filter_matches() {
        let t = terms("hopp");
        let mut filter = Filter::new("employees").unwrap();
        filter.where_clause(&any_term_filter(&t, FIELDS)).unwrap();
        assert!(filter.matches(&json!({"lastName": "Hopper"})));
        assert!(!filter.matches(&json!({"lastName": "Byron"})));
    }
}
