use std::time::Duration;

use serde_json::{json, Value};

use crate::database::{document_version, DatabaseError, DocumentStore};
use crate::error::ApiError;
use crate::filter::FilterData;
use crate::services::documents::set_path;
use crate::services::query::{non_empty, PageRequest, QueryParams};
use crate::services::search::{any_term_filter, rank, terms};

/// Every document in `collection` matching `where_clause`, in `order`.
pub async fn fetch_all(
    store: &dyn DocumentStore,
    collection: &str,
    where_clause: Value,
    order: Value,
) -> Result<Vec<Value>, ApiError> {
    Ok(store.find(collection, &FilterData::new(where_clause).order(order)).await?)
}

/// One page of matches plus the total count.
pub async fn fetch_page(
    store: &dyn DocumentStore,
    collection: &str,
    where_clause: Value,
    page: &PageRequest,
) -> Result<(Vec<Value>, u64), ApiError> {
    let total = store.count(collection, &where_clause).await?;
    let docs = store.find(collection, &page.to_filter_data(where_clause)).await?;
    Ok((docs, total))
}

/// Loads by key or fails with 404 and `missing`.
pub async fn require_doc(store: &dyn DocumentStore, collection: &str, key: &str, missing: &str) -> Result<Value, ApiError> {
    store
        .find_one(collection, key)
        .await?
        .ok_or_else(|| ApiError::not_found(missing))
}

/// Attempts made when another writer bumps the version between load and write.
const UPDATE_ATTEMPTS: u32 = 25;

/// Read-modify-write of one document. The write only lands while the stored
/// `audit.version` is still the one that was loaded; otherwise the document
/// is reloaded and `edit` runs again on the fresh copy. Returns the stored
/// document and whatever `edit` produced.
pub async fn update_doc<T, F>(
    store: &dyn DocumentStore,
    collection: &str,
    key: &str,
    missing: &str,
    mut edit: F,
) -> Result<(Value, T), ApiError>
where
    F: FnMut(&mut Value) -> Result<T, ApiError>,
{
    for attempt in 1..=UPDATE_ATTEMPTS {
        let mut doc = require_doc(store, collection, key, missing).await?;
        let expected = document_version(&doc);
        let output = edit(&mut doc)?;
        set_path(&mut doc, "audit.version", json!(expected + 1));

        match store.replace(collection, key, expected, doc).await {
            Ok(saved) => return Ok((saved, output)),
            Err(DatabaseError::Stale(msg)) => {
                tracing::debug!(collection, key, attempt, "{}, retrying", msg);
                let jitter = (uuid::Uuid::new_v4().as_u128() % 4) as u64;
                tokio::time::sleep(Duration::from_millis(u64::from(attempt) + jitter)).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
    tracing::warn!(collection, key, "Gave up after {} conflicting writes", UPDATE_ATTEMPTS);
    Err(ApiError::conflict(format!(
        "{} was modified concurrently, please retry",
        key
    )))
}

/// The trimmed `q` parameter, at least two characters.
pub fn search_text(params: &QueryParams) -> Result<&str, ApiError> {
    match non_empty(params, "q") {
        Some(q) if q.chars().count() >= 2 => Ok(q),
        _ => Err(ApiError::bad_request("Search query must be at least 2 characters long")),
    }
}

/// Term search over `fields`, further narrowed by `extra`, ranked by hits.
pub async fn ranked_search(
    store: &dyn DocumentStore,
    collection: &str,
    q: &str,
    fields: &[&str],
    extra: serde_json::Map<String, Value>,
) -> Result<Vec<Value>, ApiError> {
    let words = terms(q);
    let mut where_clause = extra;
    where_clause.insert("$and".into(), json!([any_term_filter(&words, fields)]));
    let docs = fetch_all(store, collection, Value::Object(where_clause), json!({})).await?;
    Ok(rank(docs, &words, fields))
}

/// `format` query parameter, defaulting to json.
pub fn export_format(params: &QueryParams) -> String {
    non_empty(params, "format").unwrap_or("json").to_ascii_lowercase()
}

/// Index of the element of `items` whose `field` equals `id`.
pub fn position_by(items: &[Value], field: &str, id: &str) -> Option<usize> {
    items.iter().position(|item| item.get(field).and_then(Value::as_str) == Some(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::database::MemoryStore;

    const PROJECTS: &str = "research_projects";

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_edits_all_land() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert(PROJECTS, "PROJ000001", json!({"publications": [], "audit": {"version": 1}}))
            .await
            .unwrap();

        let mut tasks = Vec::new();
        for n in 0..32 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                update_doc(store.as_ref(), PROJECTS, "PROJ000001", "missing", |doc| {
                    if let Some(Value::Array(items)) = doc.get_mut("publications") {
                        items.push(json!(n));
                    }
                    Ok(n)
                })
                .await
            }));
        }
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let doc = store.find_one(PROJECTS, "PROJ000001").await.unwrap().unwrap();
        assert_eq!(doc["publications"].as_array().map(Vec::len), Some(32));
        assert_eq!(document_version(&doc), 33);
    }

    #[tokio::test]
    async fn edit_errors_and_missing_documents_write_nothing() {
        let store = MemoryStore::new();
        store
            .insert(PROJECTS, "PROJ000001", json!({"title": "a", "audit": {"version": 4}}))
            .await
            .unwrap();

        let missing = update_doc(&store, PROJECTS, "PROJ000002", "Research project not found", |_| Ok(())).await;
        assert_eq!(missing.unwrap_err().status_code(), 404);

        let rejected = update_doc(&store, PROJECTS, "PROJ000001", "missing", |doc| {
            set_path(doc, "title", json!("b"));
            Err::<(), _>(ApiError::bad_request("nope"))
        })
        .await;
        assert_eq!(rejected.unwrap_err().status_code(), 400);

        let (saved, ()) = update_doc(&store, PROJECTS, "PROJ000001", "missing", |doc| {
            set_path(doc, "title", json!("c"));
            Ok(())
        })
        .await
        .unwrap();
        assert_eq!(saved["title"], "c");
        assert_eq!(document_version(&saved), 5);
    }
}
