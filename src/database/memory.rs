use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{document_version, DatabaseError, DocumentStore, StoreHealth};
use crate::filter::{Filter, FilterData};

type Collection = BTreeMap<String, Value>;

/// Process-local store used when no database URL is configured and in tests.
/// Collections iterate in key order, which matches the SQL tie-break.
#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn find(&self, collection: &str, query: &FilterData) -> Result<Vec<Value>, DatabaseError> {
        let filter = Filter::from_data(collection, query)?;
        let collections = self.collections.read().await;
        let docs = collections
            .get(collection)
            .map(|c| c.values().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        Ok(filter.apply(docs))
    }

    async fn count(&self, collection: &str, where_clause: &Value) -> Result<u64, DatabaseError> {
        let mut filter = Filter::new(collection)?;
        filter.where_clause(where_clause)?;
        let collections = self.collections.read().await;
        let count = collections
            .get(collection)
            .map(|c| c.values().filter(|doc| filter.matches(doc)).count())
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn find_one(&self, collection: &str, key: &str) -> Result<Option<Value>, DatabaseError> {
        let collections = self.collections.read().await;
        Ok(collections.get(collection).and_then(|c| c.get(key)).cloned())
    }

    async fn insert(&self, collection: &str, key: &str, doc: Value) -> Result<Value, DatabaseError> {
        Filter::new(collection)?;
        let mut collections = self.collections.write().await;
        let docs = collections.entry(collection.to_string()).or_default();
        if docs.contains_key(key) {
            return Err(DatabaseError::Duplicate(format!("{} {} already exists", collection, key)));
        }
        docs.insert(key.to_string(), doc.clone());
        Ok(doc)
    }

    async fn replace(
        &self,
        collection: &str,
        key: &str,
        expected_version: i64,
        doc: Value,
    ) -> Result<Value, DatabaseError> {
        let mut collections = self.collections.write().await;
        match collections.get_mut(collection).and_then(|c| c.get_mut(key)) {
            Some(slot) if document_version(slot) != expected_version => Err(DatabaseError::Stale(format!(
                "{} {} is at version {}, expected {}",
                collection,
                key,
                document_version(slot),
                expected_version
            ))),
            Some(slot) => {
                *slot = doc.clone();
                Ok(doc)
            }
            None => Err(DatabaseError::NotFound(format!("{} {} not found", collection, key))),
        }
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<Option<Value>, DatabaseError> {
        let mut collections = self.collections.write().await;
        Ok(collections.get_mut(collection).and_then(|c| c.remove(key)))
    }

    async fn keys(&self, collection: &str, prefix: &str) -> Result<Vec<String>, DatabaseError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .map(|c| c.keys().filter(|k| k.starts_with(prefix)).cloned().collect())
            .unwrap_or_default())
    }

    async fn health(&self) -> StoreHealth {
        StoreHealth::connected("memory")
    }

    async fn close(&self) {}
}
