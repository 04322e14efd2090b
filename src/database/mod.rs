pub mod manager;
pub mod memory;
pub mod postgres;
pub mod query_builder;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::filter::{FilterData, FilterError};

pub use manager::DatabaseManager;
pub use memory::MemoryStore;
pub use postgres::PgDocumentStore;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate key: {0}")]
    Duplicate(String),

    #[error("Stale write: {0}")]
    Stale(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Connectivity summary reported by `/health`.
#[derive(Debug, Clone, Serialize)]
pub struct StoreHealth {
    pub status: &'static str,
    pub name: String,
}

impl StoreHealth {
    pub fn connected(name: impl Into<String>) -> Self {
        Self { status: "connected", name: name.into() }
    }

    pub fn disconnected(name: impl Into<String>) -> Self {
        Self { status: "disconnected", name: name.into() }
    }

    pub fn is_connected(&self) -> bool {
        self.status == "connected"
    }
}

/// The `audit.version` a document was stored with, 0 when unversioned.
pub fn document_version(doc: &Value) -> i64 {
    doc.pointer("/audit/version").and_then(Value::as_i64).unwrap_or(0)
}

/// Keyed JSON document storage, one namespace per collection. Documents are
/// addressed by their business key (`EMP000001`, `PROJ000001`, ...).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Short backend name used in logs and the status endpoint.
    fn backend(&self) -> &'static str;

    async fn find(&self, collection: &str, query: &FilterData) -> Result<Vec<Value>, DatabaseError>;

    async fn count(&self, collection: &str, where_clause: &Value) -> Result<u64, DatabaseError>;

    async fn find_one(&self, collection: &str, key: &str) -> Result<Option<Value>, DatabaseError>;

    /// Fails with `Duplicate` when the key is taken.
    async fn insert(&self, collection: &str, key: &str, doc: Value) -> Result<Value, DatabaseError>;

    /// Writes `doc` only while the stored `audit.version` is still
    /// `expected_version`. Fails with `NotFound` when the key is absent and
    /// with `Stale` when another writer got there first.
    async fn replace(
        &self,
        collection: &str,
        key: &str,
        expected_version: i64,
        doc: Value,
    ) -> Result<Value, DatabaseError>;

    async fn delete(&self, collection: &str, key: &str) -> Result<Option<Value>, DatabaseError>;

    /// Keys in `collection` starting with `prefix`.
    async fn keys(&self, collection: &str, prefix: &str) -> Result<Vec<String>, DatabaseError>;

    async fn health(&self) -> StoreHealth;

    async fn close(&self);
}
