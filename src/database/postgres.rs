use async_trait::async_trait;
use serde_json::Value;
use sqlx::{PgPool, Row};

use super::manager::DatabaseManager;
use super::query_builder::QueryBuilder;
use super::{DatabaseError, DocumentStore, StoreHealth};
use crate::filter::filter::DOCUMENTS_TABLE;
use crate::filter::FilterData;

/// `DocumentStore` over a single Postgres table of JSONB documents.
#[derive(Clone)]
pub struct PgDocumentStore {
    pool: PgPool,
    database_name: String,
}

impl PgDocumentStore {
    pub fn new(pool: PgPool, database_name: impl Into<String>) -> Self {
        Self { pool, database_name: database_name.into() }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DocumentStore for PgDocumentStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn find(&self, collection: &str, query: &FilterData) -> Result<Vec<Value>, DatabaseError> {
        QueryBuilder::new(collection)?.filter(query)?.select_all(&self.pool).await
    }

    async fn count(&self, collection: &str, where_clause: &Value) -> Result<u64, DatabaseError> {
        QueryBuilder::new(collection)?.where_clause(where_clause)?.count(&self.pool).await
    }

    async fn find_one(&self, collection: &str, key: &str) -> Result<Option<Value>, DatabaseError> {
        let sql = format!("SELECT doc FROM {} WHERE collection = $1 AND key = $2", DOCUMENTS_TABLE);
        let row = sqlx::query(&sql)
            .bind(collection)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| r.try_get::<Value, _>("doc").map_err(DatabaseError::from))
            .transpose()
    }

    async fn insert(&self, collection: &str, key: &str, doc: Value) -> Result<Value, DatabaseError> {
        let sql = format!(
            "INSERT INTO {} (collection, key, doc) VALUES ($1, $2, $3) ON CONFLICT (collection, key) DO NOTHING",
            DOCUMENTS_TABLE
        );
        let result = sqlx::query(&sql)
            .bind(collection)
            .bind(key)
            .bind(&doc)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::Duplicate(format!("{} {} already exists", collection, key)));
        }
        Ok(doc)
    }

    async fn replace(
        &self,
        collection: &str,
        key: &str,
        expected_version: i64,
        doc: Value,
    ) -> Result<Value, DatabaseError> {
        let sql = format!(
            "UPDATE {} SET doc = $3, updated_at = now() \
             WHERE collection = $1 AND key = $2 AND COALESCE((doc #>> '{{audit,version}}')::bigint, 0) = $4",
            DOCUMENTS_TABLE
        );
        let result = sqlx::query(&sql)
            .bind(collection)
            .bind(key)
            .bind(&doc)
            .bind(expected_version)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            let exists = format!("SELECT 1 FROM {} WHERE collection = $1 AND key = $2", DOCUMENTS_TABLE);
            let row = sqlx::query(&exists)
                .bind(collection)
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
            return Err(match row {
                Some(_) => DatabaseError::Stale(format!(
                    "{} {} changed since version {}",
                    collection, key, expected_version
                )),
                None => DatabaseError::NotFound(format!("{} {} not found", collection, key)),
            });
        }
        Ok(doc)
    }

    async fn delete(&self, collection: &str, key: &str) -> Result<Option<Value>, DatabaseError> {
        let sql = format!("DELETE FROM {} WHERE collection = $1 AND key = $2 RETURNING doc", DOCUMENTS_TABLE);
        let row = sqlx::query(&sql)
            .bind(collection)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| r.try_get::<Value, _>("doc").map_err(DatabaseError::from))
            .transpose()
    }

    async fn keys(&self, collection: &str, prefix: &str) -> Result<Vec<String>, DatabaseError> {
        let sql = format!(
            "SELECT key FROM {} WHERE collection = $1 AND starts_with(key, $2) ORDER BY key",
            DOCUMENTS_TABLE
        );
        let rows = sqlx::query(&sql)
            .bind(collection)
            .bind(prefix)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|r| r.try_get::<String, _>("key").map_err(DatabaseError::from))
            .collect()
    }

    async fn health(&self) -> StoreHealth {
        match DatabaseManager::health_check(&self.pool).await {
            Ok(()) => StoreHealth::connected(&self.database_name),
            Err(e) => {
                tracing::warn!("Database health check failed: {}", e);
                StoreHealth::disconnected(&self.database_name)
            }
        }
    }

    async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Closed database pool: {}", self.database_name);
    }
}
