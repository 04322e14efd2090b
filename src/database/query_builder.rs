use std::time::Instant;

use serde_json::Value;
use sqlx::{self, postgres::PgArguments, PgPool, Row};

use super::DatabaseError;
use crate::config::CONFIG;
use crate::filter::types::SqlResult;
use crate::filter::{Filter, FilterData};

/// Runs a `Filter` against the documents table.
pub struct QueryBuilder {
    filter: Filter,
}

impl QueryBuilder {
    pub fn new(collection: &str) -> Result<Self, DatabaseError> {
        Ok(Self { filter: Filter::new(collection)? })
    }

    pub fn filter(mut self, filter_data: &FilterData) -> Result<Self, DatabaseError> {
        self.filter.assign(filter_data)?;
        Ok(self)
    }

    pub fn where_clause(mut self, conditions: &Value) -> Result<Self, DatabaseError> {
        self.filter.where_clause(conditions)?;
        Ok(self)
    }

    pub async fn select_all(self, pool: &PgPool) -> Result<Vec<Value>, DatabaseError> {
        let sql_result = self.filter.to_sql();
        let started = Instant::now();
        let mut q = sqlx::query(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param_query(q, p);
        }
        let rows = q.fetch_all(pool).await?;
        warn_if_slow(&sql_result, started);

        rows.into_iter()
            .map(|row| row.try_get::<Value, _>("doc").map_err(DatabaseError::from))
            .collect()
    }

    pub async fn count(self, pool: &PgPool) -> Result<u64, DatabaseError> {
        let sql_result = self.filter.to_count_sql();
        let started = Instant::now();
        let mut q = sqlx::query(&sql_result.query);
        for p in sql_result.params.iter() {
            q = bind_param_query(q, p);
        }
        let row = q.fetch_one(pool).await?;
        warn_if_slow(&sql_result, started);
        let count: i64 = row.try_get("count")?;
        Ok(count.max(0) as u64)
    }
}

fn warn_if_slow(sql_result: &SqlResult, started: Instant) {
    let db = &CONFIG.database;
    if !db.enable_slow_query_warning {
        return;
    }
    let elapsed = started.elapsed().as_millis() as u64;
    if elapsed > db.slow_query_threshold_ms {
        tracing::warn!(elapsed_ms = elapsed, "Slow query: {}", sql_result.query);
    }
}

/// Binds a filter parameter. Strings carry jsonpath text, objects carry
/// jsonpath variables and documents as JSONB.
pub(crate) fn bind_param_query<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    v: &'q Value,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    match v {
        Value::Null => {
            let none: Option<String> = None;
            q.bind(none)
        }
        Value::Bool(b) => q.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                q.bind(i)
            } else if let Some(f) = n.as_f64() {
                q.bind(f)
            } else {
                q.bind(n.to_string())
            }
        }
        Value::String(s) => q.bind(s),
        Value::Array(_) | Value::Object(_) => q.bind(v.clone()), // JSONB
    }
}
