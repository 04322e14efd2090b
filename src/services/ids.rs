use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::database::{DatabaseError, DocumentStore};

/// Prefixed, zero-padded sequential keys. The next key is the highest
/// existing number plus one, so gaps left by deletions are never reused.
#[derive(Debug, Clone, Copy)]
pub struct IdSequence {
    pub prefix: &'static str,
    pub width: usize,
}

pub const EMPLOYEE_IDS: IdSequence = IdSequence::new("EMP", 6);
pub const PROJECT_IDS: IdSequence = IdSequence::new("PROJ", 6);
pub const MONITOR_IDS: IdSequence = IdSequence::new("DQM", 7);

/// Attempts made when a concurrent insert claims the same key first.
const INSERT_ATTEMPTS: usize = 5;

impl IdSequence {
    pub const fn new(prefix: &'static str, width: usize) -> Self {
        Self { prefix, width }
    }

    pub fn format(&self, number: u64) -> String {
        format!("{}{:0width$}", self.prefix, number, width = self.width)
    }

    pub fn parse(&self, id: &str) -> Option<u64> {
        let digits = id.strip_prefix(self.prefix)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }

    /// Exactly `prefix` followed by `width` digits.
    pub fn is_valid(&self, id: &str) -> bool {
        id.len() == self.prefix.len() + self.width && self.parse(id).is_some()
    }

    pub fn next_after<'a>(&self, existing: impl IntoIterator<Item = &'a str>) -> String {
        let max = existing.into_iter().filter_map(|k| self.parse(k)).max().unwrap_or(0);
        self.format(max + 1)
    }

    pub async fn next(&self, store: &dyn DocumentStore, collection: &str) -> Result<String, DatabaseError> {
        let keys = store.keys(collection, self.prefix).await?;
        Ok(self.next_after(keys.iter().map(String::as_str)))
    }

    /// Assigns the next key to `field` and inserts. Retries with a fresh key
    /// when another writer took it between allocation and insert.
    pub async fn insert_next(
        &self,
        store: &dyn DocumentStore,
        collection: &str,
        field: &str,
        mut doc: Value,
    ) -> Result<Value, DatabaseError> {
        let mut last_err = None;
        for _ in 0..INSERT_ATTEMPTS {
            let key = self.next(store, collection).await?;
            if let Value::Object(map) = &mut doc {
                map.insert(field.to_string(), Value::String(key.clone()));
            }
            match store.insert(collection, &key, doc.clone()).await {
                Ok(saved) => return Ok(saved),
                Err(DatabaseError::Duplicate(msg)) => {
                    tracing::debug!("Key {} taken, retrying", key);
                    last_err = Some(DatabaseError::Duplicate(msg));
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_err.unwrap_or_else(|| DatabaseError::QueryError("key allocation failed".to_string())))
    }
}

/// 24 hex digit identifier for documents and embedded sub-documents
/// (`_id`): creation seconds followed by random bits.
pub fn object_id() -> String {
    let random = uuid::Uuid::new_v4().simple().to_string();
    format!("{:08x}{}", Utc::now().timestamp() as u32, &random[..16])
}

pub fn is_object_id(id: &str) -> bool {
    id.len() == 24 && id.bytes().all(|b| b.is_ascii_hexdigit())
}

/// `ALT<millis><4 hex>` identifiers for quality alerts.
pub fn alert_id(now: DateTime<Utc>) -> String {
    let suffix = &uuid::Uuid::new_v4().simple().to_string()[..4];
    format!("ALT{}{}", now.timestamp_millis(), suffix.to_uppercase())
}

/// `assess_<millis>_<4 hex>` identifiers for quality assessments.
pub fn assessment_id(now: DateTime<Utc>) -> String {
    let suffix = &uuid::Uuid::new_v4().simple().to_string()[..4];
    format!("assess_{}_{}", now.timestamp_millis(), suffix)
}
