use serde_json::Value;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::matcher;
use super::types::{FilterData, FilterNode, FilterOrderInfo, SqlResult};

/// Table every collection is stored in.
pub const DOCUMENTS_TABLE: &str = "documents";

/// A validated find request against one collection. Renders to SQL for the
/// Postgres store and evaluates directly for the in-memory store.
#[derive(Debug, Clone)]
pub struct Filter {
    collection: String,
    where_node: FilterNode,
    order_data: Vec<FilterOrderInfo>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl Filter {
    pub fn new(collection: impl Into<String>) -> Result<Self, FilterError> {
        let collection = collection.into();
        Self::validate_collection_name(&collection)?;
        Ok(Self {
            collection,
            where_node: FilterNode::match_all(),
            order_data: vec![],
            limit: None,
            offset: None,
        })
    }

    /// Build a filter from a `FilterData` in one step.
    pub fn from_data(collection: &str, data: &FilterData) -> Result<Self, FilterError> {
        let mut filter = Self::new(collection)?;
        filter.assign(data)?;
        Ok(filter)
    }

    pub fn assign(&mut self, data: &FilterData) -> Result<&mut Self, FilterError> {
        if let Some(where_clause) = &data.where_clause {
            self.where_clause(where_clause)?;
        }
        if let Some(order) = &data.order {
            self.order(order)?;
        }
        if data.limit.is_some() || data.offset.is_some() {
            self.limit(data.limit, data.offset)?;
        }
        Ok(self)
    }

    pub fn where_clause(&mut self, conditions: &Value) -> Result<&mut Self, FilterError> {
        self.where_node = FilterWhere::parse(conditions)?;
        Ok(self)
    }

    pub fn order(&mut self, order_spec: &Value) -> Result<&mut Self, FilterError> {
        self.order_data = FilterOrder::validate_and_parse(order_spec)?;
        Ok(self)
    }

    pub fn limit(&mut self, limit: Option<i64>, offset: Option<i64>) -> Result<&mut Self, FilterError> {
        if let Some(l) = limit {
            if l < 0 {
                return Err(FilterError::InvalidLimit("Limit must be non-negative".to_string()));
            }
        }
        if let Some(off) = offset {
            if off < 0 {
                return Err(FilterError::InvalidOffset("Offset must be non-negative".to_string()));
            }
        }

        // Apply max limit from config
        let max_limit = crate::config::CONFIG.filter.max_limit.unwrap_or(i64::MAX);
        self.limit = limit.map(|l| {
            if l > max_limit {
                if crate::config::CONFIG.filter.debug_logging {
                    tracing::warn!("Limit {} exceeds max {}, capping to max", l, max_limit);
                }
                max_limit
            } else {
                l
            }
        });
        self.offset = offset;
        Ok(self)
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn matches(&self, doc: &Value) -> bool {
        matcher::matches(&self.where_node, doc)
    }

    /// Filter, sort and window `docs` the way `to_sql` would.
    pub fn apply(&self, docs: impl IntoIterator<Item = Value>) -> Vec<Value> {
        let mut selected: Vec<Value> = docs.into_iter().filter(|d| self.matches(d)).collect();
        selected.sort_by(|a, b| FilterOrder::compare(a, b, &self.order_data));
        let skip = self.offset.unwrap_or(0) as usize;
        let take = self.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        selected.into_iter().skip(skip).take(take).collect()
    }

    pub fn to_sql(&self) -> SqlResult {
        let where_result = self.to_where_sql();
        let query = [
            "SELECT doc".to_string(),
            format!("FROM {}", DOCUMENTS_TABLE),
            format!("WHERE {}", where_result.query),
            FilterOrder::generate(&self.order_data),
            self.build_limit_clause(),
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        SqlResult { query, params: where_result.params }
    }

    /// `collection = $1 AND (...)`; the collection is always the first parameter.
    pub fn to_where_sql(&self) -> SqlResult {
        let (where_clause, mut params) = FilterWhere::generate(&self.where_node, 1);
        params.insert(0, Value::String(self.collection.clone()));
        SqlResult {
            query: format!("collection = $1 AND ({})", where_clause),
            params,
        }
    }

    pub fn to_count_sql(&self) -> SqlResult {
        let where_result = self.to_where_sql();
        SqlResult {
            query: format!("SELECT COUNT(*) as count FROM {} WHERE {}", DOCUMENTS_TABLE, where_result.query),
            params: where_result.params,
        }
    }

    fn validate_collection_name(name: &str) -> Result<(), FilterError> {
        let mut chars = name.chars();
        let valid = match chars.next() {
            Some(first) => (first.is_ascii_alphabetic() || first == '_') && chars.all(|c| c.is_ascii_alphanumeric() || c == '_'),
            None => false,
        };
        if !valid {
            return Err(FilterError::InvalidCollection(format!("Invalid collection name format: {}", name)));
        }
        Ok(())
    }

    fn build_limit_clause(&self) -> String {
        match (self.limit, self.offset) {
            (Some(l), Some(o)) => format!("LIMIT {} OFFSET {}", l, o),
            (Some(l), None) => format!("LIMIT {}", l),
            (None, Some(o)) => format!("OFFSET {}", o),
            (None, None) => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn renders_full_select() {
        let data = FilterData::new(json!({"status": "active"}))
            .order(json!({"createdAt": -1}))
            .limit(20)
            .offset(40);
        let sql = Filter::from_data("employees", &data).unwrap().to_sql();
        assert_eq!(
            sql.query,
            "SELECT doc FROM documents WHERE collection = $1 AND (jsonb_path_exists(doc, $2::jsonpath, $3::jsonb)) \
             ORDER BY doc #> '{createdAt}' DESC NULLS LAST, key ASC LIMIT 20 OFFSET 40"
        );
        assert_eq!(sql.params[0], json!("employees"));
        assert_eq!(sql.params.len(), 3);
    }

    #[test]
    fn count_has_no_window() {
        let data = FilterData::new(json!({})).limit(5);
        let sql = Filter::from_data("research_projects", &data).unwrap().to_count_sql();
        assert_eq!(sql.query, "SELECT COUNT(*) as count FROM documents WHERE collection = $1 AND (TRUE)");
    }

    #[test]
    fn rejects_bad_collection_and_window() {
        assert!(Filter::new("bad-name").is_err());
        assert!(Filter::new("").is_err());
        let mut f = Filter::new("employees").unwrap();
        assert!(f.limit(Some(-1), None).is_err());
        assert!(f.limit(None, Some(-3)).is_err());
    }

    #[test]
    fn applies_in_memory() {
        let docs = vec![
            json!({"key": "a", "n": 3, "status": "active"}),
            json!({"key": "b", "n": 1, "status": "active"}),
            json!({"key": "c", "n": 2, "status": "inactive"}),
            json!({"key": "d", "n": 5, "status": "active"}),
        ];
        let data = FilterData::new(json!({"status": "active"})).order(json!("n")).limit(2).offset(1);
        let out = Filter::from_data("employees", &data).unwrap().apply(docs);
        let keys: Vec<&str> = out.iter().filter_map(|d| d["key"].as_str()).collect();
        assert_eq!(keys, vec!["a", "d"]);
    }
}
