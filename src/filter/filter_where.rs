use regex::Regex;
use serde_json::{json, Map, Value};

use super::error::FilterError;
use super::types::{FieldPath, FilterNode, FilterOp, FilterWhereInfo};

/// JSONB column holding the document body.
pub const DOC_COLUMN: &str = "doc";

/// Parses Mongo-style filter documents and renders them as Postgres
/// `jsonb_path_exists` predicates.
pub struct FilterWhere {
    param_values: Vec<Value>,
    param_index: usize,
}

impl FilterWhere {
    pub fn new(starting_param_index: usize) -> Self {
        Self {
            param_values: vec![],
            param_index: starting_param_index,
        }
    }

    pub fn parse(where_data: &Value) -> Result<FilterNode, FilterError> {
        Self::parse_at(where_data, 0)
    }

    /// Render `node` as SQL. Placeholders are numbered after `starting_param_index`.
    pub fn generate(node: &FilterNode, starting_param_index: usize) -> (String, Vec<Value>) {
        let mut filter_where = Self::new(starting_param_index);
        let sql = filter_where.build(node);
        (sql, filter_where.param_values)
    }

    fn parse_at(where_data: &Value, depth: u32) -> Result<FilterNode, FilterError> {
        let max_depth = crate::config::CONFIG.filter.max_nested_depth;
        if depth > max_depth {
            return Err(FilterError::InvalidWhereClause(format!(
                "Filter nesting exceeds maximum depth of {}",
                max_depth
            )));
        }

        match where_data {
            Value::Null => Ok(FilterNode::match_all()),
            Value::Object(obj) => {
                let mut nodes = Vec::new();
                for (key, value) in obj {
                    if key.starts_with('$') {
                        nodes.push(Self::parse_logical_operator(key, value, depth)?);
                    } else {
                        nodes.extend(Self::parse_field_condition(key, value)?);
                    }
                }
                Ok(Self::collapse(nodes))
            }
            _ => Err(FilterError::InvalidWhereClause("Filter must be a JSON object".to_string())),
        }
    }

    fn collapse(mut nodes: Vec<FilterNode>) -> FilterNode {
        if nodes.len() == 1 {
            nodes.remove(0)
        } else {
            FilterNode::And(nodes)
        }
    }

    fn parse_logical_operator(op: &str, value: &Value, depth: u32) -> Result<FilterNode, FilterError> {
        match op {
            "$and" | "$or" => {
                let arr = value
                    .as_array()
                    .ok_or_else(|| FilterError::InvalidOperatorData(format!("{} requires array", op)))?;
                let children = arr
                    .iter()
                    .map(|v| Self::parse_at(v, depth + 1))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(if op == "$and" { FilterNode::And(children) } else { FilterNode::Or(children) })
            }
            "$not" | "$nor" => {
                let inner = match value {
                    Value::Array(arr) => FilterNode::Or(
                        arr.iter()
                            .map(|v| Self::parse_at(v, depth + 1))
                            .collect::<Result<Vec<_>, _>>()?,
                    ),
                    other => Self::parse_at(other, depth + 1)?,
                };
                Ok(FilterNode::Not(Box::new(inner)))
            }
            _ => Err(FilterError::UnsupportedOperator(op.to_string())),
        }
    }

    fn parse_field_condition(field: &str, value: &Value) -> Result<Vec<FilterNode>, FilterError> {
        let path = FieldPath::parse(field).ok_or_else(|| FilterError::InvalidField(field.to_string()))?;

        let operators = match value {
            Value::Object(obj) if !obj.is_empty() && obj.keys().all(|k| k.starts_with('$')) => obj,
            // Implicit equality: { field: value }
            _ => {
                return Ok(vec![FilterNode::Condition(FilterWhereInfo {
                    path,
                    operator: FilterOp::Eq,
                    data: value.clone(),
                    options: None,
                    pattern: None,
                })])
            }
        };

        let mut nodes = Vec::new();
        for (op_key, op_val) in operators {
            match op_key.as_str() {
                "$options" => continue,
                "$not" => {
                    let inner = Self::parse_field_condition(field, op_val)?;
                    nodes.push(FilterNode::Not(Box::new(Self::collapse(inner))));
                }
                _ => {
                    let operator =
                        FilterOp::from_key(op_key).ok_or_else(|| FilterError::UnsupportedOperator(op_key.clone()))?;
                    nodes.push(FilterNode::Condition(Self::build_condition(
                        path.clone(),
                        operator,
                        op_val,
                        operators,
                    )?));
                }
            }
        }
        Ok(nodes)
    }

    fn build_condition(
        path: FieldPath,
        operator: FilterOp,
        data: &Value,
        siblings: &Map<String, Value>,
    ) -> Result<FilterWhereInfo, FilterError> {
        let mut options = None;
        let mut pattern = None;
        match operator {
            FilterOp::In | FilterOp::NIn if !data.is_array() => {
                return Err(FilterError::InvalidOperatorData(format!(
                    "{} on '{}' requires array",
                    if operator == FilterOp::In { "$in" } else { "$nin" },
                    path.dotted()
                )));
            }
            FilterOp::Regex => {
                let source = data
                    .as_str()
                    .ok_or_else(|| FilterError::InvalidOperatorData("$regex requires string pattern".to_string()))?;
                let flags = siblings.get("$options").and_then(Value::as_str).map(supported_flags).unwrap_or_default();
                pattern = Some(compile_regex(source, &flags)?);
                options = Some(flags);
            }
            _ => {}
        }

        Ok(FilterWhereInfo {
            path,
            operator,
            data: data.clone(),
            options,
            pattern,
        })
    }

    fn build(&mut self, node: &FilterNode) -> String {
        match node {
            FilterNode::And(children) if children.is_empty() => "TRUE".to_string(),
            FilterNode::Or(children) if children.is_empty() => "FALSE".to_string(),
            FilterNode::And(children) => self.join(children, " AND "),
            FilterNode::Or(children) => self.join(children, " OR "),
            FilterNode::Not(inner) => format!("NOT ({})", self.build(inner)),
            FilterNode::Condition(condition) => self.build_sql_condition(condition),
        }
    }

    fn join(&mut self, children: &[FilterNode], joiner: &str) -> String {
        let parts: Vec<String> = children.iter().map(|c| format!("({})", self.build(c))).collect();
        parts.join(joiner)
    }

    fn build_sql_condition(&mut self, condition: &FilterWhereInfo) -> String {
        let path = jsonpath(&condition.path);
        match condition.operator {
            FilterOp::Eq => self.equality(&condition.path, &path, &condition.data),
            FilterOp::Ne => format!("NOT ({})", self.equality(&condition.path, &path, &condition.data)),
            FilterOp::Gt | FilterOp::Gte | FilterOp::Lt | FilterOp::Lte => {
                let cmp = condition.operator.comparator().unwrap_or("==");
                self.path_exists_with(format!("{} ? (@ {} $v)", path, cmp), json!({ "v": condition.data }))
            }
            FilterOp::In => self.membership(&condition.path, &path, &condition.data),
            FilterOp::NIn => format!("NOT ({})", self.membership(&condition.path, &path, &condition.data)),
            FilterOp::Regex => {
                let pattern = condition.data.as_str().unwrap_or_default();
                let flags = condition.options.as_deref().unwrap_or_default();
                let expr = if flags.is_empty() {
                    format!("{} ? (@ like_regex {})", path, quote(pattern))
                } else {
                    format!("{} ? (@ like_regex {} flag {})", path, quote(pattern), quote(flags))
                };
                self.path_exists(expr)
            }
            FilterOp::Exists => {
                let exists = self.path_exists(path);
                if truthy(&condition.data) {
                    exists
                } else {
                    format!("NOT {}", exists)
                }
            }
        }
    }

    fn equality(&mut self, field: &FieldPath, path: &str, data: &Value) -> String {
        match data {
            // Null matches both a missing field and an explicit null
            Value::Null => {
                let missing = self.path_exists(path.to_string());
                let is_null = self.path_exists(format!("{} ? (@ == null)", path));
                format!("(NOT {} OR {})", missing, is_null)
            }
            Value::Array(_) | Value::Object(_) => {
                let p = self.param(Value::String(field.dotted()));
                let v = self.param(json!({ "v": data }));
                format!("({} #> string_to_array({}, '.')) = ({}::jsonb -> 'v')", DOC_COLUMN, p, v)
            }
            _ => self.path_exists_with(format!("{} ? (@ == $v)", path), json!({ "v": data })),
        }
    }

    fn membership(&mut self, field: &FieldPath, path: &str, data: &Value) -> String {
        let values = data.as_array().map(Vec::as_slice).unwrap_or_default();
        if values.is_empty() {
            return "FALSE".to_string();
        }
        let parts: Vec<String> = values.iter().map(|v| self.equality(field, path, v)).collect();
        format!("({})", parts.join(" OR "))
    }

    fn path_exists(&mut self, jsonpath: String) -> String {
        let p = self.param(Value::String(jsonpath));
        format!("jsonb_path_exists({}, {}::jsonpath)", DOC_COLUMN, p)
    }

    fn path_exists_with(&mut self, jsonpath: String, vars: Value) -> String {
        let p = self.param(Value::String(jsonpath));
        let v = self.param(vars);
        format!("jsonb_path_exists({}, {}::jsonpath, {}::jsonb)", DOC_COLUMN, p, v)
    }

    fn param(&mut self, value: Value) -> String {
        self.param_values.push(value);
        self.param_index += 1;
        format!("${}", self.param_index)
    }
}

/// Lax-mode jsonpath for a field: `$."a"."b"[0]`.
pub fn jsonpath(path: &FieldPath) -> String {
    let mut out = String::from("$");
    for segment in path.segments() {
        if !segment.is_empty() && segment.chars().all(|c| c.is_ascii_digit()) {
            out.push_str(&format!("[{}]", segment));
        } else {
            out.push('.');
            out.push_str(&quote(segment));
        }
    }
    out
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}

/// Keep the regex flags both evaluators understand.
fn supported_flags(options: &str) -> String {
    options.chars().filter(|c| matches!(c, 'i' | 'm' | 's' | 'x')).collect()
}

pub(crate) fn compile_regex(pattern: &str, flags: &str) -> Result<Regex, FilterError> {
    let source = if flags.is_empty() { pattern.to_string() } else { format!("(?{}){}", flags, pattern) };
    Ok(Regex::new(&source)?)
}

pub(crate) fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
