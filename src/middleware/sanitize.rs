use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::ApiError;

static SCRIPT_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<script\b.*?</script>").expect("valid regex"));
static JS_SCHEME: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)javascript:").expect("valid regex"));
static INLINE_HANDLER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)on\w+\s*=").expect("valid regex"));

/// Strip script blocks, `javascript:` schemes and inline handlers from every
/// string in the document, then trim.
pub fn sanitize(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(sanitize_str(&s)),
        Value::Array(items) => Value::Array(items.into_iter().map(sanitize).collect()),
        Value::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, sanitize(v))).collect()),
        other => other,
    }
}

pub fn sanitize_str(input: &str) -> String {
    let out = SCRIPT_TAG.replace_all(input, "");
    let out = JS_SCHEME.replace_all(&out, "");
    let out = INLINE_HANDLER.replace_all(&out, "");
    out.trim().to_string()
}

/// JSON request body, sanitized. Malformed JSON becomes a 400.
#[derive(Debug, Clone)]
pub struct JsonBody(pub Value);

#[async_trait]
impl<S> FromRequest<S> for JsonBody
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<Value>::from_request(req, state)
            .await
            .map_err(|rejection| ApiError::invalid_json(rejection.body_text()))?;
        Ok(JsonBody(sanitize(value)))
    }
}
