// handlers/webhunter/monitors.rs - /api/v1/webhunter/quality-monitors CRUD and search

use axum::extract::{Path, Query, State};
use axum::Extension;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use super::{load_monitor, update_monitor, MONITORS, MONITOR_NOT_FOUND};
use crate::error::ApiError;
use crate::handlers::utils::{fetch_page, ranked_search, search_text};
use crate::middleware::{ApiResponse, ApiResult, AuthUser, JsonBody};
use crate::services::documents::{apply_update, get_path_mut, set_default, set_path, stamp_created, stamp_updated, text_at};
use crate::services::ids::{object_id, MONITOR_IDS};
use crate::services::query::{bracket_filters, non_empty, FilterBuilder, PageRequest, QueryParams};
use crate::validation::webhunter as validate;
use crate::AppState;

const SEARCH_FIELDS: &[&str] = &["name", "description", "monitorId"];

fn list_filter(params: &QueryParams) -> Value {
    FilterBuilder::new()
        .eq("scope.target.type", non_empty(params, "targetType"))
        .eq("currentStatus.status", non_empty(params, "status"))
        .eq("currentStatus.grade", non_empty(params, "grade"))
        .eq("security.owner", non_empty(params, "owner"))
        .search(SEARCH_FIELDS, non_empty(params, "search"))
        .build()
}

/// Rules get ids, the monitor starts active with no alerts.
fn prepare_new(monitor: &mut Value, user: &AuthUser, now: DateTime<Utc>) {
    if let Some(Value::Array(rules)) = get_path_mut(monitor, "qualityRules") {
        for rule in rules.iter_mut() {
            let id = object_id();
            set_default(rule, "_id", json!(id));
            set_default(rule, "ruleId", json!(id));
            set_default(rule, "enabled", json!(true));
            set_default(rule, "weight", json!(1));
        }
    }
    set_path(monitor, "security.owner", json!(user.id));
    set_default(monitor, "schedule.enabled", json!(true));
    set_default(monitor, "currentStatus.status", json!("active"));
    set_default(monitor, "alerts.active", json!([]));
    set_default(monitor, "compliance.frameworks", json!([]));
    stamp_created(monitor, &user.id, now);
}

/// GET /api/v1/webhunter/quality-monitors
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Vec<Value>> {
    validate::monitor_list_query(&params)?;
    let page = PageRequest::from_params(&params)?;
    let (monitors, total) = fetch_page(state.store.as_ref(), MONITORS, list_filter(&params), &page).await?;

    tracing::info!(user_id = %user.id, count = monitors.len(), total, "Quality monitors retrieved");
    Ok(ApiResponse::paginated("Quality monitors retrieved successfully", monitors, page.pagination(total)))
}

/// GET /api/v1/webhunter/quality-monitors/search
pub async fn search(State(state): State<AppState>, Query(params): Query<QueryParams>) -> ApiResult<Vec<Value>> {
    let q = search_text(&params)?;
    let monitors = ranked_search(state.store.as_ref(), MONITORS, q, SEARCH_FIELDS, bracket_filters(&params)).await?;
    let count = monitors.len();
    Ok(ApiResponse::success("Search completed successfully", monitors).with("count", count))
}

/// GET /api/v1/webhunter/quality-monitors/:monitorId
pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(monitor_id): Path<String>,
) -> ApiResult<Value> {
    let monitor = load_monitor(&state, &monitor_id).await?;
    tracing::info!(monitor_id = %monitor_id, user_id = %user.id, "Quality monitor retrieved");
    Ok(ApiResponse::success("Quality monitor retrieved successfully", monitor))
}

/// POST /api/v1/webhunter/quality-monitors (admin)
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(mut body): JsonBody,
) -> ApiResult<Value> {
    validate::create_monitor(&body)?;
    prepare_new(&mut body, &user, Utc::now());

    let monitor = MONITOR_IDS
        .insert_next(state.store.as_ref(), MONITORS, "monitorId", body)
        .await?;

    tracing::info!(
        monitor_id = text_at(&monitor, "monitorId"),
        user_id = %user.id,
        name = text_at(&monitor, "name"),
        "Quality monitor created"
    );
    Ok(ApiResponse::created("Quality monitor created successfully", monitor))
}

/// PUT /api/v1/webhunter/quality-monitors/:monitorId (admin)
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(monitor_id): Path<String>,
    JsonBody(body): JsonBody,
) -> ApiResult<Value> {
    validate::update_monitor(&body)?;

    let Value::Object(updates) = body else {
        return Err(ApiError::bad_request("Request body must be an object"));
    };
    let (monitor, updated_fields) = update_monitor(&state, &monitor_id, |monitor| {
        let owner = text_at(monitor, "security.owner").to_string();
        let updated_fields = apply_update(monitor, &updates, &["monitorId", "currentStatus", "alerts"]);
        set_path(monitor, "security.owner", json!(owner));
        stamp_updated(monitor, &user.id, Utc::now());
        Ok(updated_fields)
    })
    .await?;

    tracing::info!(monitor_id = %monitor_id, user_id = %user.id, ?updated_fields, "Quality monitor updated");
    Ok(ApiResponse::success("Quality monitor updated successfully", monitor))
}

/// DELETE /api/v1/webhunter/quality-monitors/:monitorId (admin)
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(monitor_id): Path<String>,
) -> ApiResult<()> {
    validate::monitor_path(&monitor_id, None)?;
    let removed = state
        .store
        .delete(MONITORS, &monitor_id)
        .await?
        .ok_or_else(|| ApiError::not_found(MONITOR_NOT_FOUND))?;

    tracing::info!(monitor_id = %monitor_id, user_id = %user.id, name = text_at(&removed, "name"), "Quality monitor deleted");
    Ok(ApiResponse::message_only("Quality monitor deleted successfully"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::FrameworkGrants;
    use crate::filter::Filter;

    #[test]
    fn new_monitor_defaults() {
        let user = AuthUser {
            id: "64b000000000000000000009".into(),
            email: "ops@example.com".into(),
            name: "Ops".into(),
            frameworks: FrameworkGrants::default(),
        };
        let mut monitor = json!({"name": "Orders", "qualityRules": [{"name": "Ids", "dimension": "completeness"}]});
        prepare_new(&mut monitor, &user, Utc::now());
        assert_eq!(monitor["security"]["owner"], "64b000000000000000000009");
        assert_eq!(monitor["currentStatus"]["status"], "active");
        assert_eq!(monitor["alerts"]["active"], json!([]));
        assert_eq!(monitor["qualityRules"][0]["enabled"], true);
        assert_eq!(monitor["qualityRules"][0]["_id"], monitor["qualityRules"][0]["ruleId"]);
    }

    #[test]
    fn list_filter_paths() {
        let mut params = QueryParams::new();
        params.insert("targetType".into(), "provider".into());
        params.insert("grade".into(), "A".into());
        let mut filter = Filter::new(MONITORS).unwrap();
        filter.where_clause(&list_filter(&params)).unwrap();
        assert!(filter.matches(&json!({"scope": {"target": {"type": "provider"}}, "currentStatus": {"grade": "A"}})));
        assert!(!filter.matches(&json!({"scope": {"target": {"type": "provider"}}, "currentStatus": {"grade": "B"}})));
    }
}
