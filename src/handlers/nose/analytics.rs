// handlers/nose/analytics.rs - GET /api/v1/nose/analytics/* handlers

use axum::extract::{Query, State};
use axum::Extension;
use chrono::Utc;
use serde_json::{json, Value};

use super::PROJECTS;
use crate::analytics::nose;
use crate::error::ApiError;
use crate::handlers::utils::fetch_all;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::query::{non_empty, QueryParams};
use crate::AppState;

async fn projects(state: &AppState) -> Result<Vec<Value>, ApiError> {
    fetch_all(state.store.as_ref(), PROJECTS, json!({}), json!({"createdAt": -1})).await
}

/// GET /api/v1/nose/analytics/dashboard
///
/// Scoped to projects the caller leads or belongs to.
pub async fn dashboard(State(state): State<AppState>, Extension(user): Extension<AuthUser>) -> ApiResult<Value> {
    let all = projects(&state).await?;
    let data = nose::dashboard(&all, &user.id, Utc::now());
    tracing::info!(user_id = %user.id, "NOSE dashboard generated");
    Ok(ApiResponse::success("Dashboard data retrieved successfully", data))
}

/// GET /api/v1/nose/analytics/projects/overview
pub async fn projects_overview(State(state): State<AppState>, Query(params): Query<QueryParams>) -> ApiResult<Value> {
    let all = projects(&state).await?;
    let time_range = non_empty(&params, "timeRange").unwrap_or("6months");
    Ok(ApiResponse::success(
        "Projects overview retrieved successfully",
        nose::projects_overview(&all, time_range, Utc::now()),
    ))
}

/// GET /api/v1/nose/analytics/publications/metrics
pub async fn publication_metrics(State(state): State<AppState>) -> ApiResult<Value> {
    let all = projects(&state).await?;
    Ok(ApiResponse::success("Publication metrics retrieved successfully", nose::publication_metrics(&all)))
}

/// GET /api/v1/nose/analytics/funding/summary
pub async fn funding_summary(State(state): State<AppState>) -> ApiResult<Value> {
    let all = projects(&state).await?;
    Ok(ApiResponse::success("Funding summary retrieved successfully", nose::funding_summary(&all)))
}

/// GET /api/v1/nose/analytics/collaboration/network
pub async fn collaboration_network(State(state): State<AppState>) -> ApiResult<Value> {
    let all = projects(&state).await?;
    Ok(ApiResponse::success(
        "Collaboration network retrieved successfully",
        nose::collaboration_network(&all),
    ))
}
