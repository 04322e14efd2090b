// handlers/hrms/analytics.rs - GET /api/v1/hrms/analytics/* handlers

use axum::extract::{Query, State};
use axum::Extension;
use chrono::Utc;
use serde_json::{json, Value};

use super::EMPLOYEES;
use crate::analytics::hrms;
use crate::error::ApiError;
use crate::handlers::utils::fetch_all;
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::query::{non_empty, QueryParams};
use crate::AppState;

async fn employees(state: &AppState) -> Result<Vec<Value>, ApiError> {
    fetch_all(state.store.as_ref(), EMPLOYEES, json!({}), json!({"createdAt": -1})).await
}

fn time_range<'a>(params: &'a QueryParams, default: &'a str) -> &'a str {
    non_empty(params, "timeRange").unwrap_or(default)
}

/// GET /api/v1/hrms/analytics/dashboard
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Value> {
    let all = employees(&state).await?;
    let data = hrms::dashboard(&all, time_range(&params, "6months"), Utc::now());
    tracing::info!(user_id = %user.id, employees = all.len(), "HRMS dashboard generated");
    Ok(ApiResponse::success("Dashboard data retrieved successfully", data))
}

/// GET /api/v1/hrms/analytics/headcount
pub async fn headcount(State(state): State<AppState>, Query(params): Query<QueryParams>) -> ApiResult<Value> {
    let all = employees(&state).await?;
    let data = hrms::headcount(&all, time_range(&params, "1year"), Utc::now());
    Ok(ApiResponse::success("Headcount report retrieved successfully", data))
}

/// GET /api/v1/hrms/analytics/turnover
pub async fn turnover(State(state): State<AppState>, Query(params): Query<QueryParams>) -> ApiResult<Value> {
    let all = employees(&state).await?;
    let data = hrms::turnover(&all, time_range(&params, "1year"), Utc::now());
    Ok(ApiResponse::success("Turnover analytics retrieved successfully", data))
}

/// GET /api/v1/hrms/analytics/departments
pub async fn departments(State(state): State<AppState>) -> ApiResult<Value> {
    let all = employees(&state).await?;
    Ok(ApiResponse::success(
        "Department analytics retrieved successfully",
        hrms::departments(&all, Utc::now()),
    ))
}

/// GET /api/v1/hrms/analytics/performance
pub async fn performance(State(state): State<AppState>) -> ApiResult<Value> {
    let all = employees(&state).await?;
    Ok(ApiResponse::success("Performance metrics retrieved successfully", hrms::performance(&all)))
}
