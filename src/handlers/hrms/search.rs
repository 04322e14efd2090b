// handlers/hrms/search.rs - GET /api/v1/hrms/search/employees and /export/employees

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use chrono::Utc;
use serde_json::{json, Value};

use super::employees::department_condition;
use super::EMPLOYEES;
use crate::error::ApiError;
use crate::export::{self, csv, Download, EMPLOYEE_COLUMNS};
use crate::handlers::utils::{export_format, fetch_all, ranked_search, search_text};
use crate::middleware::{ApiResponse, ApiResult, AuthUser};
use crate::services::documents::timestamp;
use crate::services::query::{bracket_filters, contains_ci, non_empty, QueryParams};
use crate::validation::hrms as validate;
use crate::AppState;

const SEARCH_FIELDS: &[&str] = &["firstName", "lastName", "email", "employeeId", "employment.position.title"];

/// GET /api/v1/hrms/search/employees
///
/// Ranked term search; `department`, `status` and `position` (or the
/// matching `filters[...]` keys) narrow the candidates.
pub async fn search(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Vec<Value>> {
    let q = search_text(&params)?;

    let mut narrowing = bracket_filters(&params);
    if let Some(status) = non_empty(&params, "status") {
        narrowing.insert("status".into(), json!(status));
    }
    if let Some(position) = non_empty(&params, "position") {
        narrowing.insert("employment.position.title".into(), contains_ci(position));
    }
    if let Some(department) = non_empty(&params, "department") {
        narrowing.insert("$or".into(), Value::Array(department_condition(department)));
    }

    let employees = ranked_search(state.store.as_ref(), EMPLOYEES, q, SEARCH_FIELDS, narrowing).await?;

    tracing::info!(user_id = %user.id, query = %q, count = employees.len(), "Employee search");
    let count = employees.len();
    Ok(ApiResponse::success("Search completed successfully", employees).with("count", count))
}

/// GET /api/v1/hrms/export/employees?format=json|csv
pub async fn export(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<QueryParams>,
) -> Result<Response, ApiError> {
    validate::export_query(&params)?;
    let format = export_format(&params);
    let now = Utc::now();

    let filter = Value::Object(bracket_filters(&params));
    let employees = fetch_all(state.store.as_ref(), EMPLOYEES, filter, json!({"createdAt": -1})).await?;

    tracing::info!(user_id = %user.id, format = %format, count = employees.len(), "Employees exported");

    if format == "csv" {
        let rows: Vec<Vec<String>> = employees.iter().map(export::employee_row).collect();
        let body = csv::plain(EMPLOYEE_COLUMNS, &rows);
        return Ok(Download::csv(export::filename("employees", "csv", now), body).into_response());
    }

    let count = employees.len();
    Ok(ApiResponse::success("Employees exported successfully", employees)
        .with("exportDate", timestamp(now))
        .with("count", count)
        .into_response())
}
