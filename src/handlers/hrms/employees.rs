// handlers/hrms/employees.rs - /api/v1/hrms/employees handlers

use axum::extract::{Path, Query, State};
use axum::Extension;
use chrono::Utc;
use serde_json::{json, Value};

use super::EMPLOYEES;
use crate::error::ApiError;
use crate::handlers::utils::{fetch_page, require_doc, update_doc};
use crate::middleware::{ApiResponse, ApiResult, AuthUser, JsonBody};
use crate::services::documents::{apply_update, set_default, set_path, stamp_created, stamp_updated, text_at, timestamp};
use crate::services::ids::EMPLOYEE_IDS;
use crate::services::query::{non_empty, FilterBuilder, PageRequest, QueryParams};
use crate::validation::hrms as validate;
use crate::AppState;

const NOT_FOUND: &str = "Employee not found";

/// Equality-or-name match for `employment.department`, which is stored
/// either as a plain name or as `{name, description}`.
pub fn department_condition(department: &str) -> Vec<Value> {
    vec![
        json!({"employment.department": department}),
        json!({"employment.department.name": department}),
    ]
}

fn list_filter(params: &QueryParams) -> Value {
    let mut builder = FilterBuilder::new()
        .eq("status", non_empty(params, "status"))
        .contains("employment.position.title", non_empty(params, "position"))
        .search(&["firstName", "lastName", "email", "employeeId"], non_empty(params, "search"));
    if let Some(department) = non_empty(params, "department") {
        builder = builder.any_of(department_condition(department));
    }
    builder.build()
}

async fn ensure_email_free(state: &AppState, email: &str, except: Option<&str>) -> Result<(), ApiError> {
    if email.is_empty() {
        return Ok(());
    }
    let mut where_clause = json!({"email": email.to_lowercase()});
    if let Some(id) = except {
        where_clause["employeeId"] = json!({"$ne": id});
    }
    if state.store.count(EMPLOYEES, &where_clause).await? > 0 {
        return Err(ApiError::conflict("Employee with this email already exists"));
    }
    Ok(())
}

/// GET /api/v1/hrms/employees
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Vec<Value>> {
    validate::employee_list_query(&params)?;
    let page = PageRequest::from_params(&params)?;
    let filter = list_filter(&params);
    let (employees, total) = fetch_page(state.store.as_ref(), EMPLOYEES, filter, &page).await?;

    tracing::info!(user_id = %user.id, count = employees.len(), total, "Employees retrieved");
    Ok(ApiResponse::paginated("Employees retrieved successfully", employees, page.pagination(total)))
}

/// GET /api/v1/hrms/employees/:employeeId
pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(employee_id): Path<String>,
) -> ApiResult<Value> {
    let employee = require_doc(state.store.as_ref(), EMPLOYEES, &employee_id, NOT_FOUND).await?;
    tracing::info!(employee_id = %employee_id, user_id = %user.id, "Employee retrieved");
    Ok(ApiResponse::success("Employee retrieved successfully", employee))
}

/// POST /api/v1/hrms/employees
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(mut body): JsonBody,
) -> ApiResult<Value> {
    validate::create_employee(&body)?;

    let email = text_at(&body, "email").to_lowercase();
    ensure_email_free(&state, &email, None).await?;
    set_path(&mut body, "email", json!(email));
    set_default(&mut body, "status", json!("active"));
    set_default(&mut body, "compensation.salary.currency", json!("USD"));
    stamp_created(&mut body, &user.id, Utc::now());

    let employee = EMPLOYEE_IDS
        .insert_next(state.store.as_ref(), EMPLOYEES, "employeeId", body)
        .await?;

    tracing::info!(
        employee_id = text_at(&employee, "employeeId"),
        user_id = %user.id,
        name = %format!("{} {}", text_at(&employee, "firstName"), text_at(&employee, "lastName")),
        "Employee created"
    );
    Ok(ApiResponse::created("Employee created successfully", employee))
}

/// PUT /api/v1/hrms/employees/:employeeId
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(employee_id): Path<String>,
    JsonBody(body): JsonBody,
) -> ApiResult<Value> {
    validate::update_employee(&employee_id, &body)?;
    require_doc(state.store.as_ref(), EMPLOYEES, &employee_id, NOT_FOUND).await?;

    let Value::Object(mut updates) = body else {
        return Err(ApiError::bad_request("Request body must be an object"));
    };
    if let Some(email) = updates.get("email").and_then(Value::as_str).map(str::to_lowercase) {
        ensure_email_free(&state, &email, Some(&employee_id)).await?;
        updates.insert("email".into(), json!(email));
    }

    let (employee, updated_fields) = update_doc(state.store.as_ref(), EMPLOYEES, &employee_id, NOT_FOUND, |employee| {
        let updated_fields = apply_update(employee, &updates, &["employeeId"]);
        stamp_updated(employee, &user.id, Utc::now());
        Ok(updated_fields)
    })
    .await?;

    tracing::info!(employee_id = %employee_id, user_id = %user.id, ?updated_fields, "Employee updated");
    Ok(ApiResponse::success("Employee updated successfully", employee))
}

/// DELETE /api/v1/hrms/employees/:employeeId
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(employee_id): Path<String>,
) -> ApiResult<()> {
    let removed = state
        .store
        .delete(EMPLOYEES, &employee_id)
        .await?
        .ok_or_else(|| ApiError::not_found(NOT_FOUND))?;

    tracing::info!(
        employee_id = %employee_id,
        user_id = %user.id,
        name = %format!("{} {}", text_at(&removed, "firstName"), text_at(&removed, "lastName")),
        "Employee deleted"
    );
    Ok(ApiResponse::message_only("Employee deleted successfully"))
}

/// PATCH /api/v1/hrms/employees/:employeeId/status
pub async fn update_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(employee_id): Path<String>,
    JsonBody(body): JsonBody,
) -> ApiResult<Value> {
    validate::update_employee_status(&employee_id, &body)?;

    let now = Utc::now();
    let status = text_at(&body, "status").to_string();
    update_doc(state.store.as_ref(), EMPLOYEES, &employee_id, NOT_FOUND, |employee| {
        set_path(employee, "status", json!(status));
        if status == "terminated" {
            set_path(employee, "employment.endDate", json!(timestamp(now)));
        }
        if let Some(reason) = body.get("reason").and_then(Value::as_str).filter(|r| !r.is_empty()) {
            set_path(employee, "employment.terminationReason", json!(reason));
        }
        stamp_updated(employee, &user.id, now);
        Ok(())
    })
    .await?;

    tracing::info!(employee_id = %employee_id, user_id = %user.id, new_status = %status, "Employee status updated");
    Ok(ApiResponse::success(
        "Employee status updated successfully",
        json!({"employeeId": employee_id, "status": status}),
    ))
}
