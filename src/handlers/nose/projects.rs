// handlers/nose/projects.rs - /api/v1/nose/projects handlers plus project search and export

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};

use super::{load_project, update_project, PROJECTS, PROJECT_NOT_FOUND};
use crate::analytics::nose::project_health;
use crate::error::ApiError;
use crate::export::{self, csv, Download, PROJECT_COLUMNS};
use crate::handlers::utils::{export_format, fetch_all, fetch_page, ranked_search, search_text};
use crate::middleware::{ApiResponse, ApiResult, AuthUser, JsonBody};
use crate::services::documents::{
    apply_update, get_path, get_path_mut, set_default, set_path, stamp_created, stamp_updated, text_at, timestamp,
};
use crate::services::ids::{object_id, PROJECT_IDS};
use crate::services::query::{bracket_filters, non_empty, FilterBuilder, PageRequest, QueryParams};
use crate::validation::nose as validate;
use crate::AppState;

const SEARCH_FIELDS: &[&str] = &["title", "description.abstract", "classification.keywords"];

fn list_filter(params: &QueryParams) -> Value {
    FilterBuilder::new()
        .eq("status", non_empty(params, "status"))
        .eq("classification.researchType", non_empty(params, "researchType"))
        .contains("classification.fieldOfStudy.primary", non_empty(params, "fieldOfStudy"))
        .eq("health.overallHealth", non_empty(params, "healthStatus"))
        .eq("team.principalInvestigator.userId", non_empty(params, "piUserId"))
        .search(SEARCH_FIELDS, non_empty(params, "search"))
        .build()
}

/// Sort keys clients send that live under `timeline`.
fn sort_path(field: &str) -> String {
    match field {
        "startDate" | "expectedEndDate" => format!("timeline.{}", field),
        other => other.to_string(),
    }
}

/// Defaults for a new project: PI is the caller, health starts green,
/// embedded arrays exist and sub-documents get `_id`s.
fn prepare_new(project: &mut Value, user: &AuthUser, now: DateTime<Utc>) {
    set_path(project, "team.principalInvestigator.userId", json!(user.id));
    set_default(project, "team.principalInvestigator.name", json!(user.name));
    set_default(project, "team.principalInvestigator.email", json!(user.email));
    set_default(project, "team.principalInvestigator.role", json!("Principal Investigator"));
    for group in ["coInvestigators", "students", "externalCollaborators"] {
        set_default(project, &format!("team.{}", group), json!([]));
    }
    set_default(project, "status", json!("planning"));
    set_default(project, "funding.totalBudget.currency", json!("USD"));
    set_default(project, "funding.sources", json!([]));
    set_default(project, "funding.expenses", json!([]));
    set_default(project, "timeline.milestones", json!([]));
    set_default(project, "publications", json!([]));
    for key in ["overallHealth", "budgetHealth", "timelineHealth", "teamHealth"] {
        set_default(project, &format!("health.{}", key), json!("green"));
    }
    set_path(project, "health.lastHealthCheck", json!(timestamp(now)));
    set_path(project, "analytics.views", json!(0));

    for (path, status) in [("timeline.milestones", Some("not_started")), ("funding.sources", Some("applied")), ("funding.expenses", None)] {
        if let Some(Value::Array(items)) = get_path_mut(project, path) {
            for item in items.iter_mut() {
                set_default(item, "_id", json!(object_id()));
                if let Some(status) = status {
                    set_default(item, "status", json!(status));
                }
            }
        }
    }
}

/// GET /api/v1/nose/projects
pub async fn list(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Vec<Value>> {
    validate::project_list_query(&params)?;
    let mut page = PageRequest::from_params(&params)?;
    page.sort_by = sort_path(&page.sort_by);

    let (projects, total) = fetch_page(state.store.as_ref(), PROJECTS, list_filter(&params), &page).await?;

    tracing::info!(user_id = %user.id, count = projects.len(), total, "Research projects retrieved");
    Ok(ApiResponse::paginated("Research projects retrieved successfully", projects, page.pagination(total)))
}

/// GET /api/v1/nose/projects/:projectId
///
/// Counts the view.
pub async fn get(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(project_id): Path<String>,
) -> ApiResult<Value> {
    validate::validate_project_id(&project_id)?;
    let (project, views) = update_project(&state, &project_id, |project| {
        let views = get_path(project, "analytics.views").and_then(Value::as_u64).unwrap_or(0) + 1;
        set_path(project, "analytics.views", json!(views));
        set_path(project, "analytics.lastAnalyticsUpdate", json!(timestamp(Utc::now())));
        Ok(views)
    })
    .await?;

    tracing::info!(project_id = %project_id, user_id = %user.id, views, "Research project retrieved");
    Ok(ApiResponse::success("Research project retrieved successfully", project))
}

/// POST /api/v1/nose/projects
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    JsonBody(mut body): JsonBody,
) -> ApiResult<Value> {
    validate::create_project(&body)?;
    let now = Utc::now();
    prepare_new(&mut body, &user, now);
    stamp_created(&mut body, &user.id, now);

    let project = PROJECT_IDS
        .insert_next(state.store.as_ref(), PROJECTS, "projectId", body)
        .await?;

    tracing::info!(
        project_id = text_at(&project, "projectId"),
        user_id = %user.id,
        title = text_at(&project, "title"),
        "Research project created"
    );
    Ok(ApiResponse::created("Research project created successfully", project))
}

/// PUT /api/v1/nose/projects/:projectId
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(project_id): Path<String>,
    JsonBody(body): JsonBody,
) -> ApiResult<Value> {
    validate::update_project(&project_id, &body)?;

    let Value::Object(updates) = body else {
        return Err(ApiError::bad_request("Request body must be an object"));
    };
    let (project, updated_fields) = update_project(&state, &project_id, |project| {
        let updated_fields = apply_update(project, &updates, &["projectId", "publications", "analytics"]);
        if let Some(Value::Array(expenses)) = get_path_mut(project, "funding.expenses") {
            for expense in expenses.iter_mut() {
                set_default(expense, "_id", json!(object_id()));
            }
        }
        stamp_updated(project, &user.id, Utc::now());
        Ok(updated_fields)
    })
    .await?;

    tracing::info!(project_id = %project_id, user_id = %user.id, ?updated_fields, "Research project updated");
    Ok(ApiResponse::success("Research project updated successfully", project))
}

/// DELETE /api/v1/nose/projects/:projectId
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(project_id): Path<String>,
) -> ApiResult<()> {
    validate::validate_project_id(&project_id)?;
    let removed = state
        .store
        .delete(PROJECTS, &project_id)
        .await?
        .ok_or_else(|| ApiError::not_found(PROJECT_NOT_FOUND))?;

    tracing::info!(project_id = %project_id, user_id = %user.id, title = text_at(&removed, "title"), "Research project deleted");
    Ok(ApiResponse::message_only("Research project deleted successfully"))
}

/// PATCH /api/v1/nose/projects/:projectId/status
///
/// Records every change in `statusHistory`; completing a project stamps
/// `timeline.actualEndDate`.
pub async fn update_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(project_id): Path<String>,
    JsonBody(body): JsonBody,
) -> ApiResult<Value> {
    validate::update_project_status(&project_id, &body)?;

    let now = Utc::now();
    let status = text_at(&body, "status").to_string();
    let (_, previous) = update_project(&state, &project_id, |project| {
        let previous = text_at(project, "status").to_string();
        let entry = json!({
            "status": status,
            "previousStatus": previous,
            "reason": body.get("reason").cloned().unwrap_or(Value::Null),
            "changedBy": user.id,
            "changedAt": timestamp(now),
        });

        set_path(project, "status", json!(status));
        if status == "completed" {
            set_path(project, "timeline.actualEndDate", json!(timestamp(now)));
        }
        match get_path_mut(project, "statusHistory") {
            Some(Value::Array(history)) => history.push(entry),
            _ => set_path(project, "statusHistory", json!([entry])),
        }
        stamp_updated(project, &user.id, now);
        Ok(previous)
    })
    .await?;

    tracing::info!(project_id = %project_id, user_id = %user.id, from = %previous, to = %status, "Project status updated");
    Ok(ApiResponse::success(
        "Project status updated successfully",
        json!({"projectId": project_id, "status": status}),
    ))
}

/// GET /api/v1/nose/projects/:projectId/health
pub async fn health(State(state): State<AppState>, Path(project_id): Path<String>) -> ApiResult<Value> {
    validate::validate_project_id(&project_id)?;
    let project = load_project(&state, &project_id).await?;
    Ok(ApiResponse::success("Project health retrieved successfully", project_health(&project, Utc::now())))
}

/// GET /api/v1/nose/search/projects
pub async fn search(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Vec<Value>> {
    let q = search_text(&params)?;
    let projects = ranked_search(state.store.as_ref(), PROJECTS, q, SEARCH_FIELDS, bracket_filters(&params)).await?;

    tracing::info!(user_id = %user.id, query = %q, count = projects.len(), "Project search");
    let count = projects.len();
    Ok(ApiResponse::success("Search completed successfully", projects).with("count", count))
}

/// GET /api/v1/nose/export/projects?format=json|csv
pub async fn export(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<QueryParams>,
) -> Result<Response, ApiError> {
    validate::export_query(&params, &["json", "csv"])?;
    let format = export_format(&params);
    let now = Utc::now();

    let filter = Value::Object(bracket_filters(&params));
    let projects = fetch_all(state.store.as_ref(), PROJECTS, filter, json!({"createdAt": -1})).await?;

    tracing::info!(user_id = %user.id, format = %format, count = projects.len(), "Research projects exported");

    if format == "csv" {
        let rows: Vec<Vec<String>> = projects.iter().map(export::project_row).collect();
        let body = csv::plain(PROJECT_COLUMNS, &rows);
        return Ok(Download::csv(export::filename("research_projects", "csv", now), body).into_response());
    }

    let count = projects.len();
    Ok(ApiResponse::success("Projects exported successfully", projects)
        .with("exportDate", timestamp(now))
        .with("count", count)
        .into_response())
}
