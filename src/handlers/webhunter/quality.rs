// handlers/webhunter/quality.rs - assessment, alert, compliance, history and trend handlers
// under /api/v1/webhunter/quality-monitors/:monitorId

use axum::extract::{Path, Query, State};
use axum::Extension;
use chrono::Utc;
use serde_json::{json, Value};

use super::{load_monitor, update_monitor, ASSESSMENTS};
use crate::analytics::quality::{self, HistoryFilter};
use crate::error::ApiError;
use crate::handlers::utils::{fetch_all, position_by};
use crate::middleware::{ApiResponse, ApiResult, AuthUser, JsonBody};
use crate::services::dates::parse_datetime;
use crate::services::documents::{get_path, get_path_mut, set_path, stamp_updated, text_at, timestamp};
use crate::services::ids::assessment_id;
use crate::services::query::{non_empty, PageRequest, QueryParams};
use crate::validation::webhunter::{self as validate, DIMENSIONS};
use crate::AppState;

fn active_alerts(monitor: &mut Value) -> Result<&mut Vec<Value>, ApiError> {
    if !matches!(get_path(monitor, "alerts.active"), Some(Value::Array(_))) {
        set_path(monitor, "alerts.active", json!([]));
    }
    match get_path_mut(monitor, "alerts.active") {
        Some(Value::Array(alerts)) => Ok(alerts),
        _ => Err(ApiError::internal_server_error("Monitor alerts are malformed")),
    }
}

/// POST /api/v1/webhunter/quality-monitors/:monitorId/assess
///
/// Scores every enabled rule, refreshes `currentStatus` and raises an alert
/// per failing rule. The history record is written only once the monitor
/// update has landed.
pub async fn assess(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(monitor_id): Path<String>,
    body: Option<JsonBody>,
) -> ApiResult<Value> {
    let body = body.map(|JsonBody(b)| b).unwrap_or_else(|| json!({}));
    validate::assess(&body)?;

    let now = Utc::now();
    let id = assessment_id(now);
    let (_, (mut record, raised)) = update_monitor(&state, &monitor_id, |monitor| {
        let result = quality::assess(monitor, &id, now);
        let raised = result.alerts.len();
        set_path(monitor, "currentStatus", result.current_status);
        active_alerts(monitor)?.extend(result.alerts);
        stamp_updated(monitor, &user.id, now);
        Ok((result.record, raised))
    })
    .await?;

    let assessment_type = match text_at(&body, "assessmentType") {
        "" => "immediate",
        other => other,
    };
    set_path(&mut record, "assessmentType", json!(assessment_type));
    set_path(&mut record, "assessedBy", json!(user.id));
    let record = state.store.insert(ASSESSMENTS, &id, record).await?;

    tracing::info!(
        monitor_id = %monitor_id,
        assessment_id = %id,
        user_id = %user.id,
        overall_score = %record["overallScore"],
        grade = text_at(&record, "grade"),
        alerts = raised,
        "Quality assessment completed"
    );
    Ok(ApiResponse::success("Quality assessment completed successfully", record))
}

/// GET /api/v1/webhunter/quality-monitors/:monitorId/alerts
pub async fn alerts(
    State(state): State<AppState>,
    Path(monitor_id): Path<String>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Vec<Value>> {
    validate::alerts_query(&params)?;
    let monitor = load_monitor(&state, &monitor_id).await?;

    let status = non_empty(&params, "status").unwrap_or("active");
    let limit = non_empty(&params, "limit").and_then(|l| l.parse().ok()).unwrap_or(50);
    let alerts = quality::filter_alerts(&monitor, status, non_empty(&params, "severity"), limit);

    let count = alerts.len();
    let name = text_at(&monitor, "name").to_string();
    Ok(ApiResponse::success("Quality alerts retrieved successfully", alerts)
        .with("count", count)
        .with("monitorId", monitor_id)
        .with("monitorName", name))
}

/// PATCH /api/v1/webhunter/quality-monitors/:monitorId/alerts/:alertId
pub async fn acknowledge(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((monitor_id, alert_id)): Path<(String, String)>,
    JsonBody(body): JsonBody,
) -> ApiResult<Value> {
    validate::monitor_path(&monitor_id, Some(&alert_id))?;
    validate::acknowledge_alert(&body)?;

    let now = Utc::now();
    let (_, alert) = update_monitor(&state, &monitor_id, |monitor| {
        let alerts = active_alerts(monitor)?;
        let index = position_by(alerts, "alertId", &alert_id).ok_or_else(|| ApiError::not_found("Alert not found"))?;
        let alert = &mut alerts[index];
        set_path(alert, "status", json!(text_at(&body, "status")));
        set_path(alert, "acknowledgedBy", json!(user.id));
        set_path(alert, "acknowledgedAt", json!(timestamp(now)));
        set_path(alert, "notes", body.get("notes").cloned().unwrap_or(Value::Null));
        let alert = alert.clone();
        stamp_updated(monitor, &user.id, now);
        Ok(alert)
    })
    .await?;

    tracing::info!(
        monitor_id = %monitor_id,
        alert_id = %alert_id,
        user_id = %user.id,
        status = text_at(&alert, "status"),
        notes = if body.get("notes").is_some() { "provided" } else { "none" },
        "Quality alert acknowledged"
    );
    Ok(ApiResponse::success("Alert acknowledged successfully", alert))
}

/// GET /api/v1/webhunter/quality-monitors/:monitorId/compliance (admin)
pub async fn compliance(
    State(state): State<AppState>,
    Path(monitor_id): Path<String>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Value> {
    validate::compliance_query(&params)?;
    let monitor = load_monitor(&state, &monitor_id).await?;
    let detailed = non_empty(&params, "detailed").map_or(true, |d| d != "false");
    let report = quality::compliance_report(&monitor, non_empty(&params, "framework"), detailed, Utc::now());
    Ok(ApiResponse::success("Compliance report generated successfully", report))
}

fn history_filter(params: &QueryParams) -> HistoryFilter {
    HistoryFilter {
        start: non_empty(params, "startDate").and_then(parse_datetime),
        end: non_empty(params, "endDate").and_then(parse_datetime),
        min_score: non_empty(params, "minScore").and_then(|s| s.parse().ok()),
        grade: non_empty(params, "grade").map(str::to_string),
    }
}

async fn assessments(state: &AppState, monitor_id: &str) -> Result<Vec<Value>, ApiError> {
    fetch_all(state.store.as_ref(), ASSESSMENTS, json!({"monitorId": monitor_id}), json!({"assessedAt": -1})).await
}

/// GET /api/v1/webhunter/quality-monitors/:monitorId/history
pub async fn history(
    State(state): State<AppState>,
    Path(monitor_id): Path<String>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Vec<Value>> {
    validate::history_query(&params)?;
    let page = PageRequest::with_default_sort(&params, "assessedAt")?;
    load_monitor(&state, &monitor_id).await?;

    let matched = quality::history(assessments(&state, &monitor_id).await?, &history_filter(&params));
    let total = matched.len() as u64;
    Ok(ApiResponse::paginated(
        "Assessment history retrieved successfully",
        page.window(&matched),
        page.pagination(total),
    ))
}

/// GET /api/v1/webhunter/quality-monitors/:monitorId/trends
pub async fn trends(
    State(state): State<AppState>,
    Path(monitor_id): Path<String>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Value> {
    validate::trends_query(&params)?;
    load_monitor(&state, &monitor_id).await?;

    let period = non_empty(&params, "period").unwrap_or("30d");
    let granularity = non_empty(&params, "granularity").unwrap_or("day");
    let dimensions: Vec<&str> = match non_empty(&params, "dimensions") {
        Some(list) => list.split(',').map(str::trim).filter(|d| !d.is_empty()).collect(),
        None => DIMENSIONS.to_vec(),
    };

    let history = assessments(&state, &monitor_id).await?;
    let trends = quality::trends(&history, period, &dimensions, granularity, Utc::now());
    Ok(ApiResponse::success(
        "Quality trends retrieved successfully",
        json!({"period": period, "dimensions": dimensions, "trends": trends}),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_filter_from_query() {
        let mut params = QueryParams::new();
        params.insert("startDate".into(), "2024-01-01".into());
        params.insert("minScore".into(), "75".into());
        params.insert("grade".into(), "B".into());
        let filter = history_filter(&params);
        assert!(filter.start.is_some());
        assert!(filter.end.is_none());
        assert_eq!(filter.min_score, Some(75.0));
        assert_eq!(filter.grade.as_deref(), Some("B"));
    }

    #[test]
    fn alerts_array_is_created_on_demand() {
        let mut monitor = json!({"monitorId": "DQM0000001"});
        active_alerts(&mut monitor).unwrap().push(json!({"alertId": "ALT1"}));
        assert_eq!(monitor["alerts"]["active"][0]["alertId"], "ALT1");
    }
}
