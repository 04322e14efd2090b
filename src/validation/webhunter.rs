use serde_json::Value;

use super::{as_integer, finish_all, query_value, Presence::*, Validator};
use crate::error::ApiError;
use crate::services::query::QueryParams;

pub const TARGET_TYPES: &[&str] = &["data_source", "provider", "workflow", "system"];
pub const MONITOR_STATUSES: &[&str] = &["active", "inactive", "maintenance"];
pub const GRADES: &[&str] = &["A+", "A", "B", "C", "D", "F"];
pub const TIME_RANGES: &[&str] = &["real_time", "daily", "weekly", "monthly"];
pub const DIMENSIONS: &[&str] = &["completeness", "accuracy", "consistency", "validity"];
pub const RULE_TYPES: &[&str] = &["threshold", "pattern", "statistical", "business_rule"];
pub const FREQUENCIES: &[&str] = &["continuous", "hourly", "daily", "weekly"];
pub const COMPLIANCE_FRAMEWORKS: &[&str] = &["GDPR", "CCPA", "SOX", "HIPAA", "PCI_DSS"];
pub const SEVERITIES: &[&str] = &["low", "medium", "high", "critical"];
pub const ACK_STATUSES: &[&str] = &["acknowledged", "resolved", "false_positive"];
pub const ALERT_FILTERS: &[&str] = &["active", "acknowledged", "resolved", "all"];
pub const TREND_PERIODS: &[&str] = &["24h", "7d", "30d", "90d"];
pub const GRANULARITIES: &[&str] = &["hour", "day", "week"];
pub const ASSESSMENT_TYPES: &[&str] = &["immediate", "scheduled", "comprehensive"];

fn rules(v: &mut Validator<'_>) {
    v.length("qualityRules.*.name", Required, 1, 200, "Rule name is required")
        .one_of("qualityRules.*.dimension", Required, DIMENSIONS, "Invalid quality dimension")
        .one_of("qualityRules.*.type", Required, RULE_TYPES, "Invalid rule type");
    for threshold in ["excellent", "target", "warning", "critical"] {
        v.number(
            &format!("qualityRules.*.thresholds.{}", threshold),
            Required,
            0.0,
            100.0,
            &format!("Threshold {} must be between 0 and 100", threshold),
        );
    }
    v.number("qualityRules.*.weight", Optional, 0.1, 10.0, "Rule weight must be between 0.1 and 10")
        .boolean("qualityRules.*.enabled", Optional, "Rule enabled flag must be a boolean");
}

pub fn create_monitor(body: &Value) -> Result<(), ApiError> {
    let mut v = Validator::body(body);
    v.length("name", Required, 2, 200, "Monitor name must be at least 2 characters")
        .length("description", Required, 10, 2000, "Description must be at least 10 characters")
        .one_of("scope.target.type", Required, TARGET_TYPES, "Invalid target type")
        .length("scope.target.id", Required, 1, 200, "Target ID is required")
        .length("scope.target.name", Required, 1, 200, "Target name is required")
        .array("scope.coverage.dataTypes", Required, 0, "Data types must be an array")
        .one_of("scope.coverage.timeRange", Required, TIME_RANGES, "Invalid coverage time range")
        .number("scope.coverage.sampleSize", Optional, 1.0, 100_000.0, "Sample size must be between 1 and 100000")
        .array("qualityRules", Required, 1, "At least one quality rule is required");
    rules(&mut v);
    v.one_of("schedule.frequency", Required, FREQUENCIES, "Invalid schedule frequency")
        .boolean("schedule.enabled", Optional, "Schedule enabled flag must be a boolean")
        .array("compliance.frameworks", Optional, 0, "Compliance frameworks must be an array")
        .one_of("compliance.frameworks.*.name", Required, COMPLIANCE_FRAMEWORKS, "Invalid compliance framework");
    v.finish()
}

pub fn update_monitor(body: &Value) -> Result<(), ApiError> {
    let mut v = Validator::body(body);
    v.length("name", Optional, 2, 200, "Monitor name must be at least 2 characters")
        .length("description", Optional, 10, 2000, "Description must be at least 10 characters")
        .object("scope", Optional, "Scope must be an object")
        .array("qualityRules", Optional, 0, "Quality rules must be an array")
        .object("schedule", Optional, "Schedule must be an object")
        .object("compliance", Optional, "Compliance must be an object")
        .object("notifications", Optional, "Notifications must be an object");
    if body.get("qualityRules").map_or(false, Value::is_array) {
        rules(&mut v);
    }
    v.finish()
}

pub fn assess(body: &Value) -> Result<(), ApiError> {
    let mut v = Validator::body(body);
    v.one_of("assessmentType", Optional, ASSESSMENT_TYPES, "Invalid assessment type")
        .boolean("includeRecommendations", Optional, "includeRecommendations must be a boolean");
    v.finish()
}

pub fn acknowledge_alert(body: &Value) -> Result<(), ApiError> {
    let mut v = Validator::body(body);
    v.one_of("status", Required, ACK_STATUSES, "Status must be acknowledged, resolved, or false_positive")
        .length("notes", Optional, 5, 2000, "Notes must be at least 5 characters")
        .one_of("priority", Optional, SEVERITIES, "Invalid priority");
    v.finish()
}

fn in_range(min: i64, max: i64) -> impl Fn(&Value) -> bool {
    move |v| as_integer(v).map(|n| (min..=max).contains(&n)).unwrap_or(false)
}

/// Filters accepted by `GET /quality-monitors`.
pub fn monitor_list_query(params: &QueryParams) -> Result<(), ApiError> {
    let query = query_value(params);
    let mut q = Validator::query(&query);
    q.length("search", Optional, 2, 100, "Search query must be at least 2 characters")
        .one_of("targetType", Optional, TARGET_TYPES, "Invalid target type filter")
        .one_of("status", Optional, MONITOR_STATUSES, "Invalid status filter")
        .one_of("grade", Optional, GRADES, "Invalid grade filter");
    q.finish()
}

pub fn alerts_query(params: &QueryParams) -> Result<(), ApiError> {
    let query = query_value(params);
    let mut q = Validator::query(&query);
    q.one_of("status", Optional, ALERT_FILTERS, "Invalid alert status filter")
        .one_of("severity", Optional, SEVERITIES, "Invalid severity filter")
        .check("limit", Optional, "Limit must be between 1 and 200", in_range(1, 200))
        .iso_date("startDate", Optional, "Valid start date is required")
        .iso_date("endDate", Optional, "Valid end date is required");
    q.finish()
}

pub fn compliance_query(params: &QueryParams) -> Result<(), ApiError> {
    let query = query_value(params);
    let mut q = Validator::query(&query);
    q.check("framework", Optional, "Invalid compliance framework", |v| {
        v.as_str()
            .map(|s| COMPLIANCE_FRAMEWORKS.iter().any(|f| f.eq_ignore_ascii_case(s)))
            .unwrap_or(false)
    })
    .boolean("detailed", Optional, "detailed must be a boolean")
    .one_of("period", Optional, &["current", "last_30_days", "last_90_days", "yearly"], "Invalid report period");
    q.finish()
}

pub fn history_query(params: &QueryParams) -> Result<(), ApiError> {
    let query = query_value(params);
    let mut q = Validator::query(&query);
    q.iso_date("startDate", Optional, "Valid start date is required")
        .iso_date("endDate", Optional, "Valid end date is required")
        .number("minScore", Optional, 0.0, 100.0, "Minimum score must be between 0 and 100")
        .one_of("grade", Optional, GRADES, "Invalid grade filter");
    q.finish()
}

pub fn trends_query(params: &QueryParams) -> Result<(), ApiError> {
    let query = query_value(params);
    let mut q = Validator::query(&query);
    q.one_of("period", Optional, TREND_PERIODS, "Period must be 24h, 7d, 30d, or 90d")
        .one_of("granularity", Optional, GRANULARITIES, "Granularity must be hour, day, or week")
        .check("dimensions", Optional, "Invalid quality dimension", |v| {
            v.as_str()
                .map(|s| s.split(',').map(str::trim).all(|d| DIMENSIONS.contains(&d)))
                .unwrap_or(false)
        });
    q.finish()
}

/// Path parameters shared by the per-monitor routes.
pub fn monitor_path(monitor_id: &str, alert_id: Option<&str>) -> Result<(), ApiError> {
    let params = match alert_id {
        Some(alert) => serde_json::json!({ "monitorId": monitor_id, "alertId": alert }),
        None => serde_json::json!({ "monitorId": monitor_id }),
    };
    let mut p = Validator::params(&params);
    p.length("monitorId", Required, 1, 100, "Monitor ID is required");
    if alert_id.is_some() {
        p.length("alertId", Required, 1, 100, "Alert ID is required");
    }
    finish_all(vec![p])
}
