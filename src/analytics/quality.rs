use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, Utc};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use super::{array_at, mean};
use crate::services::dates::value_datetime;
use crate::services::documents::{get_path, text_at, timestamp};
use crate::services::ids::alert_id;
use crate::validation::webhunter::DIMENSIONS;

/// Lowest and span of the simulated rule scores (60..=99).
const SCORE_FLOOR: u64 = 60;
const SCORE_SPAN: u64 = 40;

/// Result of one assessment run.
#[derive(Debug, Clone)]
pub struct Assessment {
    /// Stored in the history collection and returned to the caller.
    pub record: Value,
    /// Replaces the monitor's `currentStatus`.
    pub current_status: Value,
    /// Appended to `alerts.active`, one per failing rule.
    pub alerts: Vec<Value>,
}

fn rule_id(rule: &Value) -> &str {
    match text_at(rule, "_id") {
        "" => text_at(rule, "ruleId"),
        id => id,
    }
}

/// Deterministic score for a rule within one assessment.
pub fn rule_score(monitor_id: &str, rule_id: &str, assessment_id: &str) -> u64 {
    let digest = Sha256::digest(format!("{}:{}:{}", monitor_id, rule_id, assessment_id).as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    SCORE_FLOOR + u64::from_be_bytes(head) % SCORE_SPAN
}

/// `(status, threshold)` of a score against a rule's thresholds.
pub fn rule_status(score: f64, thresholds: &Value) -> (&'static str, &'static str) {
    let at = |key: &str| thresholds.get(key).and_then(Value::as_f64);
    if at("critical").map_or(false, |t| score < t) {
        ("fail", "critical")
    } else if at("warning").map_or(false, |t| score < t) {
        ("warning", "warning")
    } else if at("excellent").map_or(false, |t| score >= t) {
        ("pass", "excellent")
    } else {
        ("pass", "target")
    }
}

pub fn grade(score: i64) -> &'static str {
    match score {
        s if s >= 95 => "A+",
        s if s >= 90 => "A",
        s if s >= 85 => "B",
        s if s >= 80 => "C",
        s if s >= 70 => "D",
        _ => "F",
    }
}

pub fn status(score: i64) -> &'static str {
    match score {
        s if s >= 90 => "excellent",
        s if s >= 80 => "good",
        s if s >= 70 => "acceptable",
        s if s >= 60 => "poor",
        _ => "critical",
    }
}

/// Scores every enabled rule, rolls them up per dimension and raises an
/// alert for each failing rule.
pub fn assess(monitor: &Value, assessment_id: &str, now: DateTime<Utc>) -> Assessment {
    let monitor_id = text_at(monitor, "monitorId");
    let rule_results: Vec<Value> = array_at(monitor, "qualityRules")
        .iter()
        .filter(|rule| rule.get("enabled").and_then(Value::as_bool).unwrap_or(true))
        .map(|rule| {
            let id = rule_id(rule);
            let score = rule_score(monitor_id, id, assessment_id);
            let (status, threshold) = rule_status(score as f64, rule.get("thresholds").unwrap_or(&Value::Null));
            json!({
                "ruleId": id,
                "name": text_at(rule, "name"),
                "score": score,
                "status": status,
                "threshold": threshold,
                "dimension": text_at(rule, "dimension"),
            })
        })
        .collect();

    let mut dimension_scores = Map::new();
    for dimension in DIMENSIONS {
        let scores: Vec<f64> = rule_results
            .iter()
            .filter(|r| r["dimension"] == *dimension)
            .filter_map(|r| r["score"].as_f64())
            .collect();
        dimension_scores.insert(dimension.to_string(), json!(mean(&scores).round() as i64));
    }
    let overall: f64 = dimension_scores.values().filter_map(Value::as_f64).sum::<f64>() / DIMENSIONS.len() as f64;
    let overall_score = overall.round() as i64;

    let issues: Vec<Value> = rule_results
        .iter()
        .filter(|r| r["status"] != "pass")
        .map(|r| {
            json!({
                "severity": if r["status"] == "fail" { "high" } else { "medium" },
                "rule": r["ruleId"],
                "description": format!(
                    "{} score ({}) below {} threshold",
                    r["name"].as_str().unwrap_or_default(),
                    r["score"],
                    r["threshold"].as_str().unwrap_or_default()
                ),
                "recommendation": "Review data source validation rules",
            })
        })
        .collect();

    let assessed_at = timestamp(now);
    let alerts = rule_results
        .iter()
        .filter(|r| r["status"] == "fail")
        .map(|r| {
            let id = alert_id(now);
            json!({
                "_id": id,
                "alertId": id,
                "severity": "high",
                "type": "quality_threshold",
                "message": format!(
                    "{} scored {} in assessment {}",
                    r["name"].as_str().unwrap_or_default(),
                    r["score"],
                    assessment_id
                ),
                "ruleId": r["ruleId"],
                "assessmentId": assessment_id,
                "status": "active",
                "triggeredAt": assessed_at,
            })
        })
        .collect();

    let grade = grade(overall_score);
    let status = status(overall_score);
    let current_status = json!({
        "status": status,
        "grade": grade,
        "overallScore": overall_score,
        "dimensions": dimension_scores,
        "lastAssessment": assessed_at,
        "assessmentId": assessment_id,
        "issues": issues,
    });
    let record = json!({
        "monitorId": monitor_id,
        "assessmentId": assessment_id,
        "overallScore": overall_score,
        "dimensionScores": dimension_scores,
        "grade": grade,
        "status": status,
        "ruleResults": rule_results,
        "issues": issues,
        "assessedAt": assessed_at,
    });

    Assessment { record, current_status, alerts }
}

/// Alerts filtered by status (`all` keeps every status) and severity.
pub fn filter_alerts(monitor: &Value, status: &str, severity: Option<&str>, limit: usize) -> Vec<Value> {
    array_at(monitor, "alerts.active")
        .iter()
        .filter(|a| status == "all" || text_at(a, "status") == status)
        .filter(|a| severity.map_or(true, |s| text_at(a, "severity") == s))
        .take(limit)
        .cloned()
        .collect()
}

fn framework_rollup(framework: &Value, detailed: bool) -> Value {
    let requirements = array_at(framework, "requirements");
    let scores: Vec<f64> = requirements.iter().filter_map(|r| r.get("score").and_then(Value::as_f64)).collect();
    let overall_score = framework
        .get("overallScore")
        .cloned()
        .unwrap_or_else(|| json!(mean(&scores).round() as i64));
    let overall_status = framework.get("overallStatus").cloned().unwrap_or_else(|| {
        let statuses: Vec<&str> = requirements.iter().map(|r| text_at(r, "status")).collect();
        let derived = if statuses.iter().any(|s| *s == "non_compliant") {
            "non_compliant"
        } else if statuses.iter().all(|s| *s == "compliant") {
            "compliant"
        } else {
            "partial"
        };
        json!(derived)
    });

    let mut report = json!({
        "name": text_at(framework, "name"),
        "overallStatus": overall_status,
        "overallScore": overall_score,
    });
    if detailed {
        report["requirements"] = requirements
            .iter()
            .map(|r| {
                json!({
                    "requirementId": r.get("requirementId").cloned().unwrap_or(Value::Null),
                    "name": r.get("name").cloned().unwrap_or(Value::Null),
                    "status": r.get("status").cloned().unwrap_or(Value::Null),
                    "score": r.get("score").cloned().unwrap_or(Value::Null),
                    "lastCheck": r.get("lastCheck").cloned().unwrap_or(Value::Null),
                })
            })
            .collect();
    }
    report
}

/// Compliance report, optionally narrowed to one framework (case-insensitive).
pub fn compliance_report(monitor: &Value, framework: Option<&str>, detailed: bool, now: DateTime<Utc>) -> Value {
    let frameworks: Vec<Value> = array_at(monitor, "compliance.frameworks")
        .iter()
        .filter(|f| framework.map_or(true, |name| text_at(f, "name").eq_ignore_ascii_case(name)))
        .map(|f| framework_rollup(f, detailed))
        .collect();
    json!({
        "monitorId": text_at(monitor, "monitorId"),
        "monitorName": text_at(monitor, "name"),
        "generatedAt": timestamp(now),
        "frameworks": frameworks,
        "governance": get_path(monitor, "compliance.governance").cloned().unwrap_or(Value::Null),
    })
}

/// Filters applied to stored assessments.
#[derive(Debug, Default, Clone)]
pub struct HistoryFilter {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub min_score: Option<f64>,
    pub grade: Option<String>,
}

/// Matching assessments, newest first.
pub fn history(assessments: Vec<Value>, filter: &HistoryFilter) -> Vec<Value> {
    let mut matched: Vec<(Option<DateTime<Utc>>, Value)> = assessments
        .into_iter()
        .map(|a| (value_datetime(a.get("assessedAt")), a))
        .filter(|(at, _)| filter.start.map_or(true, |s| at.map_or(false, |t| t >= s)))
        .filter(|(at, _)| filter.end.map_or(true, |e| at.map_or(false, |t| t <= e)))
        .filter(|(_, a)| {
            filter
                .min_score
                .map_or(true, |min| a.get("overallScore").and_then(Value::as_f64).map_or(false, |s| s >= min))
        })
        .filter(|(_, a)| filter.grade.as_deref().map_or(true, |g| text_at(a, "grade") == g))
        .collect();
    matched.sort_by(|a, b| b.0.cmp(&a.0));
    matched.into_iter().map(|(_, a)| a).collect()
}

pub fn period_duration(period: &str) -> Duration {
    match period {
        "24h" => Duration::hours(24),
        "7d" => Duration::days(7),
        "90d" => Duration::days(90),
        _ => Duration::days(30),
    }
}

fn bucket_key(at: DateTime<Utc>, granularity: &str) -> String {
    match granularity {
        "hour" => at.format("%Y-%m-%dT%H:00").to_string(),
        "week" => {
            let monday = at.date_naive() - Duration::days(at.weekday().num_days_from_monday() as i64);
            monday.format("%Y-%m-%d").to_string()
        }
        _ => at.format("%Y-%m-%d").to_string(),
    }
}

/// Per-bucket average score for each requested dimension over the period
/// ending at `now`.
pub fn trends(assessments: &[Value], period: &str, dimensions: &[&str], granularity: &str, now: DateTime<Utc>) -> Vec<Value> {
    let since = now - period_duration(period);
    let mut buckets: BTreeMap<String, Vec<&Value>> = BTreeMap::new();
    for assessment in assessments {
        if let Some(at) = value_datetime(assessment.get("assessedAt")).filter(|at| *at >= since && *at <= now) {
            buckets.entry(bucket_key(at, granularity)).or_default().push(assessment);
        }
    }

    buckets
        .into_iter()
        .map(|(key, items)| {
            let mut row = Map::new();
            row.insert("period".into(), json!(key));
            row.insert("assessments".into(), json!(items.len()));
            for dimension in dimensions {
                let scores: Vec<f64> = items
                    .iter()
                    .filter_map(|a| get_path(a, &format!("dimensionScores.{}", dimension)).and_then(Value::as_f64))
                    .collect();
                row.insert(dimension.to_string(), json!((mean(&scores) * 100.0).round() / 100.0));
            }
            let overall: Vec<f64> = items.iter().filter_map(|a| a.get("overallScore").and_then(Value::as_f64)).collect();
            row.insert("overallScore".into(), json!((mean(&overall) * 100.0).round() / 100.0));
            Value::Object(row)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn monitor() -> Value {
        json!({
            "monitorId": "DQM0000001",
            "name": "Orders",
            "qualityRules": [
                {"_id": "r1", "name": "Ids present", "dimension": "completeness",
                 "thresholds": {"excellent": 95, "target": 90, "warning": 80, "critical": 70}},
                {"_id": "r2", "name": "Emails valid", "dimension": "validity",
                 "thresholds": {"excellent": 101, "target": 101, "warning": 101, "critical": 101}},
                {"_id": "r3", "name": "Disabled", "dimension": "accuracy", "enabled": false,
                 "thresholds": {"critical": 101}}
            ],
            "compliance": {"frameworks": [
                {"name": "GDPR", "requirements": [
                    {"requirementId": "g1", "status": "compliant", "score": 90},
                    {"requirementId": "g2", "status": "partial", "score": 70}
                ]},
                {"name": "SOX", "overallStatus": "compliant", "overallScore": 99, "requirements": []}
            ]}
        })
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn scores_are_deterministic_and_bounded() {
        let a = rule_score("DQM0000001", "r1", "assess_1");
        assert_eq!(a, rule_score("DQM0000001", "r1", "assess_1"));
        for i in 0..50 {
            let s = rule_score("DQM0000001", "r1", &format!("assess_{}", i));
            assert!((60..=99).contains(&s));
        }
    }

    #[test]
    fn rule_status_thresholds() {
        let t = json!({"excellent": 95, "target": 90, "warning": 80, "critical": 70});
        assert_eq!(rule_status(65.0, &t), ("fail", "critical"));
        assert_eq!(rule_status(75.0, &t), ("warning", "warning"));
        assert_eq!(rule_status(85.0, &t), ("pass", "target"));
        assert_eq!(rule_status(96.0, &t), ("pass", "excellent"));
    }

    #[test]
    fn grade_and_status_boundaries() {
        assert_eq!(grade(95), "A+");
        assert_eq!(grade(94), "A");
        assert_eq!(grade(85), "B");
        assert_eq!(grade(80), "C");
        assert_eq!(grade(70), "D");
        assert_eq!(grade(69), "F");
        assert_eq!(status(90), "excellent");
        assert_eq!(status(79), "acceptable");
        assert_eq!(status(59), "critical");
    }

    #[test]
    fn assessment_skips_disabled_rules_and_alerts_on_failures() {
        let result = assess(&monitor(), "assess_1", now());
        let rules = result.record["ruleResults"].as_array().unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(result.record["dimensionScores"]["accuracy"], 0);
        assert_eq!(result.record["ruleResults"][1]["status"], "fail");
        assert_eq!(result.alerts.len(), rules.iter().filter(|r| r["status"] == "fail").count());
        assert!(result.alerts.iter().all(|a| a["alertId"].as_str().unwrap().starts_with("ALT")));
        assert_eq!(result.current_status["assessmentId"], "assess_1");
        let overall = result.record["overallScore"].as_i64().unwrap();
        assert_eq!(result.record["grade"], grade(overall));
    }

    #[test]
    fn compliance_rolls_up_requirements() {
        let report = compliance_report(&monitor(), Some("gdpr"), true, now());
        let frameworks = report["frameworks"].as_array().unwrap();
        assert_eq!(frameworks.len(), 1);
        assert_eq!(frameworks[0]["overallScore"], 80);
        assert_eq!(frameworks[0]["overallStatus"], "partial");
        assert_eq!(frameworks[0]["requirements"].as_array().unwrap().len(), 2);

        let summary = compliance_report(&monitor(), None, false, now());
        assert_eq!(summary["frameworks"][1]["overallScore"], 99);
        assert!(summary["frameworks"][0].get("requirements").is_none());
    }

    fn stored(at: &str, score: i64, completeness: i64) -> Value {
        json!({
            "assessedAt": at,
            "overallScore": score,
            "grade": grade(score),
            "dimensionScores": {"completeness": completeness, "accuracy": 80, "consistency": 80, "validity": 80}
        })
    }

    #[test]
    fn history_filters_and_orders_newest_first() {
        let items = vec![
            stored("2024-06-01T00:00:00Z", 92, 90),
            stored("2024-06-10T00:00:00Z", 75, 70),
            stored("2024-06-05T00:00:00Z", 88, 80),
        ];
        let all = history(items.clone(), &HistoryFilter::default());
        assert_eq!(all[0]["assessedAt"], "2024-06-10T00:00:00Z");

        let filter = HistoryFilter { min_score: Some(80.0), ..Default::default() };
        let good = history(items.clone(), &filter);
        assert_eq!(good.len(), 2);
        assert_eq!(good[0]["overallScore"], 88);

        let filter = HistoryFilter { grade: Some("A".into()), ..Default::default() };
        assert_eq!(history(items, &filter).len(), 1);
    }

    #[test]
    fn trends_bucket_by_granularity() {
        let items = vec![
            stored("2024-06-14T01:00:00Z", 90, 90),
            stored("2024-06-14T05:00:00Z", 80, 70),
            stored("2024-06-10T00:00:00Z", 70, 60),
            stored("2024-01-01T00:00:00Z", 70, 60),
        ];
        let daily = trends(&items, "7d", &["completeness"], "day", now());
        assert_eq!(daily.len(), 2);
        assert_eq!(daily[1]["period"], "2024-06-14");
        assert_eq!(daily[1]["completeness"], 80.0);
        assert_eq!(daily[1]["assessments"], 2);

        let weekly = trends(&items, "30d", &["completeness"], "week", now());
        assert_eq!(weekly[0]["period"], "2024-06-10");
        assert_eq!(weekly[0]["assessments"], 3);
    }
}
