use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Map, Value};

use super::{count_by, mean, monthly_counts, number_at, range_start, round2};
use crate::services::dates::{month_start, value_datetime};
use crate::services::documents::{get_path, text_at};

const INDUSTRY_TURNOVER_BENCHMARK: u32 = 15;
const TARGET_TURNOVER: u32 = 10;

/// `employment.department` is either a name or `{name, description}`.
pub fn department_name(employee: &Value) -> String {
    match get_path(employee, "employment.department") {
        Some(Value::String(name)) if !name.trim().is_empty() => name.clone(),
        Some(Value::Object(dept)) => dept
            .get("name")
            .and_then(Value::as_str)
            .filter(|n| !n.trim().is_empty())
            .unwrap_or("Unassigned")
            .to_string(),
        _ => "Unassigned".to_string(),
    }
}

fn department_description(employee: &Value) -> &str {
    text_at(employee, "employment.department.description")
}

fn status(employee: &Value) -> &str {
    text_at(employee, "status")
}

fn salary(employee: &Value) -> f64 {
    number_at(employee, "compensation.salary.amount")
}

fn rating(employee: &Value) -> Option<f64> {
    get_path(employee, "performance.currentRating").and_then(Value::as_f64).filter(|r| *r > 0.0)
}

/// Whole 30-day months between start and end (or `now`).
pub fn tenure_months(employee: &Value, now: DateTime<Utc>) -> i64 {
    let Some(start) = value_datetime(get_path(employee, "employment.startDate")) else {
        return 0;
    };
    let end = value_datetime(get_path(employee, "employment.endDate")).unwrap_or(now);
    (end - start).num_days().div_euclid(30)
}

fn average_tenure(employees: &[&Value], now: DateTime<Utc>) -> i64 {
    let tenures: Vec<f64> = employees.iter().map(|e| tenure_months(e, now) as f64).collect();
    mean(&tenures).round() as i64
}

fn average_salary(employees: &[&Value]) -> i64 {
    let salaries: Vec<f64> = employees.iter().map(|e| salary(e)).collect();
    mean(&salaries).round() as i64
}

fn department_distribution(employees: &[&Value]) -> BTreeMap<String, u64> {
    let mut counts = BTreeMap::new();
    for e in employees {
        *counts.entry(department_name(e)).or_default() += 1;
    }
    counts
}

fn recent_activity(employees: &[Value]) -> Vec<Value> {
    let mut touched: Vec<(DateTime<Utc>, &Value)> = employees
        .iter()
        .filter_map(|e| value_datetime(get_path(e, "audit.lastModified")).map(|t| (t, e)))
        .collect();
    touched.sort_by(|a, b| b.0.cmp(&a.0));
    touched
        .into_iter()
        .take(5)
        .map(|(_, e)| {
            json!({
                "employeeId": text_at(e, "employeeId"),
                "name": format!("{} {}", text_at(e, "firstName"), text_at(e, "lastName")),
                "action": "updated",
                "timestamp": text_at(e, "audit.lastModified"),
            })
        })
        .collect()
}

/// `GET /analytics/dashboard`: overview counts, department split, recent
/// activity and hires within `timeRange`.
pub fn dashboard(employees: &[Value], time_range: &str, now: DateTime<Utc>) -> Value {
    let (time_range, start) = range_start(now, time_range, "6months");
    let active: Vec<&Value> = employees.iter().filter(|e| status(e) == "active").collect();
    let count_status = |s: &str| employees.iter().filter(|e| status(e) == s).count();
    let terminated = count_status("terminated");
    let total = employees.len();
    let turnover_rate = if total > 0 { ((terminated as f64 / total as f64) * 100.0).round() as i64 } else { 0 };

    let departments = department_distribution(&active);
    let top_department = departments
        .iter()
        .fold(None::<(&String, u64)>, |best, (name, count)| match best {
            Some((_, c)) if c >= *count => best,
            _ => Some((name, *count)),
        })
        .map(|(name, _)| name.clone())
        .unwrap_or_else(|| "None".to_string());

    let new_hires = employees
        .iter()
        .filter(|e| value_datetime(get_path(e, "employment.startDate")).map_or(false, |d| d >= start))
        .count();
    let month_ago = now - Duration::days(30);
    let this_month = employees
        .iter()
        .filter(|e| value_datetime(get_path(e, "createdAt")).map_or(false, |d| d > month_ago))
        .count();

    json!({
        "overview": {
            "totalEmployees": total,
            "activeEmployees": active.len(),
            "inactiveEmployees": count_status("inactive"),
            "pendingEmployees": count_status("pending"),
            "terminatedEmployees": terminated,
            "turnoverRate": turnover_rate,
            "avgSalary": {"amount": average_salary(&active), "currency": "USD"},
        },
        "departments": departments,
        "recentActivity": recent_activity(employees),
        "trends": {"newHires": new_hires, "timeRange": time_range},
        "quickStats": {
            "employeesThisMonth": this_month,
            "avgTenure": average_tenure(&active, now),
            "topDepartment": top_department,
        },
    })
}

/// `GET /analytics/headcount`: current breakdowns, monthly hiring trend and
/// demographics.
pub fn headcount(employees: &[Value], time_range: &str, now: DateTime<Utc>) -> Value {
    let all: Vec<&Value> = employees.iter().collect();
    let months_back = match time_range {
        "1year" => 12,
        "2years" => 24,
        _ => 6,
    };
    let starts = employees.iter().filter_map(|e| value_datetime(get_path(e, "employment.startDate")));
    let monthly = monthly_counts(month_start(now, months_back), now, starts);

    json!({
        "current": {
            "total": employees.len(),
            "active": employees.iter().filter(|e| status(e) == "active").count(),
            "byDepartment": department_distribution(&all),
            "byLevel": count_by(employees, "employment.position.level", "unspecified"),
            "byStatus": count_by(employees, "status", "unknown"),
        },
        "trends": {
            "growth": growth_rate(&monthly),
            "monthly": monthly,
        },
        "demographics": {
            "avgAge": average_age(employees, now),
            "genderDistribution": count_by(employees, "personalInfo.gender", "not_specified"),
            "tenureDistribution": tenure_distribution(employees, now),
        },
    })
}

/// Percent change between the last two months, rounded.
pub fn growth_rate(monthly: &[Value]) -> i64 {
    let count = |i: usize| monthly.get(i).and_then(|m| m["count"].as_f64()).unwrap_or(0.0);
    if monthly.len() < 2 {
        return 0;
    }
    let (latest, previous) = (count(monthly.len() - 1), count(monthly.len() - 2));
    if previous > 0.0 {
        (((latest - previous) / previous) * 100.0).round() as i64
    } else {
        0
    }
}

fn average_age(employees: &[Value], now: DateTime<Utc>) -> i64 {
    let ages: Vec<f64> = employees
        .iter()
        .filter_map(|e| value_datetime(get_path(e, "personalInfo.dateOfBirth")))
        .map(|birth| ((now - birth).num_days() as f64 / 365.25).floor())
        .collect();
    mean(&ages).round() as i64
}

pub fn tenure_distribution(employees: &[Value], now: DateTime<Utc>) -> Value {
    let mut buckets = [0u64; 4];
    for e in employees {
        let years = tenure_months(e, now) as f64 / 12.0;
        let index = if years < 1.0 {
            0
        } else if years < 3.0 {
            1
        } else if years < 5.0 {
            2
        } else {
            3
        };
        buckets[index] += 1;
    }
    json!({"0-1": buckets[0], "1-3": buckets[1], "3-5": buckets[2], "5+": buckets[3]})
}

/// `GET /analytics/turnover` over employees created within `timeRange`.
pub fn turnover(employees: &[Value], time_range: &str, now: DateTime<Utc>) -> Value {
    let (_, start) = range_start(now, time_range, "1year");
    let cohort: Vec<&Value> = employees
        .iter()
        .filter(|e| value_datetime(get_path(e, "createdAt")).map_or(false, |d| d >= start))
        .collect();
    let terminated: Vec<&Value> = cohort.iter().copied().filter(|e| status(e) == "terminated").collect();
    let rate = if cohort.is_empty() { 0.0 } else { terminated.len() as f64 / cohort.len() as f64 * 100.0 };

    let by_department = department_distribution(&terminated);
    let voluntary = terminated
        .iter()
        .filter(|e| text_at(e, "employment.terminationReason") == "voluntary")
        .count();

    let mut reasons: BTreeMap<String, u64> = BTreeMap::new();
    for e in &terminated {
        let reason = match text_at(e, "employment.terminationReason") {
            "" => "unknown",
            r => r,
        };
        *reasons.entry(reason.to_string()).or_default() += 1;
    }

    let ends = terminated.iter().filter_map(|e| value_datetime(get_path(e, "employment.endDate")));

    json!({
        "overview": {
            "turnoverRate": round2(rate),
            "totalTerminations": terminated.len(),
            "voluntaryTurnover": voluntary,
            "involuntaryTurnover": terminated.len() - voluntary,
            "avgTenureTerminated": average_tenure(&terminated, now),
        },
        "insights": turnover_insights(rate, &by_department),
        "byDepartment": by_department,
        "reasons": reasons,
        "trends": {
            "monthly": monthly_counts(start, now, ends),
            "benchmark": {"industry": INDUSTRY_TURNOVER_BENCHMARK, "target": TARGET_TURNOVER},
        },
    })
}

pub fn turnover_insights(rate: f64, by_department: &BTreeMap<String, u64>) -> Vec<String> {
    let mut insights = Vec::new();
    if rate > 20.0 {
        insights.push("High turnover rate detected - consider retention strategies".to_string());
    }
    let hot: Vec<&str> = by_department.iter().filter(|(_, c)| **c > 5).map(|(d, _)| d.as_str()).collect();
    if !hot.is_empty() {
        insights.push(format!("High turnover in: {}", hot.join(", ")));
    }
    insights
}

/// `GET /analytics/departments` over active employees, largest first.
pub fn departments(employees: &[Value], now: DateTime<Utc>) -> Value {
    struct Dept<'a> {
        description: &'a str,
        salaries: Vec<f64>,
        tenures: Vec<f64>,
        levels: BTreeMap<String, u64>,
    }

    let mut groups: BTreeMap<String, Dept> = BTreeMap::new();
    for e in employees.iter().filter(|e| status(e) == "active") {
        let dept = groups.entry(department_name(e)).or_insert_with(|| Dept {
            description: department_description(e),
            salaries: vec![],
            tenures: vec![],
            levels: BTreeMap::new(),
        });
        dept.salaries.push(salary(e));
        dept.tenures.push(tenure_months(e, now) as f64);
        let level = match text_at(e, "employment.position.level") {
            "" => "unspecified",
            l => l,
        };
        *dept.levels.entry(level.to_string()).or_default() += 1;
    }

    let mut rows: Vec<Value> = groups
        .into_iter()
        .map(|(name, d)| {
            json!({
                "name": name,
                "description": d.description,
                "employeeCount": d.salaries.len(),
                "avgSalary": mean(&d.salaries).round() as i64,
                "levels": d.levels,
                "avgTenure": mean(&d.tenures).round() as i64,
            })
        })
        .collect();
    rows.sort_by(|a, b| b["employeeCount"].as_u64().cmp(&a["employeeCount"].as_u64()));

    let sizes: Vec<f64> = rows.iter().filter_map(|r| r["employeeCount"].as_f64()).collect();
    let largest = rows.first().cloned().unwrap_or_else(|| json!({"employeeCount": 0}));

    json!({
        "summary": {
            "totalDepartments": rows.len(),
            "largestDepartment": largest,
            "avgDepartmentSize": mean(&sizes).round() as i64,
        },
        "departments": rows,
    })
}

/// `GET /analytics/performance` over active employees.
pub fn performance(employees: &[Value]) -> Value {
    let active: Vec<&Value> = employees.iter().filter(|e| status(e) == "active").collect();
    let rated: Vec<(&Value, f64)> = active.iter().filter_map(|e| rating(e).map(|r| (*e, r))).collect();
    let ratings: Vec<f64> = rated.iter().map(|(_, r)| *r).collect();

    let mut by_rating: Map<String, Value> = (1..=5).map(|r| (r.to_string(), Value::from(0u64))).collect();
    for r in &ratings {
        let bucket = (r.floor() as i64).to_string();
        let next = by_rating.get(&bucket).and_then(Value::as_u64).unwrap_or(0) + 1;
        by_rating.insert(bucket, Value::from(next));
    }

    let high = ratings.iter().filter(|r| **r >= 4.0).count();
    let low = ratings.iter().filter(|r| **r < 2.5).count();
    let outstanding = ratings.iter().filter(|r| **r >= 4.5).count();

    json!({
        "overview": {
            "totalEmployees": active.len(),
            "avgPerformanceScore": round2(mean(&ratings)),
            "highPerformers": high,
            "lowPerformers": low,
        },
        "distributions": {
            "byRating": by_rating,
            "byDepartment": rating_groups(&rated, |e| department_name(e)),
            "byLevel": rating_groups(&rated, |e| text_at(e, "employment.position.level").to_string()),
        },
        "trends": {
            "quarterly": latest_reviews(&active),
            "improvement": review_improvement(&active),
        },
        "recommendations": performance_recommendations(low, outstanding),
    })
}

fn rating_groups(rated: &[(&Value, f64)], key: impl Fn(&Value) -> String) -> Value {
    let mut groups: BTreeMap<String, (u64, f64)> = BTreeMap::new();
    for (e, r) in rated {
        let entry = groups.entry(key(e)).or_default();
        entry.0 += 1;
        entry.1 += r;
    }
    let map: Map<String, Value> = groups
        .into_iter()
        .map(|(k, (total, sum))| {
            (k, json!({"total": total, "sum": sum, "average": round2(sum / total as f64)}))
        })
        .collect();
    Value::Object(map)
}

fn reviews(employee: &Value) -> &[Value] {
    super::array_at(employee, "performance.reviews")
}

fn latest_reviews(employees: &[&Value]) -> Vec<Value> {
    employees
        .iter()
        .filter_map(|e| reviews(e).last())
        .map(|review| {
            json!({
                "quarter": review.get("reviewPeriod").cloned().unwrap_or(Value::Null),
                "avgRating": number_at(review, "overallRating"),
            })
        })
        .collect()
}

fn review_improvement(employees: &[&Value]) -> Vec<Value> {
    employees
        .iter()
        .filter_map(|e| {
            let list = reviews(e);
            if list.len() < 2 {
                return None;
            }
            let delta = number_at(&list[list.len() - 1], "overallRating") - number_at(&list[list.len() - 2], "overallRating");
            (delta != 0.0).then(|| json!({"employeeId": text_at(e, "employeeId"), "improvement": round2(delta)}))
        })
        .collect()
}

pub fn performance_recommendations(low: usize, outstanding: usize) -> Vec<String> {
    let mut out = Vec::new();
    if low > 0 {
        out.push(format!("{} employees need performance improvement plans", low));
    }
    if outstanding > 0 {
        out.push(format!("{} high performers eligible for advancement", outstanding));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn employee(id: &str, status: &str, dept: Value, salary: f64, start: &str) -> Value {
        json!({
            "employeeId": id,
            "firstName": "First",
            "lastName": id,
            "status": status,
            "employment": {"department": dept, "startDate": start, "position": {"title": "Engineer", "level": "mid"}},
            "compensation": {"salary": {"amount": salary}},
            "createdAt": "2024-06-01T00:00:00.000Z",
            "audit": {"lastModified": format!("2024-06-0{}T00:00:00.000Z", &id[id.len() - 1..])},
        })
    }

    fn staff() -> Vec<Value> {
        vec![
            employee("EMP000001", "active", json!("Research"), 100_000.0, "2020-01-01"),
            employee("EMP000002", "active", json!({"name": "Research", "description": "R&D"}), 80_000.0, "2024-03-01"),
            employee("EMP000003", "active", json!("Sales"), 60_000.0, "2023-06-01"),
            employee("EMP000004", "terminated", json!("Sales"), 50_000.0, "2022-01-01"),
        ]
    }

    #[test]
    fn department_name_accepts_both_shapes() {
        assert_eq!(department_name(&json!({"employment": {"department": "Ops"}})), "Ops");
        assert_eq!(department_name(&json!({"employment": {"department": {"name": "Ops"}}})), "Ops");
        assert_eq!(department_name(&json!({})), "Unassigned");
    }

    #[test]
    fn dashboard_overview() {
        let data = dashboard(&staff(), "6months", now());
        assert_eq!(data["overview"]["totalEmployees"], 4);
        assert_eq!(data["overview"]["activeEmployees"], 3);
        assert_eq!(data["overview"]["turnoverRate"], 25);
        assert_eq!(data["overview"]["avgSalary"]["amount"], 80_000);
        assert_eq!(data["departments"]["Research"], 2);
        assert_eq!(data["quickStats"]["topDepartment"], "Research");
        assert_eq!(data["trends"]["newHires"], 1);
        assert_eq!(data["recentActivity"][0]["employeeId"], "EMP000004");
    }

    #[test]
    fn tenure_buckets() {
        let buckets = tenure_distribution(&staff(), now());
        assert_eq!(buckets, json!({"0-1": 1, "1-3": 2, "3-5": 1, "5+": 0}));
    }

    #[test]
    fn growth_rate_compares_last_two_months() {
        let monthly = vec![json!({"month": "2024-05", "count": 4}), json!({"month": "2024-06", "count": 6})];
        assert_eq!(growth_rate(&monthly), 50);
        assert_eq!(growth_rate(&monthly[..1]), 0);
    }

    #[test]
    fn turnover_reasons_and_insights() {
        let mut people = staff();
        people[3]["employment"]["terminationReason"] = json!("voluntary");
        let data = turnover(&people, "1year", now());
        assert_eq!(data["overview"]["totalTerminations"], 1);
        assert_eq!(data["overview"]["voluntaryTurnover"], 1);
        assert_eq!(data["overview"]["turnoverRate"], 25.0);
        assert_eq!(data["reasons"]["voluntary"], 1);
        assert_eq!(data["insights"], json!(["High turnover rate detected - consider retention strategies"]));
    }

    #[test]
    fn departments_sorted_by_size() {
        let data = departments(&staff(), now());
        assert_eq!(data["departments"][0]["name"], "Research");
        assert_eq!(data["departments"][0]["avgSalary"], 90_000);
        assert_eq!(data["summary"]["totalDepartments"], 2);
        assert_eq!(data["summary"]["avgDepartmentSize"], 2);
    }

    #[test]
    fn performance_buckets_and_recommendations() {
        let mut people = staff();
        people[0]["performance"] = json!({"currentRating": 4.6});
        people[1]["performance"] = json!({"currentRating": 2.0, "reviews": [
            {"reviewPeriod": "2024-Q1", "overallRating": 3.0},
            {"reviewPeriod": "2024-Q2", "overallRating": 2.0}
        ]});
        let data = performance(&people);
        assert_eq!(data["overview"]["avgPerformanceScore"], 3.3);
        assert_eq!(data["distributions"]["byRating"]["4"], 1);
        assert_eq!(data["distributions"]["byRating"]["2"], 1);
        assert_eq!(data["trends"]["improvement"][0]["improvement"], -1.0);
        assert_eq!(
            data["recommendations"],
            json!(["1 employees need performance improvement plans", "1 high performers eligible for advancement"])
        );
    }
}
