use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde_json::{json, Value};

use super::{array_at, count_by, mean, monthly_counts, number_at, range_start, round2, sparse_monthly};
use crate::services::dates::value_datetime;
use crate::services::documents::{get_path, text_at};

/// Member groups embedded under `team`.
pub const MEMBER_GROUPS: &[(&str, &str)] = &[
    ("coInvestigator", "coInvestigators"),
    ("student", "students"),
    ("externalCollaborator", "externalCollaborators"),
];

pub fn group_for(member_type: &str) -> Option<&'static str> {
    MEMBER_GROUPS.iter().find(|(t, _)| *t == member_type).map(|(_, g)| *g)
}

/// PI plus every embedded member.
pub fn team_size(project: &Value) -> usize {
    1 + MEMBER_GROUPS
        .iter()
        .map(|(_, group)| array_at(project, &format!("team.{}", group)).len())
        .sum::<usize>()
}

/// Percent of milestones completed, rounded.
pub fn progress(project: &Value) -> i64 {
    let milestones = array_at(project, "timeline.milestones");
    if milestones.is_empty() {
        return 0;
    }
    let done = milestones.iter().filter(|m| text_at(m, "status") == "completed").count();
    ((done as f64 / milestones.len() as f64) * 100.0).round() as i64
}

pub fn is_overdue(project: &Value, now: DateTime<Utc>) -> bool {
    if text_at(project, "status") == "completed" {
        return false;
    }
    value_datetime(get_path(project, "timeline.expectedEndDate")).map_or(false, |end| now > end)
}

/// Days from start to the actual (or expected) end, rounded up.
pub fn duration_days(project: &Value) -> Option<i64> {
    let start = value_datetime(get_path(project, "timeline.startDate"))?;
    let expected = value_datetime(get_path(project, "timeline.expectedEndDate"))?;
    let end = value_datetime(get_path(project, "timeline.actualEndDate")).unwrap_or(expected);
    let secs = (end - start).num_seconds();
    Some((secs as f64 / 86_400.0).ceil() as i64)
}

fn money(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or_default()
}

fn budget(project: &Value) -> Decimal {
    money(number_at(project, "funding.totalBudget.amount"))
}

fn expenses(project: &Value) -> Decimal {
    array_at(project, "funding.expenses").iter().map(|e| money(number_at(e, "amount"))).sum()
}

fn to_number(amount: Decimal) -> Value {
    json!(amount.round_dp(2).to_f64().unwrap_or(0.0))
}

/// Expenses as a percentage of the total budget.
pub fn budget_utilization(project: &Value) -> f64 {
    let total = budget(project);
    if total.is_zero() {
        return 0.0;
    }
    (expenses(project) / total * Decimal::ONE_HUNDRED).to_f64().unwrap_or(0.0)
}

pub fn citation_count(publication: &Value) -> u64 {
    get_path(publication, "metrics.citationCount")
        .or_else(|| get_path(publication, "citationCount"))
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

/// PI plus co-investigators and students whose status is active.
pub fn active_member_count(project: &Value) -> usize {
    1 + ["coInvestigators", "students"]
        .iter()
        .map(|g| {
            array_at(project, &format!("team.{}", g))
                .iter()
                .filter(|m| text_at(m, "status") == "active")
                .count()
        })
        .sum::<usize>()
}

/// `GET /projects/:projectId/team/stats`.
pub fn team_stats(project: &Value) -> Value {
    let co_investigators = array_at(project, "team.coInvestigators");
    let students = array_at(project, "team.students");
    let externals = array_at(project, "team.externalCollaborators");

    let mut institutions: BTreeMap<String, u64> = BTreeMap::new();
    let pi_institution = text_at(project, "team.principalInvestigator.affiliationInstitution");
    let member_institutions = co_investigators
        .iter()
        .map(|c| text_at(c, "affiliationInstitution"))
        .chain(externals.iter().map(|e| text_at(e, "institution")));
    for institution in std::iter::once(pi_institution).chain(member_institutions) {
        if !institution.is_empty() {
            *institutions.entry(institution.to_string()).or_default() += 1;
        }
    }

    let mut expertise: Vec<String> = Vec::new();
    for member in co_investigators.iter().chain(externals) {
        for area in array_at(member, "expertise").iter().filter_map(Value::as_str) {
            if !expertise.iter().any(|e| e == area) {
                expertise.push(area.to_string());
            }
        }
    }

    let joined: Vec<DateTime<Utc>> = co_investigators.iter().filter_map(|c| value_datetime(c.get("joinedDate"))).collect();
    let inactive = co_investigators.iter().filter(|c| text_at(c, "status") == "inactive").count()
        + students.iter().filter(|s| text_at(s, "status") != "active").count();

    json!({
        "teamComposition": {
            "principalInvestigator": 1,
            "coInvestigators": co_investigators.len(),
            "students": students.len(),
            "externalCollaborators": externals.len(),
            "total": team_size(project),
        },
        "statusDistribution": {"active": active_member_count(project), "inactive": inactive},
        "studentLevels": count_by(students, "level", "unspecified"),
        "institutionDistribution": institutions,
        "expertiseAreas": expertise,
        "joinDates": {
            "newest": joined.iter().max().map(|d| d.to_rfc3339()),
            "oldest": joined.iter().min().map(|d| d.to_rfc3339()),
        },
    })
}

/// `summary` block of `GET /projects/:projectId/publications`.
pub fn publication_summary(publications: &[Value]) -> Value {
    json!({
        "totalPublications": publications.len(),
        "byStatus": count_by(publications, "status", "draft"),
        "byType": count_by(publications, "publicationType", "unspecified"),
        "totalCitations": publications.iter().map(citation_count).sum::<u64>(),
    })
}

/// `GET /projects/:projectId/health`.
pub fn project_health(project: &Value, now: DateTime<Utc>) -> Value {
    let health = |key: &str| get_path(project, &format!("health.{}", key)).cloned().unwrap_or_else(|| json!("green"));
    let milestones = array_at(project, "timeline.milestones");
    let mut upcoming: Vec<(DateTime<Utc>, &Value)> = milestones
        .iter()
        .filter(|m| text_at(m, "status") != "completed")
        .filter_map(|m| value_datetime(m.get("targetDate")).filter(|d| *d > now).map(|d| (d, m)))
        .collect();
    upcoming.sort_by_key(|(d, _)| *d);

    json!({
        "projectId": text_at(project, "projectId"),
        "overallHealth": health("overallHealth"),
        "budgetHealth": health("budgetHealth"),
        "timelineHealth": health("timelineHealth"),
        "teamHealth": health("teamHealth"),
        "lastHealthCheck": get_path(project, "health.lastHealthCheck").cloned().unwrap_or(Value::Null),
        "budgetUtilization": round2(budget_utilization(project)),
        "progress": progress(project),
        "isOverdue": is_overdue(project, now),
        "teamSize": team_size(project),
        "durationInDays": duration_days(project),
        "publicationsCount": array_at(project, "publications").len(),
        "activeMilestones": milestones.iter().filter(|m| text_at(m, "status") == "in_progress").count(),
        "upcomingDeadlines": upcoming.into_iter().take(5).map(|(_, m)| m.clone()).collect::<Vec<_>>(),
    })
}

/// Projects where `user_id` is PI, co-investigator or student.
pub fn involves(project: &Value, user_id: &str) -> bool {
    text_at(project, "team.principalInvestigator.userId") == user_id
        || ["coInvestigators", "students"]
            .iter()
            .any(|g| array_at(project, &format!("team.{}", g)).iter().any(|m| text_at(m, "userId") == user_id))
}

fn recent_projects(projects: &[&Value]) -> Vec<Value> {
    let mut touched: Vec<(DateTime<Utc>, &Value)> = projects
        .iter()
        .filter_map(|p| value_datetime(get_path(p, "audit.lastModified")).map(|t| (t, *p)))
        .collect();
    touched.sort_by(|a, b| b.0.cmp(&a.0));
    touched
        .into_iter()
        .take(10)
        .map(|(_, p)| {
            json!({
                "projectId": text_at(p, "projectId"),
                "title": text_at(p, "title"),
                "lastActivity": text_at(p, "audit.lastModified"),
                "status": text_at(p, "status"),
            })
        })
        .collect()
}

fn publication_date(publication: &Value) -> Option<DateTime<Utc>> {
    value_datetime(get_path(publication, "dates.published")).or_else(|| value_datetime(publication.get("createdAt")))
}

/// `GET /analytics/dashboard` over the caller's projects.
pub fn dashboard(projects: &[Value], user_id: &str, now: DateTime<Utc>) -> Value {
    let mine: Vec<&Value> = projects.iter().filter(|p| involves(p, user_id)).collect();
    let with_status = |s: &str| mine.iter().filter(|p| text_at(p, "status") == s).count();
    let total_funding: Decimal = mine.iter().map(|p| budget(p)).sum();
    let progresses: Vec<f64> = mine.iter().map(|p| progress(p) as f64).collect();
    let sizes: Vec<f64> = mine.iter().map(|p| team_size(p) as f64).collect();

    let mut health = BTreeMap::new();
    for p in &mine {
        let h = match text_at(p, "health.overallHealth") {
            "" => "green",
            h => h,
        };
        *health.entry(h.to_string()).or_insert(0u64) += 1;
    }

    let month_ago = now - Duration::days(30);
    let year_start = Utc.with_ymd_and_hms(now.year(), 1, 1, 0, 0, 0).single().unwrap_or(now);
    let publications_this_year: usize = mine
        .iter()
        .map(|p| {
            array_at(p, "publications")
                .iter()
                .filter(|publication| publication_date(publication).map_or(false, |d| d > year_start))
                .count()
        })
        .sum();

    json!({
        "overview": {
            "totalProjects": mine.len(),
            "activeProjects": with_status("active"),
            "completedProjects": with_status("completed"),
            "overdueProjects": mine.iter().filter(|p| is_overdue(p, now)).count(),
            "totalPublications": mine.iter().map(|p| array_at(p, "publications").len()).sum::<usize>(),
            "totalFunding": {"amount": to_number(total_funding), "currency": "USD"},
            "avgProgress": mean(&progresses).round() as i64,
        },
        "health": health,
        "recentActivity": recent_projects(&mine),
        "quickStats": {
            "projectsThisMonth": mine
                .iter()
                .filter(|p| value_datetime(p.get("createdAt")).map_or(false, |d| d > month_ago))
                .count(),
            "publicationsThisYear": publications_this_year,
            "avgTeamSize": mean(&sizes).round() as i64,
        },
    })
}

/// `GET /analytics/projects/overview` over projects created within `timeRange`.
pub fn projects_overview(projects: &[Value], time_range: &str, now: DateTime<Utc>) -> Value {
    let (time_range, start) = range_start(now, time_range, "6months");
    let recent: Vec<Value> = projects
        .iter()
        .filter(|p| value_datetime(p.get("createdAt")).map_or(false, |d| d >= start))
        .cloned()
        .collect();

    let avg = |f: &dyn Fn(&Value) -> f64| {
        let values: Vec<f64> = recent.iter().map(f).collect();
        mean(&values).round() as i64
    };
    let created = recent.iter().filter_map(|p| value_datetime(p.get("createdAt")));

    json!({
        "totalProjects": recent.len(),
        "timeRange": time_range,
        "distributions": {
            "status": count_by(&recent, "status", "planning"),
            "researchType": count_by(&recent, "classification.researchType", "unspecified"),
            "fieldOfStudy": count_by(&recent, "classification.fieldOfStudy.primary", "unspecified"),
        },
        "trends": {"monthly": monthly_counts(start, now, created)},
        "averages": {
            "avgDuration": avg(&|p| duration_days(p).unwrap_or(0) as f64),
            "avgBudget": avg(&|p| number_at(p, "funding.totalBudget.amount")),
            "avgTeamSize": avg(&|p| team_size(p) as f64),
            "avgProgress": avg(&|p| progress(p) as f64),
        },
    })
}

/// Every embedded publication tagged with its project.
pub fn all_publications(projects: &[Value]) -> Vec<Value> {
    let mut out = Vec::new();
    for project in projects {
        for publication in array_at(project, "publications") {
            let mut tagged = publication.clone();
            if let Value::Object(map) = &mut tagged {
                map.insert("projectId".into(), json!(text_at(project, "projectId")));
                map.insert("projectTitle".into(), json!(text_at(project, "title")));
            }
            out.push(tagged);
        }
    }
    out
}

/// Largest h such that h publications have at least h citations each.
pub fn h_index(citations: &[u64]) -> u64 {
    let mut sorted = citations.to_vec();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    sorted
        .iter()
        .enumerate()
        .take_while(|(i, c)| **c >= (*i as u64) + 1)
        .count() as u64
}

/// `GET /analytics/publications/metrics`.
pub fn publication_metrics(projects: &[Value]) -> Value {
    let mut publications = all_publications(projects);
    let citations: Vec<u64> = publications.iter().map(citation_count).collect();
    let total_citations: u64 = citations.iter().sum();
    let avg_citations = if publications.is_empty() {
        0
    } else {
        (total_citations as f64 / publications.len() as f64).round() as i64
    };

    let trend = sparse_monthly(publications.iter().filter_map(publication_date).map(|d| (d, 1.0)), "count");

    let mut venues: BTreeMap<String, Value> = BTreeMap::new();
    for publication in &publications {
        let name = text_at(publication, "venue.name");
        if name.is_empty() {
            continue;
        }
        let venue = venues.entry(name.to_string()).or_insert_with(|| {
            json!({
                "name": name,
                "type": get_path(publication, "venue.type").cloned().unwrap_or(Value::Null),
                "publications": 0,
                "totalCitations": 0,
                "impactFactor": get_path(publication, "venue.impactFactor").cloned().unwrap_or(Value::Null),
            })
        });
        venue["publications"] = json!(venue["publications"].as_u64().unwrap_or(0) + 1);
        venue["totalCitations"] = json!(venue["totalCitations"].as_u64().unwrap_or(0) + citation_count(publication));
    }
    let mut venues: Vec<Value> = venues.into_values().collect();
    venues.sort_by(|a, b| b["publications"].as_u64().cmp(&a["publications"].as_u64()));
    venues.truncate(20);

    let mut recent: Vec<(DateTime<Utc>, &Value)> = publications
        .iter()
        .filter_map(|p| value_datetime(get_path(p, "dates.published")).map(|d| (d, p)))
        .collect();
    recent.sort_by(|a, b| b.0.cmp(&a.0));
    let recent: Vec<Value> = recent
        .into_iter()
        .take(10)
        .map(|(_, p)| {
            json!({
                "title": text_at(p, "title"),
                "publishedDate": text_at(p, "dates.published"),
                "venue": text_at(p, "venue.name"),
                "projectTitle": text_at(p, "projectTitle"),
            })
        })
        .collect();

    let distributions = json!({
        "type": count_by(&publications, "publicationType", "unspecified"),
        "status": count_by(&publications, "status", "draft"),
    });

    publications.sort_by(|a, b| citation_count(b).cmp(&citation_count(a)));
    let top_cited: Vec<Value> = publications
        .iter()
        .take(10)
        .map(|p| {
            json!({
                "title": text_at(p, "title"),
                "citations": citation_count(p),
                "projectTitle": text_at(p, "projectTitle"),
            })
        })
        .collect();

    json!({
        "totalPublications": publications.len(),
        "distributions": distributions,
        "trends": trend,
        "citations": {
            "totalCitations": total_citations,
            "avgCitations": avg_citations,
            "hIndex": h_index(&citations),
            "topCited": top_cited,
        },
        "venues": venues,
        "recent": recent,
    })
}

fn utilization_bucket(percent: f64) -> &'static str {
    if percent < 25.0 {
        "0-25%"
    } else if percent < 50.0 {
        "25-50%"
    } else if percent < 75.0 {
        "50-75%"
    } else if percent < 100.0 {
        "75-100%"
    } else {
        "Over 100%"
    }
}

/// `GET /analytics/funding/summary` over projects with a positive budget.
/// Amounts are summed as decimals.
pub fn funding_summary(projects: &[Value]) -> Value {
    let funded: Vec<&Value> = projects.iter().filter(|p| budget(p) > Decimal::ZERO).collect();
    let total_funding: Decimal = funded.iter().map(|p| budget(p)).sum();
    let total_expenses: Decimal = funded.iter().map(|p| expenses(p)).sum();

    struct Source {
        total: Decimal,
        projects: u64,
        statuses: BTreeMap<String, u64>,
    }
    let mut sources: BTreeMap<String, Source> = BTreeMap::new();
    let mut categories: BTreeMap<String, Decimal> = BTreeMap::new();
    let mut utilization: BTreeMap<&'static str, u64> = BTreeMap::new();
    let mut by_month = Vec::new();

    for project in &funded {
        for source in array_at(project, "funding.sources") {
            let entry = sources.entry(text_at(source, "organization").to_string()).or_insert_with(|| Source {
                total: Decimal::ZERO,
                projects: 0,
                statuses: BTreeMap::new(),
            });
            let amount = money(number_at(source, "amount"));
            entry.total += amount;
            entry.projects += 1;
            let status = match text_at(source, "status") {
                "" => "applied",
                s => s,
            };
            *entry.statuses.entry(status.to_string()).or_default() += 1;
            if let Some(start) = value_datetime(source.get("startDate")) {
                by_month.push((start, amount.to_f64().unwrap_or(0.0)));
            }
        }
        for expense in array_at(project, "funding.expenses") {
            let category = match text_at(expense, "category") {
                "" => "other",
                c => c,
            };
            *categories.entry(category.to_string()).or_default() += money(number_at(expense, "amount"));
        }
        *utilization.entry(utilization_bucket(budget_utilization(project))).or_default() += 1;
    }

    let mut source_rows: Vec<(Decimal, Value)> = sources
        .into_iter()
        .map(|(organization, s)| {
            let row = json!({
                "organization": organization,
                "totalAmount": to_number(s.total),
                "projectCount": s.projects,
                "statuses": s.statuses,
            });
            (s.total, row)
        })
        .collect();
    source_rows.sort_by(|a, b| b.0.cmp(&a.0));

    let utilization_rate = if total_funding.is_zero() {
        0
    } else {
        (total_expenses / total_funding * Decimal::ONE_HUNDRED).round().to_i64().unwrap_or(0)
    };

    json!({
        "overview": {
            "totalFunding": to_number(total_funding),
            "totalExpenses": to_number(total_expenses),
            "remainingBudget": to_number(total_funding - total_expenses),
            "utilizationRate": utilization_rate,
            "projectsWithFunding": funded.len(),
        },
        "sources": source_rows.into_iter().map(|(_, row)| row).collect::<Vec<_>>(),
        "expenses": categories.into_iter().map(|(k, v)| (k, to_number(v))).collect::<serde_json::Map<_, _>>(),
        "utilization": utilization,
        "trends": sparse_monthly(by_month, "amount"),
    })
}

/// `GET /analytics/collaboration/network`: PI and co-investigator links.
pub fn collaboration_network(projects: &[Value]) -> Value {
    struct Researcher {
        name: String,
        email: String,
        role: &'static str,
        projects: u64,
        collaborators: BTreeSet<String>,
    }

    let mut researchers: BTreeMap<String, Researcher> = BTreeMap::new();
    let mut institutions: BTreeMap<String, u64> = BTreeMap::new();
    let mut clusters = Vec::new();

    for project in projects {
        let pi = get_path(project, "team.principalInvestigator").cloned().unwrap_or(Value::Null);
        let pi_id = text_at(&pi, "userId").to_string();
        if pi_id.is_empty() {
            continue;
        }
        researchers
            .entry(pi_id.clone())
            .or_insert_with(|| Researcher {
                name: text_at(&pi, "name").to_string(),
                email: text_at(&pi, "email").to_string(),
                role: "PI",
                projects: 0,
                collaborators: BTreeSet::new(),
            })
            .projects += 1;

        let institution = match text_at(&pi, "affiliationInstitution") {
            "" => text_at(&pi, "institution"),
            i => i,
        };
        if !institution.is_empty() {
            *institutions.entry(institution.to_string()).or_default() += 1;
        }

        let mut members = BTreeSet::from([pi_id.clone()]);
        for co in array_at(project, "team.coInvestigators") {
            let co_id = text_at(co, "userId").to_string();
            if co_id.is_empty() {
                continue;
            }
            members.insert(co_id.clone());
            if let Some(pi_entry) = researchers.get_mut(&pi_id) {
                pi_entry.collaborators.insert(co_id.clone());
            }
            let entry = researchers.entry(co_id).or_insert_with(|| Researcher {
                name: text_at(co, "name").to_string(),
                email: text_at(co, "email").to_string(),
                role: "Co-Investigator",
                projects: 0,
                collaborators: BTreeSet::new(),
            });
            entry.projects += 1;
            entry.collaborators.insert(pi_id.clone());
        }

        clusters.push(json!({
            "leadInstitution": institution,
            "projects": [text_at(project, "projectId")],
            "researcherCount": members.len(),
            "totalFunding": number_at(project, "funding.totalBudget.amount"),
        }));
    }

    let n = researchers.len();
    let links: usize = researchers.values().map(|r| r.collaborators.len()).sum();
    let density = if n <= 1 {
        0.0
    } else {
        round2((links as f64 / 2.0) / (n as f64 * (n as f64 - 1.0) / 2.0))
    };

    let mut top: Vec<Value> = researchers
        .iter()
        .map(|(id, r)| {
            json!({
                "id": id,
                "name": r.name,
                "email": r.email,
                "role": r.role,
                "projectCount": r.projects,
                "collaboratorCount": r.collaborators.len(),
            })
        })
        .collect();
    top.sort_by(|a, b| b["collaboratorCount"].as_u64().cmp(&a["collaboratorCount"].as_u64()));
    top.truncate(10);

    let mut institution_rows: Vec<Value> = institutions
        .into_iter()
        .map(|(name, count)| json!({"institution": name, "projectCount": count}))
        .collect();
    institution_rows.sort_by(|a, b| b["projectCount"].as_u64().cmp(&a["projectCount"].as_u64()));
    institution_rows.truncate(15);

    clusters.sort_by(|a, b| {
        b["totalFunding"]
            .as_f64()
            .partial_cmp(&a["totalFunding"].as_f64())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    clusters.truncate(10);

    let avg_collaborators = if n == 0 { 0 } else { (links as f64 / n as f64).round() as i64 };

    json!({
        "overview": {
            "totalResearchers": n,
            "totalInstitutions": institution_rows.len(),
            "avgCollaboratorsPerResearcher": avg_collaborators,
        },
        "topCollaborators": top,
        "institutions": institution_rows,
        "networkMetrics": {"density": density, "clusters": clusters},
    })
}
