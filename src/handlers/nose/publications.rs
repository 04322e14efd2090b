// handlers/nose/publications.rs - /api/v1/nose/projects/:projectId/publications handlers
// plus cross-project publication search and export

use std::collections::BTreeSet;

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use chrono::{Datelike, Utc};
use serde_json::{json, Value};

use super::{load_project, update_project, PROJECTS};
use crate::analytics::array_at;
use crate::analytics::nose::{all_publications, citation_count, publication_summary};
use crate::error::ApiError;
use crate::export::{self, bibtex, csv, Download, PUBLICATION_COLUMNS};
use crate::filter::{Filter, FilterData};
use crate::handlers::utils::{export_format, fetch_all, position_by, search_text};
use crate::middleware::{ApiResponse, ApiResult, AuthUser, JsonBody};
use crate::services::documents::{apply_update, get_path, get_path_mut, set_default, set_path, stamp_updated, text_at, timestamp};
use crate::services::ids::object_id;
use crate::services::query::{bracket_filters, non_empty, FilterBuilder, PageRequest, QueryParams};
use crate::services::search::SEARCH_LIMIT;
use crate::validation::nose as validate;
use crate::AppState;

const PUBLICATION_NOT_FOUND: &str = "Publication not found";

/// Checks author ordering and the corresponding-author requirement, then
/// sorts the authors by `order`.
fn normalize_authors(authors: &mut Vec<Value>) -> Result<(), ApiError> {
    let orders: Vec<i64> = authors.iter().filter_map(|a| a.get("order").and_then(Value::as_i64)).collect();
    let unique: BTreeSet<i64> = orders.iter().copied().collect();
    if unique.len() != orders.len() {
        return Err(ApiError::bad_request("Author order numbers must be unique"));
    }
    if !authors.iter().any(|a| a.get("isCorresponding").and_then(Value::as_bool) == Some(true)) {
        return Err(ApiError::bad_request("At least one corresponding author is required"));
    }
    authors.sort_by_key(|a| a.get("order").and_then(Value::as_i64).unwrap_or(i64::MAX));
    Ok(())
}

/// Moves a top-level `citationCount` under `metrics`, stamping the update.
fn record_citations(publication: &mut Value, stamp: Option<&str>) {
    let Some(count) = publication.as_object_mut().and_then(|m| m.remove("citationCount")) else {
        return;
    };
    set_path(publication, "metrics.citationCount", count);
    if let Some(at) = stamp {
        set_path(publication, "metrics.lastCitationUpdate", json!(at));
    }
}

fn publications_mut(project: &mut Value) -> Result<&mut Vec<Value>, ApiError> {
    if !matches!(project.get("publications"), Some(Value::Array(_))) {
        set_path(project, "publications", json!([]));
    }
    match get_path_mut(project, "publications") {
        Some(Value::Array(items)) => Ok(items),
        _ => Err(ApiError::internal_server_error("Project publications are malformed")),
    }
}

fn sort_path(field: &str) -> &str {
    match field {
        "publishedDate" => "dates.published",
        "citationCount" => "metrics.citationCount",
        other => other,
    }
}

fn year_bound(params: &QueryParams, key: &str) -> Option<i64> {
    non_empty(params, key).and_then(|y| y.parse().ok())
}

fn list_filter(params: &QueryParams) -> Value {
    let mut builder = FilterBuilder::new()
        .eq("status", non_empty(params, "status"))
        .eq("publicationType", non_empty(params, "publicationType"))
        .eq("venue.type", non_empty(params, "venueType"));
    if let Some(min) = non_empty(params, "minCitations").and_then(|m| m.parse::<u64>().ok()) {
        builder = builder.condition("metrics.citationCount", json!({"$gte": min}));
    }
    let mut published = serde_json::Map::new();
    if let Some(from) = year_bound(params, "yearFrom") {
        published.insert("$gte".into(), json!(format!("{:04}-01-01", from)));
    }
    if let Some(to) = year_bound(params, "yearTo") {
        published.insert("$lt".into(), json!(format!("{:04}-01-01", to + 1)));
    }
    if !published.is_empty() {
        builder = builder.condition("dates.published", Value::Object(published));
    }
    builder.build()
}

/// GET /api/v1/nose/projects/:projectId/publications
pub async fn list(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Value> {
    validate::publication_query(&project_id, &params)?;
    let page = PageRequest::from_params(&params)?;
    let project = load_project(&state, &project_id).await?;
    let publications = array_at(&project, "publications");

    let where_clause = list_filter(&params);
    let mut matching = Filter::new("publications")?;
    matching.where_clause(&where_clause)?;
    let total = publications.iter().filter(|p| matching.matches(p)).count() as u64;

    let order = json!({ sort_path(&page.sort_by): if page.descending { -1 } else { 1 } });
    let data = FilterData::new(where_clause).order(order).limit(page.limit).offset(page.offset());
    let window = Filter::from_data("publications", &data)?.apply(publications.iter().cloned());

    Ok(ApiResponse::success(
        "Publications retrieved successfully",
        json!({
            "publications": window,
            "pagination": page.pagination(total),
            "summary": publication_summary(publications),
        }),
    ))
}

/// GET /api/v1/nose/projects/:projectId/publications/:publicationId
pub async fn get(
    State(state): State<AppState>,
    Path((project_id, publication_id)): Path<(String, String)>,
) -> ApiResult<Value> {
    validate::validate_project_id(&project_id)?;
    let project = load_project(&state, &project_id).await?;
    let publications = array_at(&project, "publications");
    let index = position_by(publications, "_id", &publication_id).ok_or_else(|| ApiError::not_found(PUBLICATION_NOT_FOUND))?;

    let mut publication = publications[index].clone();
    let citations = citation_count(&publication);
    let last_update = get_path(&publication, "metrics.lastCitationUpdate").cloned().unwrap_or(Value::Null);
    set_path(
        &mut publication,
        "projectInfo",
        json!({
            "projectId": project_id,
            "title": text_at(&project, "title"),
            "principalInvestigator": get_path(&project, "team.principalInvestigator").cloned().unwrap_or(Value::Null),
        }),
    );
    set_path(&mut publication, "metrics", json!({"citationCount": citations, "lastCitationUpdate": last_update}));

    Ok(ApiResponse::success("Publication retrieved successfully", publication))
}

/// POST /api/v1/nose/projects/:projectId/publications
pub async fn create(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(project_id): Path<String>,
    JsonBody(mut body): JsonBody,
) -> ApiResult<Value> {
    validate::create_publication(&project_id, &body)?;

    if let Some(Value::Array(authors)) = body.get_mut("authors") {
        normalize_authors(authors)?;
    }
    let now = Utc::now();
    record_citations(&mut body, None);
    set_default(&mut body, "metrics.citationCount", json!(0));
    set_default(&mut body, "status", json!("draft"));
    set_default(&mut body, "keywords", json!([]));
    set_path(&mut body, "_id", json!(object_id()));
    set_path(&mut body, "createdAt", json!(timestamp(now)));
    set_path(&mut body, "updatedAt", json!(timestamp(now)));

    update_project(&state, &project_id, |project| {
        publications_mut(project)?.push(body.clone());
        stamp_updated(project, &user.id, now);
        Ok(())
    })
    .await?;

    tracing::info!(
        project_id = %project_id,
        publication_id = text_at(&body, "_id"),
        title = text_at(&body, "title"),
        user_id = %user.id,
        "Publication created"
    );
    Ok(ApiResponse::created("Publication created successfully", body))
}

/// PUT /api/v1/nose/projects/:projectId/publications/:publicationId
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((project_id, publication_id)): Path<(String, String)>,
    JsonBody(mut body): JsonBody,
) -> ApiResult<Value> {
    validate::update_publication(&project_id, &publication_id, &body)?;

    if let Some(Value::Array(authors)) = body.get_mut("authors") {
        normalize_authors(authors)?;
    }
    let now = Utc::now();
    let stamp = timestamp(now);
    record_citations(&mut body, Some(&stamp));

    let updates = body.as_object().cloned().unwrap_or_default();
    let (_, (publication, updated_fields)) = update_project(&state, &project_id, |project| {
        let publications = publications_mut(project)?;
        let index = position_by(publications, "_id", &publication_id)
            .ok_or_else(|| ApiError::not_found(PUBLICATION_NOT_FOUND))?;
        let updated_fields = apply_update(&mut publications[index], &updates, &["_id"]);
        set_path(&mut publications[index], "updatedAt", json!(stamp));
        let publication = publications[index].clone();
        stamp_updated(project, &user.id, now);
        Ok((publication, updated_fields))
    })
    .await?;

    tracing::info!(project_id = %project_id, publication_id = %publication_id, ?updated_fields, "Publication updated");
    Ok(ApiResponse::success("Publication updated successfully", publication))
}

/// DELETE /api/v1/nose/projects/:projectId/publications/:publicationId
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((project_id, publication_id)): Path<(String, String)>,
) -> ApiResult<Value> {
    validate::validate_project_id(&project_id)?;

    let (_, (removed, remaining)) = update_project(&state, &project_id, |project| {
        let publications = publications_mut(project)?;
        let index = position_by(publications, "_id", &publication_id)
            .ok_or_else(|| ApiError::not_found(PUBLICATION_NOT_FOUND))?;
        let removed = publications.remove(index);
        let remaining = publications.len();
        stamp_updated(project, &user.id, Utc::now());
        Ok((removed, remaining))
    })
    .await?;

    tracing::info!(
        project_id = %project_id,
        publication_id = %publication_id,
        title = text_at(&removed, "title"),
        user_id = %user.id,
        "Publication deleted"
    );
    Ok(ApiResponse::success(
        "Publication deleted successfully",
        json!({"projectId": project_id, "publicationId": publication_id, "remainingPublications": remaining}),
    ))
}

fn mentions(publication: &Value, path: &str, needle: &str) -> bool {
    text_at(publication, path).to_lowercase().contains(needle)
}

/// Title hits first, then by citations.
fn search_matches(publications: Vec<Value>, q: &str, narrowing: &Filter) -> Vec<Value> {
    let needle = q.to_lowercase();
    let mut hits: Vec<(bool, u64, Value)> = publications
        .into_iter()
        .filter(|p| narrowing.matches(p))
        .filter(|p| ["title", "abstract", "venue.name"].iter().any(|f| mentions(p, f, &needle)))
        .map(|p| (mentions(&p, "title", &needle), citation_count(&p), p))
        .collect();
    hits.sort_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));
    hits.into_iter().map(|(_, _, p)| p).collect()
}

/// GET /api/v1/nose/search/publications
pub async fn search(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Vec<Value>> {
    let q = search_text(&params)?;
    validate::search_query(&params)?;

    let mut narrowing = Filter::new("publications")?;
    let filters = bracket_filters(&params);
    let mut where_clause = serde_json::Map::new();
    for (key, value) in filters {
        let path = if key == "venueType" { "venue.type".to_string() } else { key };
        where_clause.insert(path, value);
    }
    narrowing.where_clause(&Value::Object(where_clause))?;

    let projects = fetch_all(state.store.as_ref(), PROJECTS, json!({}), json!({"createdAt": -1})).await?;
    let matches = search_matches(all_publications(&projects), q, &narrowing);
    let count = matches.len();

    tracing::info!(user_id = %user.id, query = %q, count, "Publication search");
    let top: Vec<Value> = matches.into_iter().take(SEARCH_LIMIT).collect();
    Ok(ApiResponse::success("Publication search completed successfully", top).with("count", count))
}

/// GET /api/v1/nose/export/publications?format=json|csv|bibtex
pub async fn export(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<QueryParams>,
) -> Result<Response, ApiError> {
    validate::export_query(&params, validate::EXPORT_FORMATS)?;
    let format = export_format(&params);
    let now = Utc::now();

    let mut filter = bracket_filters(&params);
    if let Some(project_id) = non_empty(&params, "projectId") {
        filter.insert("projectId".into(), json!(project_id));
    }
    let projects = fetch_all(state.store.as_ref(), PROJECTS, Value::Object(filter), json!({"createdAt": -1})).await?;
    let publications = all_publications(&projects);

    tracing::info!(user_id = %user.id, format = %format, count = publications.len(), "Publications exported");

    match format.as_str() {
        "bibtex" => {
            let body = bibtex::document(&publications, now.year());
            Ok(Download::text(export::filename("publications", "bib", now), body).into_response())
        }
        "csv" => {
            let rows: Vec<Vec<String>> = publications.iter().map(export::publication_row).collect();
            let body = csv::quoted(PUBLICATION_COLUMNS, &rows);
            Ok(Download::csv(export::filename("publications", "csv", now), body).into_response())
        }
        _ => {
            let count = publications.len();
            Ok(ApiResponse::success("Publications exported successfully", publications)
                .with("exportDate", timestamp(now))
                .with("count", count)
                .into_response())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authors_need_unique_orders_and_a_corresponding_author() {
        let mut dup = vec![json!({"order": 1, "isCorresponding": true}), json!({"order": 1})];
        assert_eq!(normalize_authors(&mut dup).unwrap_err().message(), "Author order numbers must be unique");

        let mut none = vec![json!({"order": 1}), json!({"order": 2})];
        assert_eq!(
            normalize_authors(&mut none).unwrap_err().message(),
            "At least one corresponding author is required"
        );

        let mut ok = vec![json!({"order": 2, "name": "B"}), json!({"order": 1, "name": "A", "isCorresponding": true})];
        normalize_authors(&mut ok).unwrap();
        assert_eq!(ok[0]["name"], "A");
    }

    #[test]
    fn citation_count_moves_under_metrics() {
        let mut publication = json!({"title": "x", "citationCount": 12});
        record_citations(&mut publication, Some("2024-01-01T00:00:00.000Z"));
        assert_eq!(publication["metrics"]["citationCount"], 12);
        assert_eq!(publication["metrics"]["lastCitationUpdate"], "2024-01-01T00:00:00.000Z");
        assert!(publication.get("citationCount").is_none());
    }

    #[test]
    fn title_matches_rank_first() {
        let publications = vec![
            json!({"title": "Graph methods", "abstract": "We study protein folding", "metrics": {"citationCount": 90}}),
            json!({"title": "Protein folding at scale", "metrics": {"citationCount": 3}}),
            json!({"title": "Unrelated", "venue": {"name": "Journal of Protein Science"}, "metrics": {"citationCount": 40}}),
            json!({"title": "Nothing here"}),
        ];
        let everything = Filter::new("publications").unwrap();
        let ranked = search_matches(publications, "Protein", &everything);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0]["title"], "Protein folding at scale");
        assert_eq!(ranked[1]["title"], "Graph methods");
    }

    #[test]
    fn list_filter_years_and_citations() {
        let mut params = QueryParams::new();
        params.insert("yearFrom".into(), "2020".into());
        params.insert("yearTo".into(), "2021".into());
        params.insert("minCitations".into(), "5".into());
        let mut filter = Filter::new("publications").unwrap();
        filter.where_clause(&list_filter(&params)).unwrap();
        assert!(filter.matches(&json!({"dates": {"published": "2021-06-01"}, "metrics": {"citationCount": 7}})));
        assert!(!filter.matches(&json!({"dates": {"published": "2022-01-02"}, "metrics": {"citationCount": 7}})));
        assert!(!filter.matches(&json!({"dates": {"published": "2020-06-01"}, "metrics": {"citationCount": 1}})));
    }
}
