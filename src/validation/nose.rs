use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use super::{finish_all, query_value, Presence::*, Validator};
use crate::error::ApiError;
use crate::services::dates::parse_datetime;
use crate::services::ids::is_object_id;
use crate::services::query::QueryParams;

pub const PROJECT_STATUSES: &[&str] = &["planning", "active", "on_hold", "completed", "cancelled", "suspended"];
pub const RESEARCH_TYPES: &[&str] = &["basic", "applied", "experimental", "theoretical", "mixed"];
pub const HEALTH_STATUSES: &[&str] = &["green", "yellow", "red"];
pub const PROJECT_SORT_FIELDS: &[&str] = &["createdAt", "updatedAt", "title", "startDate", "expectedEndDate"];
pub const EXPENSE_CATEGORIES: &[&str] = &["personnel", "equipment", "supplies", "travel", "other"];
pub const MEMBER_TYPES: &[&str] = &["coInvestigator", "student", "externalCollaborator"];
pub const STUDENT_LEVELS: &[&str] = &["undergraduate", "graduate", "phd", "postdoc"];
pub const PUBLICATION_TYPES: &[&str] =
    &["journal_article", "conference_paper", "book_chapter", "book", "thesis", "report", "patent"];
pub const PUBLICATION_STATUSES: &[&str] =
    &["draft", "submitted", "under_review", "accepted", "published", "rejected"];
pub const VENUE_TYPES: &[&str] = &["journal", "conference", "workshop", "book", "repository"];
pub const PUBLICATION_SORT_FIELDS: &[&str] = &["createdAt", "updatedAt", "title", "publishedDate", "citationCount"];
pub const SUBJECTS: &[&str] = &[
    "computer_science", "mathematics", "physics", "chemistry", "biology", "medicine", "engineering",
    "psychology", "sociology", "economics", "philosophy", "literature", "history", "other",
];
pub const EXPORT_FORMATS: &[&str] = &["json", "csv", "bibtex"];

static PROJECT_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^PROJ[0-9]{6}$").expect("valid project id regex"));
static OBJECT_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-fA-F]{24}$").expect("valid object id regex"));
static DOI_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^10\.\d{4,}/[-._;()/:a-zA-Z0-9]+$").expect("valid doi regex"));
static ARXIV_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{4}\.\d{4,5}(v\d+)?$").expect("valid arxiv regex"));
static ISBN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(97[89])?\d{9}(\d|X)$").expect("valid isbn regex"));
static NUMERIC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+$").expect("valid numeric regex"));

const POSITIVE: f64 = f64::MAX;

fn project_id(params: &Value) -> Validator<'_> {
    let mut v = Validator::params(params);
    v.pattern("projectId", Required, &PROJECT_ID_RE, "Invalid project ID format");
    v
}

pub fn validate_project_id(id: &str) -> Result<(), ApiError> {
    let params = json!({ "projectId": id });
    project_id(&params).finish()
}

pub fn create_project(body: &Value) -> Result<(), ApiError> {
    let mut v = Validator::body(body);
    v.length("title", Required, 5, 200, "Project title must be between 5 and 200 characters")
        .length("description.abstract", Required, 50, 2000, "Project abstract must be between 50 and 2000 characters")
        .array("description.objectives", Required, 1, "At least one objective is required")
        .length("description.objectives.*", Required, 10, 500, "Each objective must be between 10 and 500 characters")
        .one_of("classification.researchType", Required, RESEARCH_TYPES, "Invalid research type")
        .length("classification.fieldOfStudy.primary", Required, 2, 100, "Primary field of study is required")
        .array("classification.subjects", Optional, 0, "Subjects must be an array")
        .one_of("classification.subjects.*", Optional, SUBJECTS, "Invalid subject")
        .array("classification.keywords", Optional, 0, "Keywords must be an array")
        .length("classification.keywords.*", Optional, 2, 50, "Each keyword must be between 2 and 50 characters")
        .iso_date("timeline.startDate", Required, "Valid start date is required")
        .iso_date("timeline.expectedEndDate", Required, "Valid expected end date is required")
        .array("timeline.milestones", Optional, 0, "Milestones must be an array")
        .length("timeline.milestones.*.title", Optional, 5, 100, "Milestone title must be between 5 and 100 characters")
        .iso_date("timeline.milestones.*.targetDate", Optional, "Valid milestone target date is required")
        .number("funding.totalBudget.amount", Optional, 0.0, POSITIVE, "Budget amount must be a positive number")
        .length("funding.totalBudget.currency", Optional, 3, 3, "Currency must be a 3-letter code")
        .array("funding.sources", Optional, 0, "Funding sources must be an array")
        .length("funding.sources.*.organization", Optional, 2, 200, "Funding organization name is required")
        .number("funding.sources.*.amount", Optional, 0.0, POSITIVE, "Funding amount must be a positive number")
        .boolean(
            "classification.ethicsApprovalRequired",
            Optional,
            "Ethics approval required must be a boolean",
        )
        .length(
            "classification.ethicsApprovalNumber",
            Optional,
            3,
            50,
            "Ethics approval number must be between 3 and 50 characters",
        );

    let start = body.pointer("/timeline/startDate").and_then(Value::as_str).and_then(parse_datetime);
    let end = body.pointer("/timeline/expectedEndDate").and_then(Value::as_str).and_then(parse_datetime);
    if let (Some(start), Some(end)) = (start, end) {
        if end <= start {
            v.reject("timeline.expectedEndDate", "Expected end date must be after start date");
        }
    }
    v.finish()
}

pub fn update_project(id: &str, body: &Value) -> Result<(), ApiError> {
    let params = json!({ "projectId": id });
    let mut v = Validator::body(body);
    v.length("title", Optional, 5, 200, "Project title must be between 5 and 200 characters")
        .length("description.abstract", Optional, 50, 2000, "Project abstract must be between 50 and 2000 characters")
        .length("description.methodology", Optional, 0, 3000, "Methodology cannot exceed 3000 characters")
        .one_of("status", Optional, PROJECT_STATUSES, "Invalid project status")
        .iso_date("timeline.actualEndDate", Optional, "Valid actual end date is required")
        .array("funding.expenses", Optional, 0, "Expenses must be an array")
        .one_of("funding.expenses.*.category", Optional, EXPENSE_CATEGORIES, "Invalid expense category")
        .number("funding.expenses.*.amount", Optional, 0.0, POSITIVE, "Expense amount must be a positive number")
        .length(
            "funding.expenses.*.description",
            Optional,
            5,
            200,
            "Expense description must be between 5 and 200 characters",
        );
    finish_all(vec![project_id(&params), v])
}

pub fn update_project_status(id: &str, body: &Value) -> Result<(), ApiError> {
    let params = json!({ "projectId": id });
    let mut v = Validator::body(body);
    v.one_of("status", Required, PROJECT_STATUSES, "Invalid project status")
        .length("reason", Optional, 10, 500, "Status change reason must be between 10 and 500 characters");
    finish_all(vec![project_id(&params), v])
}

/// Filters accepted by `GET /projects`.
pub fn project_list_query(params: &QueryParams) -> Result<(), ApiError> {
    let query = query_value(params);
    let mut v = Validator::query(&query);
    v.length("search", Optional, 2, 100, "Search query must be between 2 and 100 characters")
        .one_of("status", Optional, PROJECT_STATUSES, "Invalid status filter")
        .one_of("researchType", Optional, RESEARCH_TYPES, "Invalid research type filter")
        .length("fieldOfStudy", Optional, 2, 100, "Invalid field of study filter")
        .one_of("healthStatus", Optional, HEALTH_STATUSES, "Invalid health status filter")
        .integer("page", Optional, 1, "Page must be a positive integer")
        .check("limit", Optional, "Limit must be between 1 and 100", limit_in_range)
        .one_of("sortBy", Optional, PROJECT_SORT_FIELDS, "Invalid sort field")
        .one_of("sortOrder", Optional, &["asc", "desc"], "Sort order must be asc or desc");
    v.finish()
}

fn member_params(project: &str, member: Option<&str>) -> Value {
    match member {
        Some(m) => json!({ "projectId": project, "memberId": m }),
        None => json!({ "projectId": project }),
    }
}

pub fn add_team_member(project: &str, body: &Value) -> Result<(), ApiError> {
    let params = member_params(project, None);
    let mut v = Validator::body(body);
    v.one_of(
        "memberType",
        Required,
        MEMBER_TYPES,
        "Member type must be coInvestigator, student, or externalCollaborator",
    );

    match body.get("memberType").and_then(Value::as_str) {
        Some("coInvestigator") => {
            v.check("memberData.userId", Required, "Valid user ID is required for co-investigator", is_id)
                .length("memberData.role", Optional, 2, 100, "Role must be between 2 and 100 characters")
                .length(
                    "memberData.affiliationInstitution",
                    Optional,
                    2,
                    200,
                    "Institution name must be between 2 and 200 characters",
                )
                .array("memberData.expertise", Optional, 0, "Expertise must be an array")
                .length(
                    "memberData.expertise.*",
                    Optional,
                    2,
                    100,
                    "Each expertise area must be between 2 and 100 characters",
                )
                .number(
                    "memberData.contributionPercentage",
                    Optional,
                    0.0,
                    100.0,
                    "Contribution percentage must be between 0 and 100",
                );
        }
        Some("student") => {
            v.check("memberData.userId", Required, "Valid user ID is required for student", is_id)
                .one_of(
                    "memberData.level",
                    Required,
                    STUDENT_LEVELS,
                    "Student level must be undergraduate, graduate, phd, or postdoc",
                )
                .check("memberData.supervisor", Optional, "Supervisor must be a valid user ID", is_id)
                .iso_date(
                    "memberData.expectedGraduationDate",
                    Optional,
                    "Valid expected graduation date is required",
                )
                .length("memberData.thesisTitle", Optional, 5, 300, "Thesis title must be between 5 and 300 characters");
        }
        Some("externalCollaborator") => {
            v.length(
                "memberData.name",
                Required,
                2,
                100,
                "External collaborator name is required and must be between 2 and 100 characters",
            )
            .email("memberData.email", Required, "Valid email is required for external collaborator")
            .length("memberData.institution", Optional, 2, 200, "Institution name must be between 2 and 200 characters")
            .length("memberData.role", Optional, 2, 100, "Role must be between 2 and 100 characters")
            .array("memberData.expertise", Optional, 0, "Expertise must be an array")
            .length("memberData.contactInfo.phone", Optional, 10, 20, "Phone number must be between 10 and 20 characters")
            .length("memberData.contactInfo.address", Optional, 10, 500, "Address must be between 10 and 500 characters");
        }
        _ => {}
    }
    finish_all(vec![project_id(&params), v])
}

pub fn update_team_member(project: &str, member: &str, body: &Value) -> Result<(), ApiError> {
    let params = member_params(project, Some(member));
    let mut p = project_id(&params);
    p.pattern("memberId", Required, &OBJECT_ID_RE, "Invalid member ID format");

    let mut v = Validator::body(body);
    v.one_of(
        "memberType",
        Required,
        MEMBER_TYPES,
        "Member type must be coInvestigator, student, or externalCollaborator",
    )
    .object("updates", Required, "Updates must be an object")
    .absent("updates.userId", "User ID cannot be updated");

    match body.get("memberType").and_then(Value::as_str) {
        Some("coInvestigator") => {
            v.length("updates.role", Optional, 2, 100, "Role must be between 2 and 100 characters")
                .length(
                    "updates.affiliationInstitution",
                    Optional,
                    2,
                    200,
                    "Institution name must be between 2 and 200 characters",
                )
                .array("updates.expertise", Optional, 0, "Expertise must be an array")
                .number(
                    "updates.contributionPercentage",
                    Optional,
                    0.0,
                    100.0,
                    "Contribution percentage must be between 0 and 100",
                )
                .one_of("updates.status", Optional, &["active", "inactive", "left"], "Status must be active, inactive, or left");
        }
        Some("student") => {
            v.one_of(
                "updates.level",
                Optional,
                STUDENT_LEVELS,
                "Student level must be undergraduate, graduate, phd, or postdoc",
            )
            .check("updates.supervisor", Optional, "Supervisor must be a valid user ID", is_id)
            .iso_date("updates.expectedGraduationDate", Optional, "Valid expected graduation date is required")
            .length("updates.thesisTitle", Optional, 5, 300, "Thesis title must be between 5 and 300 characters")
            .one_of(
                "updates.status",
                Optional,
                &["active", "completed", "withdrawn"],
                "Student status must be active, completed, or withdrawn",
            );
        }
        Some("externalCollaborator") => {
            v.length("updates.name", Optional, 2, 100, "Name must be between 2 and 100 characters")
                .email("updates.email", Optional, "Valid email is required")
                .length("updates.institution", Optional, 2, 200, "Institution name must be between 2 and 200 characters")
                .length("updates.role", Optional, 2, 100, "Role must be between 2 and 100 characters");
        }
        _ => {}
    }
    finish_all(vec![p, v])
}

pub fn remove_team_member(project: &str, member: &str, params: &QueryParams) -> Result<(), ApiError> {
    let path = member_params(project, Some(member));
    let mut p = project_id(&path);
    p.pattern("memberId", Required, &OBJECT_ID_RE, "Invalid member ID format");

    let query = query_value(params);
    let mut q = Validator::query(&query);
    q.one_of(
        "memberType",
        Required,
        MEMBER_TYPES,
        "Member type query parameter is required and must be coInvestigator, student, or externalCollaborator",
    );
    finish_all(vec![p, q])
}

/// Filters accepted by `GET /projects/:projectId/team`.
pub fn team_query(project: &str, params: &QueryParams) -> Result<(), ApiError> {
    let path = member_params(project, None);
    let query = query_value(params);
    let mut q = Validator::query(&query);
    q.boolean("includeInactive", Optional, "includeInactive must be a boolean")
        .one_of(
            "memberType",
            Optional,
            MEMBER_TYPES,
            "Member type filter must be coInvestigator, student, or externalCollaborator",
        )
        .length("expertise", Optional, 2, 100, "Expertise filter must be between 2 and 100 characters")
        .length("institution", Optional, 2, 200, "Institution filter must be between 2 and 200 characters");
    finish_all(vec![project_id(&path), q])
}

fn is_id(value: &Value) -> bool {
    value.as_str().map(is_object_id).unwrap_or(false)
}

/// Absolute http(s) URL with a host.
fn is_url(value: &Value) -> bool {
    let parsed = value.as_str().and_then(|s| url::Url::parse(s.trim()).ok());
    matches!(parsed, Some(u) if matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
}

fn year_in_range(value: &Value) -> bool {
    let max = i64::from(chrono::Datelike::year(&chrono::Utc::now())) + 5;
    super::as_integer(value).map(|y| (1900..=max).contains(&y)).unwrap_or(false)
}

fn limit_in_range(value: &Value) -> bool {
    super::as_integer(value).map(|n| (1..=100).contains(&n)).unwrap_or(false)
}

fn publication_fields(v: &mut Validator<'_>, presence: super::Presence) {
    v.length("title", presence, 10, 500, "Publication title must be between 10 and 500 characters")
        .array("authors", presence, 1, "At least one author is required")
        .integer("authors.*.order", presence, 1, "Author order must be a positive integer")
        .boolean("authors.*.isCorresponding", presence, "isCorresponding must be a boolean")
        .one_of("publicationType", presence, PUBLICATION_TYPES, "Invalid publication type")
        .one_of("status", Optional, PUBLICATION_STATUSES, "Invalid publication status")
        .length("venue.name", Optional, 2, 200, "Venue name must be between 2 and 200 characters")
        .one_of("venue.type", Optional, VENUE_TYPES, "Invalid venue type")
        .number("venue.impactFactor", Optional, 0.0, POSITIVE, "Impact factor must be a positive number")
        .iso_date("dates.submitted", Optional, "Valid submission date is required")
        .iso_date("dates.accepted", Optional, "Valid acceptance date is required")
        .length("venue.ranking", Optional, 1, 10, "Venue ranking must be between 1 and 10 characters")
        .iso_date("dates.published", Optional, "Valid publication date is required")
        .pattern("identifiers.doi", Optional, &DOI_RE, "Invalid DOI format")
        .check("identifiers.pmid", Optional, "PMID must be numeric", |v| match v {
            Value::Number(_) => true,
            Value::String(s) => NUMERIC_RE.is_match(s),
            _ => false,
        })
        .check("urls.manuscript", Optional, "Manuscript URL must be valid", is_url)
        .check("urls.supplementary", Optional, "Supplementary URL must be valid", is_url)
        .check("urls.data", Optional, "Data URL must be valid", is_url)
        .check("urls.code", Optional, "Code URL must be valid", is_url)
        .integer("citationCount", Optional, 0, "Citation count must be a non-negative integer")
        .length("abstract", Optional, 50, 5000, "Abstract must be between 50 and 5000 characters");
}

pub fn create_publication(project: &str, body: &Value) -> Result<(), ApiError> {
    let params = member_params(project, None);
    let mut v = Validator::body(body);
    publication_fields(&mut v, Required);
    v.pattern("identifiers.arxivId", Optional, &ARXIV_RE, "Invalid arXiv ID format")
        .pattern("identifiers.isbn", Optional, &ISBN_RE, "Invalid ISBN format")
        .array("keywords", Optional, 0, "Keywords must be an array")
        .length("keywords.*", Optional, 2, 50, "Each keyword must be between 2 and 50 characters");

    if let Some(authors) = body.get("authors").and_then(Value::as_array) {
        for (i, author) in authors.iter().enumerate() {
            let has_name = author.get("name").and_then(Value::as_str).map_or(false, |s| !s.trim().is_empty());
            let has_user = author.get("userId").map_or(false, |u| !u.is_null());
            if !has_name && !is_id(author.get("userId").unwrap_or(&Value::Null)) {
                v.reject(&format!("authors[{}].userId", i), "Valid user ID is required for internal authors");
            }
            if !has_user {
                let name_len = author.get("name").and_then(Value::as_str).map(|s| s.trim().chars().count());
                if !matches!(name_len, Some(2..=100)) {
                    v.reject(
                        &format!("authors[{}].name", i),
                        "Author name is required for external authors and must be between 2 and 100 characters",
                    );
                }
            }
        }
    }
    finish_all(vec![project_id(&params), v])
}

pub fn update_publication(project: &str, publication: &str, body: &Value) -> Result<(), ApiError> {
    let params = json!({ "projectId": project, "publicationId": publication });
    let mut p = project_id(&params);
    p.pattern("publicationId", Required, &OBJECT_ID_RE, "Invalid publication ID format");

    let mut v = Validator::body(body);
    publication_fields(&mut v, Optional);

    let date = |key: &str| body.pointer(&format!("/dates/{}", key)).and_then(Value::as_str).and_then(parse_datetime);
    let (submitted, accepted, published) = (date("submitted"), date("accepted"), date("published"));
    if let (Some(s), Some(a)) = (submitted, accepted) {
        if a < s {
            v.reject("dates", "Acceptance date cannot be before submission date");
        }
    }
    if let (Some(a), Some(p)) = (accepted, published) {
        if p < a {
            v.reject("dates", "Publication date cannot be before acceptance date");
        }
    }
    if let (Some(s), Some(p)) = (submitted, published) {
        if p < s {
            v.reject("dates", "Publication date cannot be before submission date");
        }
    }
    finish_all(vec![p, v])
}

/// Filters accepted by `GET /projects/:projectId/publications`.
pub fn publication_query(project: &str, params: &QueryParams) -> Result<(), ApiError> {
    let path = member_params(project, None);
    let query = query_value(params);
    let mut q = Validator::query(&query);
    q.one_of("status", Optional, PUBLICATION_STATUSES, "Invalid status filter")
        .one_of("publicationType", Optional, PUBLICATION_TYPES, "Invalid publication type filter")
        .one_of("venueType", Optional, VENUE_TYPES, "Invalid venue type filter")
        .check("yearFrom", Optional, "Invalid year range", year_in_range)
        .check("yearTo", Optional, "Invalid year range", year_in_range)
        .integer("minCitations", Optional, 0, "Minimum citations must be a non-negative integer")
        .integer("page", Optional, 1, "Page must be a positive integer")
        .check("limit", Optional, "Limit must be between 1 and 100", limit_in_range)
        .one_of("sortBy", Optional, PUBLICATION_SORT_FIELDS, "Invalid sort field")
        .one_of("sortOrder", Optional, &["asc", "desc"], "Sort order must be asc or desc");
    finish_all(vec![project_id(&path), q])
}

/// `q` plus optional `filters[...]` for the cross-project search endpoints.
pub fn search_query(params: &QueryParams) -> Result<(), ApiError> {
    let query = query_value(params);
    let mut q = Validator::query(&query);
    q.length("q", Required, 2, 100, "Search query must be between 2 and 100 characters")
        .one_of("filters[status]", Optional, PUBLICATION_STATUSES, "Invalid status filter")
        .one_of("filters[publicationType]", Optional, PUBLICATION_TYPES, "Invalid publication type filter")
        .one_of("filters[venueType]", Optional, VENUE_TYPES, "Invalid venue type filter");
    q.finish()
}

/// Query accepted by the export endpoints.
pub fn export_query(params: &QueryParams, formats: &[&str]) -> Result<(), ApiError> {
    let query = query_value(params);
    let mut q = Validator::query(&query);
    q.one_of("format", Optional, formats, &format!("Export format must be {}", formats.join(", ")))
        .pattern("projectId", Optional, &PROJECT_ID_RE, "Invalid project ID format")
        .iso_date("dateFrom", Optional, "Valid from date is required")
        .iso_date("dateTo", Optional, "Valid to date is required")
        .boolean("includeUnpublished", Optional, "includeUnpublished must be a boolean")
        .integer("minCitations", Optional, 0, "Minimum citations must be a non-negative integer");
    let from = params.get("dateFrom").and_then(|s| parse_datetime(s));
    let to = params.get("dateTo").and_then(|s| parse_datetime(s));
    if let (Some(from), Some(to)) = (from, to) {
        if to <= from {
            q.reject("dateTo", "To date must be after from date");
        }
    }
    q.finish()
}
