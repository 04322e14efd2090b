// export/mod.rs - File downloads for the /export endpoints
//
// csv:    header plus rows, plain or fully quoted
// bibtex: BibTeX entries for publications
//
// Row builders here pick the exported columns out of stored documents.

pub mod bibtex;
pub mod csv;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::analytics::hrms::department_name;
use crate::analytics::nose::{citation_count, progress, team_size};
use crate::services::documents::{get_path, text_at};

pub const EMPLOYEE_COLUMNS: &[&str] = &[
    "employeeId",
    "firstName",
    "lastName",
    "email",
    "status",
    "department",
    "position",
    "level",
    "startDate",
    "salary",
];

pub const PROJECT_COLUMNS: &[&str] = &[
    "projectId",
    "title",
    "status",
    "researchType",
    "fieldOfStudy",
    "principalInvestigator",
    "startDate",
    "expectedEndDate",
    "budget",
    "progress",
    "teamSize",
    "publicationsCount",
];

pub const PUBLICATION_COLUMNS: &[&str] = &[
    "title",
    "authors",
    "publicationType",
    "venue",
    "status",
    "publishedDate",
    "doi",
    "citationCount",
    "projectId",
    "projectTitle",
];

/// Scalar rendered the way it appears in a CSV cell; missing values are empty.
pub fn cell(doc: &Value, path: &str) -> String {
    match get_path(doc, path) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

pub fn employee_row(employee: &Value) -> Vec<String> {
    let department = match get_path(employee, "employment.department") {
        Some(_) => department_name(employee),
        None => String::new(),
    };
    vec![
        cell(employee, "employeeId"),
        cell(employee, "firstName"),
        cell(employee, "lastName"),
        cell(employee, "email"),
        cell(employee, "status"),
        department,
        cell(employee, "employment.position.title"),
        cell(employee, "employment.position.level"),
        cell(employee, "employment.startDate"),
        cell(employee, "compensation.salary.amount"),
    ]
}

pub fn project_row(project: &Value) -> Vec<String> {
    vec![
        cell(project, "projectId"),
        cell(project, "title"),
        cell(project, "status"),
        cell(project, "classification.researchType"),
        cell(project, "classification.fieldOfStudy.primary"),
        cell(project, "team.principalInvestigator.name"),
        cell(project, "timeline.startDate"),
        cell(project, "timeline.expectedEndDate"),
        cell(project, "funding.totalBudget.amount"),
        progress(project).to_string(),
        team_size(project).to_string(),
        get_path(project, "publications")
            .and_then(Value::as_array)
            .map_or(0, Vec::len)
            .to_string(),
    ]
}

/// Publications are expected to carry `projectId` and `projectTitle`.
pub fn publication_row(publication: &Value) -> Vec<String> {
    let authors: Vec<&str> = get_path(publication, "authors")
        .and_then(Value::as_array)
        .map(|a| a.iter().map(|author| text_at(author, "name")).collect())
        .unwrap_or_default();
    vec![
        cell(publication, "title"),
        authors.join("; "),
        cell(publication, "publicationType"),
        cell(publication, "venue.name"),
        cell(publication, "status"),
        cell(publication, "dates.published"),
        cell(publication, "identifiers.doi"),
        citation_count(publication).to_string(),
        cell(publication, "projectId"),
        cell(publication, "projectTitle"),
    ]
}

/// `{prefix}_YYYY-MM-DD.{extension}`
pub fn filename(prefix: &str, extension: &str, now: DateTime<Utc>) -> String {
    format!("{}_{}.{}", prefix, now.format("%Y-%m-%d"), extension)
}

/// A body served as an attachment.
#[derive(Debug, Clone)]
pub struct Download {
    pub content_type: &'static str,
    pub filename: String,
    pub body: String,
}

impl Download {
    pub fn csv(filename: String, body: String) -> Self {
        Self { content_type: "text/csv", filename, body }
    }

    pub fn text(filename: String, body: String) -> Self {
        Self { content_type: "text/plain", filename, body }
    }
}

impl IntoResponse for Download {
    fn into_response(self) -> Response {
        let disposition = format!("attachment; filename=\"{}\"", self.filename);
        (
            StatusCode::OK,
            [(header::CONTENT_TYPE, self.content_type.to_string()), (header::CONTENT_DISPOSITION, disposition)],
            self.body,
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn employee_row_reads_nested_fields() {
        let employee = json!({
            "employeeId": "EMP000001",
            "firstName": "Ada",
            "lastName": "Lovelace",
            "email": "ada@example.com",
            "status": "active",
            "employment": {
                "department": {"name": "Engineering"},
                "position": {"title": "Engineer", "level": "senior"},
                "startDate": "2020-01-01"
            },
            "compensation": {"salary": {"amount": 120000}}
        });
        let row = employee_row(&employee);
        assert_eq!(row.len(), EMPLOYEE_COLUMNS.len());
        assert_eq!(row[5], "Engineering");
        assert_eq!(row[9], "120000");
    }

    #[test]
    fn missing_cells_are_empty() {
        let row = project_row(&json!({"projectId": "PROJ000001"}));
        assert_eq!(row.len(), PROJECT_COLUMNS.len());
        assert_eq!(row[1], "");
        assert_eq!(row[10], "1");
    }

    #[test]
    fn filename_uses_date() {
        let now = Utc.with_ymd_and_hms(2024, 2, 3, 10, 0, 0).unwrap();
        assert_eq!(filename("employees", "csv", now), "employees_2024-02-03.csv");
    }
}
