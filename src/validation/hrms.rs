use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{json, Value};

use super::{finish_all, query_value, Presence::*, Validator};
use crate::error::ApiError;
use crate::services::query::QueryParams;

pub const EMPLOYEE_STATUSES: &[&str] = &["active", "inactive", "terminated", "on_leave", "pending"];
pub const POSITION_LEVELS: &[&str] = &["entry", "junior", "mid", "senior", "lead", "manager", "director", "executive"];
pub const GENDERS: &[&str] = &["male", "female", "other", "prefer_not_to_say"];

static EMPLOYEE_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^EMP[0-9]{6}$").expect("valid employee id regex"));

fn employee_id(params: &Value) -> Validator<'_> {
    let mut v = Validator::params(params);
    v.pattern("employeeId", Required, &EMPLOYEE_ID_RE, "Invalid employee ID format");
    v
}

pub fn create_employee(body: &Value) -> Result<(), ApiError> {
    let mut v = Validator::body(body);
    v.length("firstName", Required, 2, 50, "First name must be between 2 and 50 characters")
        .length("lastName", Required, 2, 50, "Last name must be between 2 and 50 characters")
        .email("email", Required, "Valid email is required")
        .iso_date("employment.startDate", Required, "Valid start date is required")
        .length(
            "employment.position.title",
            Required,
            2,
            100,
            "Position title is required and must be between 2 and 100 characters",
        )
        .one_of("employment.position.level", Required, POSITION_LEVELS, "Invalid position level")
        .number("compensation.salary.amount", Optional, 0.0, f64::MAX, "Salary amount must be a positive number")
        .iso_date("personalInfo.dateOfBirth", Optional, "Valid date of birth is required")
        .one_of("personalInfo.gender", Optional, GENDERS, "Invalid gender value")
        .length("personalInfo.phoneNumber", Optional, 10, 20, "Phone number must be between 10 and 20 characters");
    v.finish()
}

pub fn update_employee(id: &str, body: &Value) -> Result<(), ApiError> {
    let params = json!({ "employeeId": id });
    let mut v = Validator::body(body);
    v.length("firstName", Optional, 2, 50, "First name must be between 2 and 50 characters")
        .length("lastName", Optional, 2, 50, "Last name must be between 2 and 50 characters")
        .email("email", Optional, "Valid email is required")
        .length("employment.position.title", Optional, 2, 100, "Position title must be between 2 and 100 characters")
        .one_of("employment.position.level", Optional, POSITION_LEVELS, "Invalid position level")
        .number("compensation.salary.amount", Optional, 0.0, f64::MAX, "Salary amount must be a positive number")
        .length("personalInfo.phoneNumber", Optional, 10, 20, "Phone number must be between 10 and 20 characters");
    finish_all(vec![employee_id(&params), v])
}

pub fn update_employee_status(id: &str, body: &Value) -> Result<(), ApiError> {
    let params = json!({ "employeeId": id });
    let mut v = Validator::body(body);
    v.one_of("status", Required, EMPLOYEE_STATUSES, "Invalid employee status")
        .length("reason", Optional, 10, 500, "Status change reason must be between 10 and 500 characters");
    finish_all(vec![employee_id(&params), v])
}

/// Filters accepted by `GET /employees`.
pub fn employee_list_query(params: &QueryParams) -> Result<(), ApiError> {
    let query = query_value(params);
    let mut q = Validator::query(&query);
    q.one_of("status", Optional, EMPLOYEE_STATUSES, "Invalid employee status filter")
        .length("search", Optional, 1, 100, "Search must be at most 100 characters")
        .one_of("sortOrder", Optional, &["asc", "desc"], "Sort order must be asc or desc");
    q.finish()
}

pub fn export_query(params: &QueryParams) -> Result<(), ApiError> {
    let query = query_value(params);
    let mut q = Validator::query(&query);
    q.one_of("format", Optional, &["json", "csv"], "Export format must be json, csv");
    q.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_employee() -> Value {
        json!({
            "firstName": "Ada",
            "lastName": "Lovelace",
            "email": "ada@example.com",
            "employment": {
                "startDate": "2023-01-15",
                "position": {"title": "Engineer", "level": "senior"}
            },
            "compensation": {"salary": {"amount": 120000}}
        })
    }

    fn error_messages(result: Result<(), ApiError>) -> Vec<String> {
        match result {
            Err(ApiError::ValidationError { errors, .. }) => errors.into_iter().map(|e| e.message).collect(),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn accepts_valid_employee() {
        assert!(create_employee(&valid_employee()).is_ok());
    }

    #[test]
    fn rejects_bad_fields() {
        let mut body = valid_employee();
        body["email"] = json!("not-an-email");
        body["employment"]["position"]["level"] = json!("intern");
        body["compensation"]["salary"]["amount"] = json!(-5);
        let messages = error_messages(create_employee(&body));
        assert_eq!(
            messages,
            vec![
                "Valid email is required",
                "Invalid position level",
                "Salary amount must be a positive number"
            ]
        );
    }

    #[test]
    fn update_checks_id_format() {
        let messages = error_messages(update_employee("EMP12", &json!({})));
        assert_eq!(messages, vec!["Invalid employee ID format"]);
        assert!(update_employee("EMP000001", &json!({"firstName": "Grace"})).is_ok());
    }

    #[test]
    fn status_must_be_known() {
        assert!(update_employee_status("EMP000001", &json!({"status": "on_leave"})).is_ok());
        let messages = error_messages(update_employee_status("EMP000001", &json!({"status": "retired"})));
        assert_eq!(messages, vec!["Invalid employee status"]);
    }
}
