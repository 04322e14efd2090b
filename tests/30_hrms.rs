mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::TestServer;

fn employee(first: &str, email: &str, department: &str) -> Value {
    json!({
        "firstName": first,
        "lastName": "Lovelace",
        "email": email,
        "employment": {
            "startDate": "2023-03-01",
            "department": department,
            "position": {"title": "Software Engineer", "level": "senior"}
        },
        "compensation": {"salary": {"amount": 120000}}
    })
}

#[tokio::test]
async fn employee_lifecycle() -> Result<()> {
    let server = TestServer::spawn().await?;
    let token = common::hrms_token()?;

    let (status, body) = server
        .post("/api/v1/hrms/employees", &token, employee("Ada", "Ada@Example.com", "Engineering"))
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["employeeId"], "EMP000001");
    assert_eq!(body["data"]["email"], "ada@example.com");
    assert_eq!(body["data"]["status"], "active");
    assert_eq!(body["data"]["compensation"]["salary"]["currency"], "USD");

    let (status, body) = server
        .post("/api/v1/hrms/employees", &token, employee("Grace", "grace@example.com", "Research"))
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["employeeId"], "EMP000002");

    let (status, body) = server.get("/api/v1/hrms/employees?department=Engineering", &token).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["pagination"]["total"], 1);
    assert_eq!(body["data"][0]["firstName"], "Ada");

    let (status, body) = server
        .put("/api/v1/hrms/employees/EMP000001", &token, json!({"employeeId": "EMP999999", "lastName": "Byron"}))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["employeeId"], "EMP000001");
    assert_eq!(body["data"]["lastName"], "Byron");

    let (status, body) = server
        .patch(
            "/api/v1/hrms/employees/EMP000001/status",
            &token,
            json!({"status": "terminated", "reason": "Contract reached its end date"}),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!({"employeeId": "EMP000001", "status": "terminated"}));

    let (_, body) = server.get("/api/v1/hrms/employees/EMP000001", &token).await?;
    assert_eq!(body["data"]["employment"]["terminationReason"], "Contract reached its end date");
    assert!(body["data"]["employment"]["endDate"].is_string());

    let (status, _) = server.delete("/api/v1/hrms/employees/EMP000002", &token).await?;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = server.get("/api/v1/hrms/employees/EMP000002", &token).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn employee_list_pages_in_requested_order() -> Result<()> {
    let server = TestServer::spawn().await?;
    let token = common::hrms_token()?;

    for n in 1..=5 {
        let (status, _) = server
            .post(
                "/api/v1/hrms/employees",
                &token,
                employee(&format!("Ada{}", n), &format!("ada{}@example.com", n), "Engineering"),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED);
    }

    let ids = |body: &Value| -> Vec<String> {
        body["data"]
            .as_array()
            .map(|rows| rows.iter().filter_map(|e| e["employeeId"].as_str().map(str::to_string)).collect())
            .unwrap_or_default()
    };

    let (status, body) = server
        .get("/api/v1/hrms/employees?page=2&limit=2&sortBy=employeeId&sortOrder=asc", &token)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&body), vec!["EMP000003", "EMP000004"]);
    assert_eq!(
        body["pagination"],
        json!({"total": 5, "pages": 3, "page": 2, "limit": 2, "hasNext": true, "hasPrev": true})
    );

    let (_, body) = server
        .get("/api/v1/hrms/employees?page=3&limit=2&sortBy=employeeId&sortOrder=asc", &token)
        .await?;
    assert_eq!(ids(&body), vec!["EMP000005"]);
    assert_eq!(body["pagination"]["hasNext"], false);
    assert_eq!(body["pagination"]["hasPrev"], true);

    let (_, body) = server
        .get("/api/v1/hrms/employees?page=1&limit=2&sortBy=employeeId&sortOrder=desc", &token)
        .await?;
    assert_eq!(ids(&body), vec!["EMP000005", "EMP000004"]);
    assert_eq!(body["pagination"]["hasPrev"], false);

    let (_, body) = server.get("/api/v1/hrms/employees?page=4&limit=2", &token).await?;
    assert_eq!(ids(&body), Vec::<String>::new());
    assert_eq!(body["pagination"]["hasNext"], false);

    let (status, body) = server
        .get("/api/v1/hrms/employees?page=9223372036854775807&limit=100", &token)
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Page is out of range");
    Ok(())
}

#[tokio::test]
async fn duplicate_email_conflicts() -> Result<()> {
    let server = TestServer::spawn().await?;
    let token = common::hrms_token()?;

    server
        .post("/api/v1/hrms/employees", &token, employee("Ada", "ada@example.com", "Engineering"))
        .await?;
    let (status, body) = server
        .post("/api/v1/hrms/employees", &token, employee("Adah", "ADA@example.com", "Engineering"))
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    Ok(())
}

#[tokio::test]
async fn invalid_employee_lists_field_errors() -> Result<()> {
    let server = TestServer::spawn().await?;
    let token = common::hrms_token()?;

    let (status, body) = server
        .post("/api/v1/hrms/employees", &token, json!({"firstName": "A", "email": "nope"}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Validation failed");
    let fields: Vec<&str> = body["errors"]
        .as_array()
        .map(|errors| errors.iter().filter_map(|e| e["field"].as_str()).collect())
        .unwrap_or_default();
    assert!(fields.contains(&"firstName"));
    assert!(fields.contains(&"email"));
    assert!(fields.contains(&"employment.startDate"));

    let (status, _) = server.get("/api/v1/hrms/employees/E1", &token).await?;
    assert!(status == StatusCode::BAD_REQUEST || status == StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn search_dashboard_and_export() -> Result<()> {
    let server = TestServer::spawn().await?;
    let token = common::hrms_token()?;

    server
        .post("/api/v1/hrms/employees", &token, employee("Ada", "ada@example.com", "Engineering"))
        .await?;
    server
        .post("/api/v1/hrms/employees", &token, employee("Grace", "grace@example.com", "Research"))
        .await?;

    let (status, body) = server.get("/api/v1/hrms/search/employees?q=grace", &token).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["data"][0]["employeeId"], "EMP000002");

    let (status, _) = server.get("/api/v1/hrms/search/employees?q=a", &token).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = server.get("/api/v1/hrms/analytics/dashboard", &token).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["overview"]["totalEmployees"], 2);
    assert_eq!(body["data"]["overview"]["activeEmployees"], 2);

    let resp = server.get_raw("/api/v1/hrms/export/employees?format=csv", &token).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let content_type = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/csv"));
    let csv = resp.text().await?;
    let mut lines = csv.lines();
    assert!(lines.next().is_some_and(|header| header.starts_with("employeeId")));
    assert_eq!(lines.count(), 2);
    Ok(())
}
