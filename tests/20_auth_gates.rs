mod common;

use anyhow::Result;
use reqwest::{Method, StatusCode};

use common::TestServer;

#[tokio::test]
async fn malformed_token_is_rejected() -> Result<()> {
    let server = TestServer::spawn().await?;

    let (status, body) = server.get("/api/v1/hrms/employees", "not-a-jwt").await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid token");
    Ok(())
}

#[tokio::test]
async fn frameworks_are_gated_per_grant() -> Result<()> {
    let server = TestServer::spawn().await?;
    let hrms = common::hrms_token()?;

    let (status, _) = server.get("/api/v1/hrms/employees", &hrms).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = server.get("/api/v1/nose/projects", &hrms).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Access denied for NOSE framework");

    let (status, _) = server.get("/api/v1/webhunter/health", &hrms).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}

#[tokio::test]
async fn framework_routes_need_a_token() -> Result<()> {
    let server = TestServer::spawn().await?;

    for path in ["/api/v1/hrms/employees", "/api/v1/nose/projects", "/api/v1/webhunter/quality-monitors"] {
        let (status, _) = server.call(Method::GET, path, None, None).await?;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", path);
    }
    Ok(())
}

#[tokio::test]
async fn webhunter_admin_routes_need_admin_role() -> Result<()> {
    let server = TestServer::spawn().await?;
    let analyst = common::webhunter_token("analyst")?;

    let (status, _) = server.get("/api/v1/webhunter/quality-monitors", &analyst).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = server
        .post("/api/v1/webhunter/quality-monitors", &analyst, serde_json::json!({"name": "x"}))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Admin privileges required");
    Ok(())
}
