mod common;

use anyhow::Result;
use reqwest::{Method, StatusCode};

use common::TestServer;

#[tokio::test]
async fn health_reports_store_and_frameworks() -> Result<()> {
    let server = TestServer::spawn().await?;

    let (status, body) = server.call(Method::GET, "/health", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["database"]["backend"], "memory");
    assert_eq!(body["frameworks"]["web-hunter"], "active");
    Ok(())
}

#[tokio::test]
async fn root_and_docs_are_public() -> Result<()> {
    let server = TestServer::spawn().await?;

    let (status, root) = server.call(Method::GET, "/", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(root["endpoints"]["docs"], "/api/v1/docs");

    let (status, docs) = server.call(Method::GET, "/api/v1/docs", None, None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(docs["frameworks"]["NOSE Research"]["baseUrl"], "/api/v1/nose");
    Ok(())
}

#[tokio::test]
async fn status_requires_token() -> Result<()> {
    let server = TestServer::spawn().await?;

    let (status, body) = server.call(Method::GET, "/api/v1/status", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Access token is required");

    let token = common::hrms_token()?;
    let (status, body) = server.get("/api/v1/status", &token).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["id"], common::USER_ID);
    assert_eq!(body["user"]["frameworks"]["aiHrms"]["role"], "hr_manager");
    Ok(())
}

#[tokio::test]
async fn unknown_route_lists_endpoints() -> Result<()> {
    let server = TestServer::spawn().await?;

    let (status, body) = server.call(Method::POST, "/api/v2/nothing", None, None).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "API endpoint not found");
    assert_eq!(body["path"], "/api/v2/nothing");
    assert_eq!(body["method"], "POST");
    assert!(body["availableEndpoints"].as_array().is_some_and(|e| !e.is_empty()));
    Ok(())
}
