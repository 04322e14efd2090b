mod common;

use std::sync::Arc;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::TestServer;

const CO_INVESTIGATOR: &str = "64b0c0ffee0000000000b002";

fn project() -> Value {
    json!({
        "title": "Protein folding at scale",
        "description": {
            "abstract": "We study how large language models can be applied to predicting protein structures.",
            "objectives": ["Build a benchmark of folded proteins"]
        },
        "classification": {
            "researchType": "applied",
            "fieldOfStudy": {"primary": "Computational Biology"},
            "subjects": ["biology", "computer_science"]
        },
        "timeline": {
            "startDate": "2024-01-15",
            "expectedEndDate": "2026-01-15",
            "milestones": [{"title": "Dataset assembled", "targetDate": "2024-06-01"}]
        },
        "funding": {"totalBudget": {"amount": 250000}}
    })
}

fn publication(title: &str, citations: u64) -> Value {
    json!({
        "title": title,
        "publicationType": "journal_article",
        "authors": [
            {"name": "Ada Lovelace", "order": 1, "isCorresponding": true},
            {"name": "Grace Hopper", "order": 2, "isCorresponding": false}
        ],
        "venue": {"name": "Nature", "type": "journal"},
        "dates": {"published": "2024-05-01"},
        "citationCount": citations
    })
}

async fn create_project(server: &TestServer, token: &str) -> Result<String> {
    let (status, body) = server.post("/api/v1/nose/projects", token, project()).await?;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    Ok(body["data"]["projectId"].as_str().unwrap_or_default().to_string())
}

#[tokio::test]
async fn project_lifecycle() -> Result<()> {
    let server = TestServer::spawn().await?;
    let token = common::nose_token()?;

    let id = create_project(&server, &token).await?;
    assert_eq!(id, "PROJ000001");

    let (status, body) = server.get(&format!("/api/v1/nose/projects/{}", id), &token).await?;
    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["status"], "planning");
    assert_eq!(data["team"]["principalInvestigator"]["userId"], common::USER_ID);
    assert_eq!(data["funding"]["totalBudget"]["currency"], "USD");
    assert_eq!(data["health"]["overallHealth"], "green");
    assert_eq!(data["timeline"]["milestones"][0]["status"], "not_started");
    assert_eq!(data["analytics"]["views"], 1);

    let (status, body) = server
        .patch(
            &format!("/api/v1/nose/projects/{}/status", id),
            &token,
            json!({"status": "completed", "reason": "All objectives have been met"}),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "completed");

    let (_, body) = server.get(&format!("/api/v1/nose/projects/{}", id), &token).await?;
    assert!(body["data"]["timeline"]["actualEndDate"].is_string());
    assert_eq!(body["data"]["statusHistory"][0]["status"], "completed");

    let (status, _) = server.get("/api/v1/nose/projects/BAD1", &token).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = server.get("/api/v1/nose/projects/PROJ999999", &token).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = server.delete(&format!("/api/v1/nose/projects/{}", id), &token).await?;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = server.get("/api/v1/nose/projects", &token).await?;
    assert_eq!(body["pagination"]["total"], 0);
    Ok(())
}

#[tokio::test]
async fn end_date_must_follow_start() -> Result<()> {
    let server = TestServer::spawn().await?;
    let token = common::nose_token()?;

    let mut body = project();
    body["timeline"]["expectedEndDate"] = json!("2023-01-01");
    let (status, body) = server.post("/api/v1/nose/projects", &token, body).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["field"], "timeline.expectedEndDate");
    Ok(())
}

#[tokio::test]
async fn team_members_are_managed_per_group() -> Result<()> {
    let server = TestServer::spawn().await?;
    let token = common::nose_token()?;
    let id = create_project(&server, &token).await?;
    let team = format!("/api/v1/nose/projects/{}/team", id);

    let (status, body) = server
        .post(
            &team,
            &token,
            json!({"memberType": "coInvestigator", "memberData": {"userId": CO_INVESTIGATOR, "expertise": ["genomics"]}}),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    let member_id = body["data"]["addedMember"].as_str().unwrap_or_default().to_string();
    assert_eq!(member_id.len(), 24);

    let (status, body) = server
        .post(&team, &token, json!({"memberType": "coInvestigator", "memberData": {"userId": CO_INVESTIGATOR}}))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "User is already a co-investigator on this project");

    let (status, body) = server
        .post(
            &team,
            &token,
            json!({"memberType": "externalCollaborator", "memberData": {"name": "Rosalind Franklin", "email": "rf@kings.ac.uk", "institution": "King's College"}}),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["addedMember"], "rf@kings.ac.uk");

    let (status, body) = server.get(&team, &token).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["teamSize"], 3);
    assert_eq!(body["data"]["coInvestigators"][0]["role"], "Co-Investigator");

    let (status, body) = server
        .put(
            &format!("{}/{}", team, member_id),
            &token,
            json!({"memberType": "coInvestigator", "updates": {"role": "Lead Analyst", "userId": "64b0c0ffee0000000000ffff"}}),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "Lead Analyst");
    assert_eq!(body["data"]["userId"], CO_INVESTIGATOR);

    let (status, _) = server.delete(&format!("{}/{}", team, member_id), &token).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = server
        .delete(&format!("{}/{}?memberType=coInvestigator", team, member_id), &token)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["newTeamSize"], 2);
    Ok(())
}

#[tokio::test]
async fn publications_and_exports() -> Result<()> {
    let server = TestServer::spawn().await?;
    let token = common::nose_token()?;
    let id = create_project(&server, &token).await?;
    let publications = format!("/api/v1/nose/projects/{}/publications", id);

    let (status, body) = server
        .post(&publications, &token, publication("Deep learning for protein structure", 12))
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "draft");
    assert_eq!(body["data"]["metrics"]["citationCount"], 12);
    assert!(body["data"].get("citationCount").is_none());

    server
        .post(&publications, &token, publication("Graph kernels for molecular similarity", 40))
        .await?;

    let mut uncorresponding = publication("A publication nobody answers for", 0);
    uncorresponding["authors"][0]["isCorresponding"] = json!(false);
    let (status, _) = server.post(&publications, &token, uncorresponding).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = server
        .get(&format!("{}?sortBy=citationCount&sortOrder=desc", publications), &token)
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["pagination"]["total"], 2);
    assert_eq!(body["data"]["publications"][0]["metrics"]["citationCount"], 40);

    let (status, body) = server.get("/api/v1/nose/search/publications?q=protein", &token).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);
    assert_eq!(body["data"][0]["projectId"], id.as_str());

    let resp = server.get_raw("/api/v1/nose/export/publications?format=bibtex", &token).await?;
    assert_eq!(resp.status(), StatusCode::OK);
    let disposition = resp
        .headers()
        .get(reqwest::header::CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(disposition.contains(".bib"));
    let bib = resp.text().await?;
    assert_eq!(bib.matches("@article{").count(), 2);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_publications_are_all_kept() -> Result<()> {
    let server = Arc::new(TestServer::spawn().await?);
    let token = common::nose_token()?;
    let id = create_project(&server, &token).await?;
    let publications = format!("/api/v1/nose/projects/{}/publications", id);

    let mut tasks = Vec::new();
    for n in 0..40u64 {
        let (server, token, path) = (server.clone(), token.clone(), publications.clone());
        tasks.push(tokio::spawn(async move {
            server.post(&path, &token, publication(&format!("Parallel folding study {}", n), n)).await
        }));
    }
    for task in tasks {
        let (status, body) = task.await??;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
    }

    let (status, body) = server.get(&format!("{}?limit=100", publications), &token).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["pagination"]["total"], 40);

    let (_, body) = server.get(&format!("/api/v1/nose/projects/{}", id), &token).await?;
    assert_eq!(body["data"]["publications"].as_array().map(Vec::len), Some(40));
    Ok(())
}

#[tokio::test]
async fn analytics_cover_owned_projects() -> Result<()> {
    let server = TestServer::spawn().await?;
    let token = common::nose_token()?;
    create_project(&server, &token).await?;

    let (status, body) = server.get("/api/v1/nose/analytics/dashboard", &token).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, body) = server.get("/api/v1/nose/analytics/funding/summary", &token).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    Ok(())
}
