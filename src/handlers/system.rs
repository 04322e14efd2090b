// handlers/system.rs - service info, health, status, docs and the 404 fallback

use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::{IntoResponse, Json, Response};
use axum::Extension;
use chrono::Utc;
use serde_json::{json, Value};

use crate::config::CONFIG;
use crate::middleware::AuthUser;
use crate::services::documents::timestamp;
use crate::AppState;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

const API_ENDPOINTS: &[&str] = &[
    "/api/v1/hrms/*",
    "/api/v1/nose/*",
    "/api/v1/webhunter/*",
    "/api/v1/docs",
    "/api/v1/status",
];

/// GET /
pub async fn root() -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "Main Server Platform - Enterprise API",
        "version": VERSION,
        "description": "Enterprise API serving the AI-HRMS, NOSE Research and Web-Hunter frameworks",
        "status": "operational",
        "frameworks": ["AI-HRMS", "NOSE Research", "Web-Hunter"],
        "endpoints": {
            "health": "/health",
            "api": "/api/v1/*",
            "docs": "/api/v1/docs",
            "status": "/api/v1/status",
        },
        "timestamp": timestamp(Utc::now()),
    }))
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let environment = CONFIG.environment;
    let database = state.store.health().await;
    let uptime = (Utc::now() - state.started_at).num_seconds();

    Json(json!({
        "success": true,
        "message": format!("{} Enterprise Server is running", environment.label()),
        "timestamp": timestamp(Utc::now()),
        "version": VERSION,
        "status": "healthy",
        "port": CONFIG.server.port,
        "environment": environment.as_str(),
        "uptime": uptime,
        "database": {"status": database.status, "name": database.name, "backend": state.store.backend()},
        "frameworks": {
            "ai-hrms": "active",
            "nose-research": "active",
            "web-hunter": "active",
        },
        "services": {
            "authentication": "active",
            "validation": "active",
            "logging": "active",
            "security": "active",
        },
    }))
}

fn framework_catalogue() -> Value {
    json!({
        "AI-HRMS": {
            "status": "active",
            "endpoints": "/api/v1/hrms/*",
            "description": "Human Resources Management System",
        },
        "NOSE Research": {
            "status": "active",
            "endpoints": "/api/v1/nose/*",
            "description": "Academic Research Project Management",
        },
        "Web-Hunter": {
            "status": "active",
            "endpoints": "/api/v1/webhunter/*",
            "description": "Data Quality Monitoring",
        },
    })
}

/// GET /api/v1/status (authenticated)
pub async fn status(Extension(user): Extension<AuthUser>) -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "Enterprise API Status",
        "version": VERSION,
        "frameworks": framework_catalogue(),
        "user": {"id": user.id, "email": user.email, "frameworks": user.frameworks},
        "timestamp": timestamp(Utc::now()),
    }))
}

/// GET /api/v1/docs
pub async fn docs() -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "Enterprise API Documentation",
        "version": VERSION,
        "baseUrl": format!("http://localhost:{}/api/v1", CONFIG.server.port),
        "authentication": {"type": "JWT Bearer Token", "required": true},
        "frameworks": {
            "AI-HRMS": {
                "baseUrl": "/api/v1/hrms",
                "endpoints": {
                    "employees": "GET/POST /employees, GET/PUT/DELETE /employees/:employeeId",
                    "status": "PATCH /employees/:employeeId/status",
                    "analytics": "GET /analytics/{dashboard,headcount,turnover,departments,performance}",
                    "search": "GET /search/employees",
                    "export": "GET /export/employees",
                },
            },
            "NOSE Research": {
                "baseUrl": "/api/v1/nose",
                "endpoints": {
                    "projects": "GET/POST /projects, GET/PUT/DELETE /projects/:projectId",
                    "status": "PATCH /projects/:projectId/status",
                    "health": "GET /projects/:projectId/health",
                    "team": "GET/POST /projects/:projectId/team, PUT/DELETE /projects/:projectId/team/:memberId",
                    "publications": "GET/POST /projects/:projectId/publications",
                    "analytics": "GET /analytics/*",
                    "search": "GET /search/{projects,publications}",
                    "export": "GET /export/{projects,publications}",
                },
            },
            "Web-Hunter": {
                "baseUrl": "/api/v1/webhunter",
                "endpoints": {
                    "health": "GET /health",
                    "monitors": "GET/POST /quality-monitors, GET/PUT/DELETE /quality-monitors/:monitorId",
                    "search": "GET /quality-monitors/search",
                    "assess": "POST /quality-monitors/:monitorId/assess",
                    "alerts": "GET /quality-monitors/:monitorId/alerts, PATCH /quality-monitors/:monitorId/alerts/:alertId",
                    "compliance": "GET /quality-monitors/:monitorId/compliance",
                    "history": "GET /quality-monitors/:monitorId/history",
                    "trends": "GET /quality-monitors/:monitorId/trends",
                },
            },
        },
    }))
}

/// Any unmatched route.
pub async fn not_found(method: Method, uri: Uri) -> Response {
    let body = json!({
        "success": false,
        "error": "API endpoint not found",
        "path": uri.path(),
        "method": method.as_str(),
        "availableEndpoints": API_ENDPOINTS,
        "documentation": "/api/v1/docs",
    });
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}
