pub mod analytics;
pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod export;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod validation;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

use crate::database::DocumentStore;
use crate::middleware::rate_limit::{GLOBAL_LIMIT_MESSAGE, WEBHUNTER_LIMIT_MESSAGE};
use crate::middleware::{jwt_auth_middleware, rate_limit_middleware, require_admin, require_framework, RateLimit};

/// Web-Hunter allows this many requests per client on top of the global limit.
const WEBHUNTER_WINDOW_SECS: u64 = 15 * 60;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn DocumentStore>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store, started_at: Utc::now() }
    }
}

/// The complete HTTP application.
pub fn app(state: AppState) -> Router {
    let cfg = config::config();

    let mut router = Router::new()
        // Public
        .route("/", get(handlers::system::root))
        .route("/health", get(handlers::system::health))
        .route("/api/v1/docs", get(handlers::system::docs))
        // Authenticated
        .merge(status_routes())
        .nest("/api/v1/hrms", hrms_routes())
        .nest("/api/v1/nose", nose_routes())
        .nest("/api/v1/webhunter", webhunter_routes())
        .fallback(handlers::system::not_found)
        .with_state(state);

    if cfg.api.enable_rate_limiting {
        let global = RateLimit::new(cfg.api.rate_limit_requests, cfg.api.rate_limit_window_secs, GLOBAL_LIMIT_MESSAGE)
            .trust_proxy(cfg.api.trust_proxy);
        router = router.layer(from_fn_with_state(global, rate_limit_middleware));
    }

    // Global middleware
    router
        .layer(DefaultBodyLimit::max(cfg.api.max_request_size_bytes))
        .layer(cors_layer(&cfg.security.cors_origins))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods(Any)
        .allow_headers(Any)
}

fn status_routes() -> Router<AppState> {
    Router::new().route(
        "/api/v1/status",
        get(handlers::system::status).route_layer(from_fn(jwt_auth_middleware)),
    )
}

fn hrms_routes() -> Router<AppState> {
    use axum::routing::patch;
    use handlers::hrms::{analytics, employees, search};

    Router::new()
        .route("/employees", get(employees::list).post(employees::create))
        .route(
            "/employees/:employeeId",
            get(employees::get).put(employees::update).delete(employees::delete),
        )
        .route("/employees/:employeeId/status", patch(employees::update_status))
        // Analytics
        .route("/analytics/dashboard", get(analytics::dashboard))
        .route("/analytics/headcount", get(analytics::headcount))
        .route("/analytics/turnover", get(analytics::turnover))
        .route("/analytics/departments", get(analytics::departments))
        .route("/analytics/performance", get(analytics::performance))
        // Search and export
        .route("/search/employees", get(search::search))
        .route("/export/employees", get(search::export))
        .route_layer(from_fn_with_state("AI-HRMS", require_framework))
        .route_layer(from_fn(jwt_auth_middleware))
}

fn nose_routes() -> Router<AppState> {
    use axum::routing::{patch, put};
    use handlers::nose::{analytics, projects, publications, team};

    Router::new()
        .route("/projects", get(projects::list).post(projects::create))
        .route(
            "/projects/:projectId",
            get(projects::get).put(projects::update).delete(projects::delete),
        )
        .route("/projects/:projectId/status", patch(projects::update_status))
        .route("/projects/:projectId/health", get(projects::health))
        // Team
        .route("/projects/:projectId/team", get(team::list).post(team::add))
        .route("/projects/:projectId/team/stats", get(team::stats))
        .route("/projects/:projectId/team/:memberId", put(team::update).delete(team::remove))
        // Publications
        .route(
            "/projects/:projectId/publications",
            get(publications::list).post(publications::create),
        )
        .route(
            "/projects/:projectId/publications/:publicationId",
            get(publications::get).put(publications::update).delete(publications::delete),
        )
        // Analytics
        .route("/analytics/dashboard", get(analytics::dashboard))
        .route("/analytics/projects/overview", get(analytics::projects_overview))
        .route("/analytics/publications/metrics", get(analytics::publication_metrics))
        .route("/analytics/funding/summary", get(analytics::funding_summary))
        .route("/analytics/collaboration/network", get(analytics::collaboration_network))
        // Search and export
        .route("/search/projects", get(projects::search))
        .route("/search/publications", get(publications::search))
        .route("/export/projects", get(projects::export))
        .route("/export/publications", get(publications::export))
        .route_layer(from_fn_with_state("NOSE", require_framework))
        .route_layer(from_fn(jwt_auth_middleware))
}

fn webhunter_routes() -> Router<AppState> {
    use axum::routing::{delete, patch, post, put};
    use handlers::webhunter::{self as wh, monitors, quality};

    let admin = || from_fn(require_admin);
    let api = &config::config().api;
    let limit = RateLimit::new(api.webhunter_rate_limit_requests, WEBHUNTER_WINDOW_SECS, WEBHUNTER_LIMIT_MESSAGE)
        .trust_proxy(api.trust_proxy);

    Router::new()
        .route("/health", get(wh::health))
        .route(
            "/quality-monitors",
            get(monitors::list).merge(post(monitors::create).route_layer(admin())),
        )
        .route("/quality-monitors/search", get(monitors::search))
        .route(
            "/quality-monitors/:monitorId",
            get(monitors::get)
                .merge(put(monitors::update).route_layer(admin()))
                .merge(delete(monitors::delete).route_layer(admin())),
        )
        .route("/quality-monitors/:monitorId/assess", post(quality::assess))
        .route("/quality-monitors/:monitorId/alerts", get(quality::alerts))
        .route("/quality-monitors/:monitorId/alerts/:alertId", patch(quality::acknowledge))
        .route(
            "/quality-monitors/:monitorId/compliance",
            get(quality::compliance).route_layer(admin()),
        )
        .route("/quality-monitors/:monitorId/history", get(quality::history))
        .route("/quality-monitors/:monitorId/trends", get(quality::trends))
        .route_layer(from_fn_with_state(limit, rate_limit_middleware))
        .route_layer(from_fn_with_state("WEB-HUNTER", require_framework))
        .route_layer(from_fn(jwt_auth_middleware))
}
