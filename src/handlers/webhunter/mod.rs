// handlers/webhunter/mod.rs - Web-Hunter data quality handlers
//
// monitors: quality monitor CRUD and search
// quality:  assessments, alerts, compliance, history and trends

pub mod monitors;
pub mod quality;

use axum::Extension;
use chrono::Utc;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::handlers::utils::{require_doc, update_doc};
use crate::middleware::AuthUser;
use crate::services::documents::timestamp;
use crate::validation::webhunter::monitor_path;
use crate::AppState;

pub const MONITORS: &str = "quality_monitors";
pub const ASSESSMENTS: &str = "quality_assessments";

const MONITOR_NOT_FOUND: &str = "Quality monitor not found";

async fn load_monitor(state: &AppState, monitor_id: &str) -> Result<Value, ApiError> {
    monitor_path(monitor_id, None)?;
    require_doc(state.store.as_ref(), MONITORS, monitor_id, MONITOR_NOT_FOUND).await
}

/// Versioned read-modify-write of one monitor, see `update_doc`.
async fn update_monitor<T>(
    state: &AppState,
    monitor_id: &str,
    edit: impl FnMut(&mut Value) -> Result<T, ApiError>,
) -> Result<(Value, T), ApiError> {
    monitor_path(monitor_id, None)?;
    update_doc(state.store.as_ref(), MONITORS, monitor_id, MONITOR_NOT_FOUND, edit).await
}

/// GET /api/v1/webhunter/health
pub async fn health(Extension(user): Extension<AuthUser>) -> axum::Json<Value> {
    axum::Json(json!({
        "success": true,
        "message": "Web-Hunter API is healthy",
        "timestamp": timestamp(Utc::now()),
        "version": "1.0.0",
        "user": {"id": user.id, "role": user.frameworks.web_hunter.role},
    }))
}
