// handlers/nose/mod.rs - NOSE research framework handlers
//
// projects:     project CRUD, status, health, search and export
// team:         members embedded under `team`
// publications: publications embedded under `publications`
// analytics:    /analytics/* reports

pub mod analytics;
pub mod projects;
pub mod publications;
pub mod team;

use crate::error::ApiError;
use crate::handlers::utils::{require_doc, update_doc};
use crate::AppState;
use serde_json::Value;

pub const PROJECTS: &str = "research_projects";

const PROJECT_NOT_FOUND: &str = "Research project not found";

async fn load_project(state: &AppState, project_id: &str) -> Result<Value, ApiError> {
    require_doc(state.store.as_ref(), PROJECTS, project_id, PROJECT_NOT_FOUND).await
}

/// Versioned read-modify-write of one project, see `update_doc`.
async fn update_project<T>(
    state: &AppState,
    project_id: &str,
    edit: impl FnMut(&mut Value) -> Result<T, ApiError>,
) -> Result<(Value, T), ApiError> {
    update_doc(state.store.as_ref(), PROJECTS, project_id, PROJECT_NOT_FOUND, edit).await
}
