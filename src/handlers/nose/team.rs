// handlers/nose/team.rs - /api/v1/nose/projects/:projectId/team handlers

use axum::extract::{Path, Query, State};
use axum::Extension;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

use super::{load_project, update_project};
use crate::analytics::array_at;
use crate::analytics::nose::{active_member_count, group_for, team_size, team_stats};
use crate::error::ApiError;
use crate::handlers::utils::position_by;
use crate::middleware::{ApiResponse, ApiResult, AuthUser, JsonBody};
use crate::services::documents::{
    apply_update, get_path, get_path_mut, set_default, set_path, stamp_updated, text_at, timestamp,
};
use crate::services::ids::object_id;
use crate::services::query::{non_empty, QueryParams};
use crate::validation::nose as validate;
use crate::AppState;

fn member_type(body: &Value) -> &str {
    text_at(body, "memberType")
}

fn group_of(member_type: &str) -> Result<&'static str, ApiError> {
    group_for(member_type).ok_or_else(|| ApiError::bad_request("Invalid member type"))
}

fn missing_member(member_type: &str) -> ApiError {
    match member_type {
        "coInvestigator" => ApiError::not_found("Co-investigator not found"),
        "student" => ApiError::not_found("Student not found"),
        "externalCollaborator" => ApiError::not_found("External collaborator not found"),
        other => ApiError::not_found(format!("{} not found", other)),
    }
}

fn members_mut<'a>(project: &'a mut Value, group: &str) -> Result<&'a mut Vec<Value>, ApiError> {
    let path = format!("team.{}", group);
    if !matches!(get_path(project, &path), Some(Value::Array(_))) {
        set_path(project, &path, json!([]));
    }
    match get_path_mut(project, &path) {
        Some(Value::Array(items)) => Ok(items),
        _ => Err(ApiError::internal_server_error("Project team is malformed")),
    }
}

/// Builds the stored member from `memberData`, rejecting duplicates within
/// its group.
fn new_member(project: &Value, member_type: &str, data: &Value, now: DateTime<Utc>) -> Result<Value, ApiError> {
    let group = group_of(member_type)?;
    let existing = array_at(project, &format!("team.{}", group));
    let mut member = data.clone();

    match member_type {
        "coInvestigator" => {
            let user_id = text_at(data, "userId");
            if existing.iter().any(|m| text_at(m, "userId") == user_id) {
                return Err(ApiError::bad_request("User is already a co-investigator on this project"));
            }
            set_default(&mut member, "role", json!("Co-Investigator"));
            set_default(&mut member, "expertise", json!([]));
            set_default(&mut member, "contributionPercentage", json!(0));
            set_default(&mut member, "joinedDate", json!(timestamp(now)));
            set_default(&mut member, "status", json!("active"));
        }
        "student" => {
            let user_id = text_at(data, "userId");
            if existing.iter().any(|m| text_at(m, "userId") == user_id) {
                return Err(ApiError::bad_request("User is already a student on this project"));
            }
            set_default(&mut member, "supervisor", json!(text_at(project, "team.principalInvestigator.userId")));
            set_default(&mut member, "startDate", json!(timestamp(now)));
            set_default(&mut member, "status", json!("active"));
        }
        _ => {
            let email = text_at(data, "email");
            if existing.iter().any(|m| text_at(m, "email").eq_ignore_ascii_case(email)) {
                return Err(ApiError::bad_request("External collaborator with this email already exists"));
            }
            let mut kept = Map::new();
            for key in ["name", "email", "institution", "role", "expertise", "contactInfo"] {
                if let Some(value) = data.get(key) {
                    kept.insert(key.to_string(), value.clone());
                }
            }
            member = Value::Object(kept);
            set_default(&mut member, "expertise", json!([]));
        }
    }
    set_default(&mut member, "_id", json!(object_id()));
    Ok(member)
}

fn include_member(member: &Value, params: &QueryParams, include_inactive: bool) -> bool {
    if !include_inactive && member.get("status").is_some() && text_at(member, "status") != "active" {
        return false;
    }
    if let Some(area) = non_empty(params, "expertise") {
        let area = area.to_lowercase();
        let matched = array_at(member, "expertise")
            .iter()
            .filter_map(Value::as_str)
            .any(|e| e.to_lowercase().contains(&area));
        if !matched {
            return false;
        }
    }
    if let Some(institution) = non_empty(params, "institution") {
        let institution = institution.to_lowercase();
        let own = format!("{}{}", text_at(member, "affiliationInstitution"), text_at(member, "institution"));
        if !own.to_lowercase().contains(&institution) {
            return false;
        }
    }
    true
}

/// GET /api/v1/nose/projects/:projectId/team
///
/// `memberType` narrows to one group; `includeInactive=false` hides members
/// whose status is not active.
pub async fn list(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Value> {
    validate::team_query(&project_id, &params)?;
    let project = load_project(&state, &project_id).await?;
    let include_inactive = non_empty(&params, "includeInactive").map_or(true, |v| v != "false");
    let only = non_empty(&params, "memberType").and_then(group_for);

    let group = |name: &str| -> Vec<Value> {
        if only.map_or(false, |g| g != name) {
            return Vec::new();
        }
        array_at(&project, &format!("team.{}", name))
            .iter()
            .filter(|m| include_member(m, &params, include_inactive))
            .cloned()
            .collect()
    };

    let data = json!({
        "projectId": project_id,
        "projectTitle": text_at(&project, "title"),
        "principalInvestigator": get_path(&project, "team.principalInvestigator").cloned().unwrap_or(Value::Null),
        "coInvestigators": group("coInvestigators"),
        "students": group("students"),
        "externalCollaborators": group("externalCollaborators"),
        "teamSize": team_size(&project),
        "activeMembers": active_member_count(&project),
    });
    Ok(ApiResponse::success("Team members retrieved successfully", data))
}

/// POST /api/v1/nose/projects/:projectId/team
pub async fn add(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(project_id): Path<String>,
    JsonBody(body): JsonBody,
) -> ApiResult<Value> {
    validate::add_team_member(&project_id, &body)?;

    let kind = member_type(&body).to_string();
    let group = group_of(&kind)?;
    let now = Utc::now();
    let (_, added) = update_project(&state, &project_id, |project| {
        let member = new_member(project, &kind, body.get("memberData").unwrap_or(&Value::Null), now)?;
        let added = match kind.as_str() {
            "externalCollaborator" => member["email"].clone(),
            _ => member["_id"].clone(),
        };
        members_mut(project, group)?.push(member);
        stamp_updated(project, &user.id, now);
        Ok(added)
    })
    .await?;

    tracing::info!(project_id = %project_id, user_id = %user.id, member_type = %kind, "Team member added");
    Ok(ApiResponse::created(
        format!("{} added successfully", kind),
        json!({"projectId": project_id, "memberType": kind, "addedMember": added}),
    ))
}

/// PUT /api/v1/nose/projects/:projectId/team/:memberId
pub async fn update(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((project_id, member_id)): Path<(String, String)>,
    JsonBody(body): JsonBody,
) -> ApiResult<Value> {
    validate::update_team_member(&project_id, &member_id, &body)?;

    let kind = member_type(&body).to_string();
    let group = group_of(&kind)?;
    let updates = body.get("updates").and_then(Value::as_object).cloned().unwrap_or_default();
    let (_, (member, updated_fields)) = update_project(&state, &project_id, |project| {
        let members = members_mut(project, group)?;
        let index = position_by(members, "_id", &member_id).ok_or_else(|| missing_member(&kind))?;
        let updated_fields = apply_update(&mut members[index], &updates, &["_id", "userId"]);
        let member = members[index].clone();
        stamp_updated(project, &user.id, Utc::now());
        Ok((member, updated_fields))
    })
    .await?;

    tracing::info!(project_id = %project_id, member_id = %member_id, ?updated_fields, "Team member updated");
    Ok(ApiResponse::success(format!("{} updated successfully", kind), member))
}

/// DELETE /api/v1/nose/projects/:projectId/team/:memberId?memberType=...
pub async fn remove(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((project_id, member_id)): Path<(String, String)>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Value> {
    validate::remove_team_member(&project_id, &member_id, &params)?;

    let kind = non_empty(&params, "memberType").unwrap_or_default().to_string();
    let group = group_of(&kind)?;
    let (project, ()) = update_project(&state, &project_id, |project| {
        let members = members_mut(project, group)?;
        let index = position_by(members, "_id", &member_id)
            .ok_or_else(|| ApiError::not_found(format!("{} not found", kind)))?;
        members.remove(index);
        stamp_updated(project, &user.id, Utc::now());
        Ok(())
    })
    .await?;

    tracing::info!(project_id = %project_id, member_id = %member_id, member_type = %kind, "Team member removed");
    Ok(ApiResponse::success(
        format!("{} removed successfully", kind),
        json!({
            "projectId": project_id,
            "memberId": member_id,
            "memberType": kind,
            "newTeamSize": team_size(&project),
        }),
    ))
}

/// GET /api/v1/nose/projects/:projectId/team/stats
pub async fn stats(State(state): State<AppState>, Path(project_id): Path<String>) -> ApiResult<Value> {
    validate::validate_project_id(&project_id)?;
    let project = load_project(&state, &project_id).await?;
    Ok(ApiResponse::success("Team statistics retrieved successfully", team_stats(&project)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> Value {
        json!({
            "projectId": "PROJ000001",
            "team": {
                "principalInvestigator": {"userId": "64b000000000000000000001"},
                "coInvestigators": [{"_id": "a1", "userId": "64b000000000000000000002", "status": "active"}],
                "students": [],
                "externalCollaborators": [{"_id": "e1", "email": "Ext@Uni.edu", "name": "Ext"}]
            }
        })
    }

    #[test]
    fn duplicate_members_are_rejected() {
        let now = Utc::now();
        let err = new_member(&project(), "coInvestigator", &json!({"userId": "64b000000000000000000002"}), now).unwrap_err();
        assert_eq!(err.message(), "User is already a co-investigator on this project");

        let err = new_member(&project(), "externalCollaborator", &json!({"email": "ext@uni.edu", "name": "Other"}), now)
            .unwrap_err();
        assert_eq!(err.message(), "External collaborator with this email already exists");
    }

    #[test]
    fn student_defaults_to_pi_supervisor() {
        let member = new_member(
            &project(),
            "student",
            &json!({"userId": "64b000000000000000000003", "level": "phd"}),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(member["supervisor"], "64b000000000000000000001");
        assert_eq!(member["status"], "active");
        assert!(member["_id"].is_string());
    }

    #[test]
    fn co_investigator_defaults() {
        let member = new_member(
            &project(),
            "coInvestigator",
            &json!({"userId": "64b000000000000000000004"}),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(member["role"], "Co-Investigator");
        assert_eq!(member["contributionPercentage"], 0);
        assert_eq!(member["expertise"], json!([]));
    }

    #[test]
    fn members_mut_creates_missing_group() {
        let mut project = json!({"team": {}});
        members_mut(&mut project, "students").unwrap().push(json!({"_id": "s1"}));
        assert_eq!(project["team"]["students"][0]["_id"], "s1");
    }
}
