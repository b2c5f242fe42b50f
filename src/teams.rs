// src/teams.rs

use actix_web::{web, HttpRequest, HttpResponse};
use log::info;
use serde::Deserialize;
use uuid::Uuid;

use crate::activity::{self, ActionType, ActivityEntry};
use crate::app_state::AppState;
use crate::auth::current_user;
use crate::db;
use crate::error::ApiError;
use crate::events::TeamEvent;
use crate::membership::{
    add_member, admin_count, require_admin, require_member, team_by_custom_url,
};
use crate::models::{Team, TeamInvitation, TeamJoinRequest, TeamMember, TeamRole};
use crate::notifications::{notify, NewNotification};

// ─── REQUEST PAYLOADS ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateTeamRequest {
    pub name: String,
    pub custom_url: String,
    pub description: Option<String>,
    #[serde(default)]
    pub is_public: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTeamRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct JoinByCodeRequest {
    pub code: String,
    pub display_name: Option<String>,
}

fn validate_custom_url(slug: &str) -> Result<(), ApiError> {
    let ok = (3..=32).contains(&slug.len())
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !slug.starts_with('-')
        && !slug.ends_with('-');
    if ok {
        Ok(())
    } else {
        Err(ApiError::Validation(
            "custom_url must be 3-32 chars of [a-z0-9-]".into(),
        ))
    }
}

// ─── TEAM CRUD ────────────────────────────────────────────────────────────────

// GET /teams
// Teams the authenticated caller belongs to.
pub async fn get_user_teams(
    req: HttpRequest,
    data: web::Data<AppState>,
) -> Result<HttpResponse, ApiError> {
    let current_user = current_user(&req)?;
    let teams: Vec<Team> = sqlx::query_as(
        "SELECT t.* FROM teams t
         JOIN team_members m ON m.team_id = t.id
         WHERE m.user_id = ?
         ORDER BY t.created_at",
    )
    .bind(&current_user)
    .fetch_all(data.db())
    .await?;
    Ok(HttpResponse::Ok().json(teams))
}

// POST /teams
// Creates a team; the creator becomes its first admin.
pub async fn create_team(
    req: HttpRequest,
    data: web::Data<AppState>,
    team_info: web::Json<CreateTeamRequest>,
) -> Result<HttpResponse, ApiError> {
    let current_user = current_user(&req)?;
    if team_info.name.trim().is_empty() {
        return Err(ApiError::Validation("team name must not be empty".into()));
    }
    validate_custom_url(&team_info.custom_url)?;

    let now = db::now_ms();
    let result = sqlx::query(
        "INSERT INTO teams (name, custom_url, description, is_public, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(team_info.name.trim())
    .bind(&team_info.custom_url)
    .bind(&team_info.description)
    .bind(team_info.is_public)
    .bind(now)
    .bind(now)
    .execute(data.db())
    .await;

    let team_id = match result {
        Ok(done) => done.last_insert_rowid(),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            return Err(ApiError::Validation("custom_url is already taken".into()));
        }
        Err(err) => return Err(err.into()),
    };

    add_member(data.db(), team_id, &current_user, TeamRole::Admin, None).await?;

    let team: Team = sqlx::query_as("SELECT * FROM teams WHERE id = ?")
        .bind(team_id)
        .fetch_one(data.db())
        .await?;

    info!("team {} created by {}", team.custom_url, current_user);
    activity::record(
        data.db(),
        &data.events,
        ActivityEntry::new(team_id, &current_user, ActionType::TeamCreated, "team", team_id)
            .title(&team.name),
    )
    .await;

    Ok(HttpResponse::Ok().json(team))
}

// GET /teams/{custom_url}
// Members always see the team; public teams are visible to any
// authenticated caller.
pub async fn get_team(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let current_user = current_user(&req)?;
    let team = team_by_custom_url(data.db(), &path).await?;

    if !team.is_public {
        require_member(data.db(), team.id, &current_user).await?;
    }
    Ok(HttpResponse::Ok().json(team))
}

// PUT /teams/{custom_url}
// Admin only.
pub async fn update_team(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
    team_info: web::Json<UpdateTeamRequest>,
) -> Result<HttpResponse, ApiError> {
    let current_user = current_user(&req)?;
    let team = team_by_custom_url(data.db(), &path).await?;
    require_admin(data.db(), team.id, &current_user).await?;

    let name = team_info.name.clone().unwrap_or(team.name);
    if name.trim().is_empty() {
        return Err(ApiError::Validation("team name must not be empty".into()));
    }
    let description = match &team_info.description {
        Some(d) => Some(d.clone()),
        None => team.description,
    };
    let is_public = team_info.is_public.unwrap_or(team.is_public);
    let new_version = db::next_version(team.updated_at);

    sqlx::query(
        "UPDATE teams SET name = ?, description = ?, is_public = ?, updated_at = ? WHERE id = ?",
    )
    .bind(name.trim())
    .bind(&description)
    .bind(is_public)
    .bind(new_version)
    .bind(team.id)
    .execute(data.db())
    .await?;

    activity::record(
        data.db(),
        &data.events,
        ActivityEntry::new(team.id, &current_user, ActionType::TeamUpdated, "team", team.id)
            .title(name.trim()),
    )
    .await;

    let team: Team = sqlx::query_as("SELECT * FROM teams WHERE id = ?")
        .bind(team.id)
        .fetch_one(data.db())
        .await?;
    Ok(HttpResponse::Ok().json(team))
}

// DELETE /teams/{custom_url}
// Admin only. Members, tasks, memos, logs and notifications cascade.
pub async fn delete_team(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let current_user = current_user(&req)?;
    let team = team_by_custom_url(data.db(), &path).await?;
    require_admin(data.db(), team.id, &current_user).await?;

    sqlx::query("DELETE FROM teams WHERE id = ?")
        .bind(team.id)
        .execute(data.db())
        .await?;

    info!("team {} deleted by {}", team.custom_url, current_user);
    Ok(HttpResponse::Ok().json(serde_json::json!({ "status": "team deleted" })))
}

// ─── MEMBERS ──────────────────────────────────────────────────────────────────

// GET /teams/{custom_url}/members
pub async fn get_team_members(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let current_user = current_user(&req)?;
    let team = team_by_custom_url(data.db(), &path).await?;
    require_member(data.db(), team.id, &current_user).await?;

    let members: Vec<TeamMember> =
        sqlx::query_as("SELECT * FROM team_members WHERE team_id = ? ORDER BY joined_at")
            .bind(team.id)
            .fetch_all(data.db())
            .await?;
    Ok(HttpResponse::Ok().json(members))
}

// DELETE /teams/{custom_url}/members/{user_id}
// Admins kick anyone; a member may remove only themselves (leave). The last
// admin seat must stay occupied either way.
pub async fn remove_team_member(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, ApiError> {
    let (custom_url, target_user) = path.into_inner();
    let current_user = current_user(&req)?;
    let team = team_by_custom_url(data.db(), &custom_url).await?;

    let caller_role = require_member(data.db(), team.id, &current_user).await?;
    let leaving = target_user == current_user;
    if !leaving && caller_role != TeamRole::Admin {
        return Err(ApiError::Forbidden);
    }

    let target: Option<TeamMember> =
        sqlx::query_as("SELECT * FROM team_members WHERE team_id = ? AND user_id = ?")
            .bind(team.id)
            .bind(&target_user)
            .fetch_optional(data.db())
            .await?;
    let target = target.ok_or(ApiError::NotFound)?;

    if target.role == TeamRole::Admin && admin_count(data.db(), team.id).await? <= 1 {
        return Err(ApiError::Validation(
            "cannot remove the last admin of a team".into(),
        ));
    }

    sqlx::query("DELETE FROM team_members WHERE id = ?")
        .bind(target.id)
        .execute(data.db())
        .await?;

    let action = if leaving {
        ActionType::MemberLeft
    } else {
        ActionType::MemberRemoved
    };
    activity::record(
        data.db(),
        &data.events,
        ActivityEntry::new(team.id, &current_user, action, "member", &target_user),
    )
    .await;

    if !leaving {
        notify(
            data.db(),
            &data.events,
            NewNotification::new(
                team.id,
                &target_user,
                "member_removed",
                &format!("You were removed from {}", team.name),
            )
            .actor(&current_user, None),
        )
        .await;
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({ "status": "member removed" })))
}

// ─── INVITATIONS & JOIN REQUESTS ──────────────────────────────────────────────

// POST /teams/{custom_url}/invite
// Admin only. Returns a standing invite code for the team.
pub async fn create_invite(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let current_user = current_user(&req)?;
    let team = team_by_custom_url(data.db(), &path).await?;
    require_admin(data.db(), team.id, &current_user).await?;

    let code = Uuid::new_v4().simple().to_string();
    sqlx::query(
        "INSERT INTO team_invitations (team_id, invite_code, inviter_id, role, status, created_at)
         VALUES (?, ?, ?, 'member', 'active', ?)",
    )
    .bind(team.id)
    .bind(&code)
    .bind(&current_user)
    .bind(db::now_ms())
    .execute(data.db())
    .await?;

    let invitation: TeamInvitation =
        sqlx::query_as("SELECT * FROM team_invitations WHERE invite_code = ?")
            .bind(&code)
            .fetch_one(data.db())
            .await?;
    Ok(HttpResponse::Ok().json(invitation))
}

// POST /teams/join-by-code
// Authenticated. Files a pending join request against the invite's team and
// pings the admins.
pub async fn join_by_code(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<JoinByCodeRequest>,
) -> Result<HttpResponse, ApiError> {
    let current_user = current_user(&req)?;

    let invitation: Option<TeamInvitation> =
        sqlx::query_as("SELECT * FROM team_invitations WHERE invite_code = ? AND status = 'active'")
            .bind(&payload.code)
            .fetch_optional(data.db())
            .await?;
    let invitation = invitation.ok_or(ApiError::NotFound)?;
    let team_id = invitation.team_id;

    match require_member(data.db(), team_id, &current_user).await {
        Ok(_) => return Err(ApiError::Validation("already a member of this team".into())),
        // Not a member yet: the expected case for a join request.
        Err(ApiError::Forbidden) => {}
        Err(err) => return Err(err),
    }

    let pending: Option<TeamJoinRequest> = sqlx::query_as(
        "SELECT * FROM team_join_requests WHERE team_id = ? AND user_id = ? AND status = 'pending'",
    )
    .bind(team_id)
    .bind(&current_user)
    .fetch_optional(data.db())
    .await?;
    if pending.is_some() {
        return Err(ApiError::Validation("join request already pending".into()));
    }

    let done = sqlx::query(
        "INSERT INTO team_join_requests (team_id, user_id, display_name, status, created_at)
         VALUES (?, ?, ?, 'pending', ?)",
    )
    .bind(team_id)
    .bind(&current_user)
    .bind(&payload.display_name)
    .bind(db::now_ms())
    .execute(data.db())
    .await?;
    let request_id = done.last_insert_rowid();

    activity::record(
        data.db(),
        &data.events,
        ActivityEntry::new(team_id, &current_user, ActionType::JoinRequested, "join_request", request_id),
    )
    .await;
    data.events.emit(&TeamEvent::JoinRequested {
        team_id,
        request_id,
        user_id: current_user.clone(),
    });

    let admins: Vec<TeamMember> =
        sqlx::query_as("SELECT * FROM team_members WHERE team_id = ? AND role = 'admin'")
            .bind(team_id)
            .fetch_all(data.db())
            .await?;
    for admin in admins {
        notify(
            data.db(),
            &data.events,
            NewNotification::new(team_id, &admin.user_id, "join_request", "New request to join your team")
                .actor(&current_user, payload.display_name.as_deref())
                .source("join_request", request_id),
        )
        .await;
    }

    let request: TeamJoinRequest = sqlx::query_as("SELECT * FROM team_join_requests WHERE id = ?")
        .bind(request_id)
        .fetch_one(data.db())
        .await?;
    Ok(HttpResponse::Ok().json(request))
}

// GET /teams/{custom_url}/join-requests
// Admin only. Pending requests, oldest first.
pub async fn list_join_requests(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let current_user = current_user(&req)?;
    let team = team_by_custom_url(data.db(), &path).await?;
    require_admin(data.db(), team.id, &current_user).await?;

    let requests: Vec<TeamJoinRequest> = sqlx::query_as(
        "SELECT * FROM team_join_requests WHERE team_id = ? AND status = 'pending' ORDER BY created_at",
    )
    .bind(team.id)
    .fetch_all(data.db())
    .await?;
    Ok(HttpResponse::Ok().json(requests))
}

async fn pending_request(
    data: &AppState,
    team_id: i64,
    request_id: i64,
) -> Result<TeamJoinRequest, ApiError> {
    let request: Option<TeamJoinRequest> =
        sqlx::query_as("SELECT * FROM team_join_requests WHERE id = ? AND team_id = ?")
            .bind(request_id)
            .bind(team_id)
            .fetch_optional(data.db())
            .await?;
    let request = request.ok_or(ApiError::NotFound)?;
    if request.status != "pending" {
        return Err(ApiError::Validation("join request already processed".into()));
    }
    Ok(request)
}

// PUT /teams/{custom_url}/join-requests/{id}/approve
// Admin only. Inserts the membership row; the UNIQUE constraint backstops
// a racing double-approve.
pub async fn approve_join_request(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<(String, i64)>,
) -> Result<HttpResponse, ApiError> {
    let (custom_url, request_id) = path.into_inner();
    let current_user = current_user(&req)?;
    let team = team_by_custom_url(data.db(), &custom_url).await?;
    require_admin(data.db(), team.id, &current_user).await?;

    let request = pending_request(&data, team.id, request_id).await?;

    let member = add_member(
        data.db(),
        team.id,
        &request.user_id,
        TeamRole::Member,
        request.display_name.as_deref(),
    )
    .await?;

    sqlx::query("UPDATE team_join_requests SET status = 'approved', processed_at = ? WHERE id = ?")
        .bind(db::now_ms())
        .bind(request_id)
        .execute(data.db())
        .await?;

    activity::record(
        data.db(),
        &data.events,
        ActivityEntry::new(team.id, &current_user, ActionType::JoinApproved, "join_request", request_id),
    )
    .await;
    activity::record(
        data.db(),
        &data.events,
        ActivityEntry::new(team.id, &request.user_id, ActionType::MemberJoined, "member", &request.user_id),
    )
    .await;
    notify(
        data.db(),
        &data.events,
        NewNotification::new(
            team.id,
            &request.user_id,
            "join_approved",
            &format!("Your request to join {} was approved", team.name),
        )
        .actor(&current_user, None),
    )
    .await;

    Ok(HttpResponse::Ok().json(member))
}

// PUT /teams/{custom_url}/join-requests/{id}/reject
pub async fn reject_join_request(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<(String, i64)>,
) -> Result<HttpResponse, ApiError> {
    let (custom_url, request_id) = path.into_inner();
    let current_user = current_user(&req)?;
    let team = team_by_custom_url(data.db(), &custom_url).await?;
    require_admin(data.db(), team.id, &current_user).await?;

    let request = pending_request(&data, team.id, request_id).await?;

    sqlx::query("UPDATE team_join_requests SET status = 'rejected', processed_at = ? WHERE id = ?")
        .bind(db::now_ms())
        .bind(request_id)
        .execute(data.db())
        .await?;

    activity::record(
        data.db(),
        &data.events,
        ActivityEntry::new(team.id, &current_user, ActionType::JoinRejected, "join_request", request_id),
    )
    .await;
    notify(
        data.db(),
        &data.events,
        NewNotification::new(
            team.id,
            &request.user_id,
            "join_rejected",
            &format!("Your request to join {} was declined", team.name),
        )
        .actor(&current_user, None),
    )
    .await;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "status": "rejected" })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_url_rules() {
        assert!(validate_custom_url("my-team-01").is_ok());
        assert!(validate_custom_url("abc").is_ok());
        assert!(validate_custom_url("ab").is_err());
        assert!(validate_custom_url("Has-Caps").is_err());
        assert!(validate_custom_url("-leading").is_err());
        assert!(validate_custom_url("trailing-").is_err());
        assert!(validate_custom_url("with space").is_err());
    }
}
