// src/memos.rs

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::activity::{self, ActionType, ActivityEntry};
use crate::app_state::AppState;
use crate::auth::current_user;
use crate::conflict::{check_conflict, MutableTable};
use crate::db;
use crate::error::ApiError;
use crate::membership::{require_member, team_by_custom_url};
use crate::models::TeamMemo;

#[derive(Debug, Deserialize)]
pub struct CreateMemoRequest {
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub original_id: Option<String>,
    pub board_category_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMemoRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub board_category_id: Option<i64>,
    /// Version token from the client's last read; `None` skips the
    /// optimistic-lock check.
    pub updated_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub updated_at: Option<i64>,
}

async fn memo_in_team(data: &AppState, team_id: i64, memo_id: i64) -> Result<TeamMemo, ApiError> {
    let memo: Option<TeamMemo> =
        sqlx::query_as("SELECT * FROM team_memos WHERE id = ? AND team_id = ?")
            .bind(memo_id)
            .bind(team_id)
            .fetch_optional(data.db())
            .await?;
    memo.ok_or(ApiError::NotFound)
}

// GET /teams/{custom_url}/memos
pub async fn list_memos(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let current_user = current_user(&req)?;
    let team = team_by_custom_url(data.db(), &path).await?;
    require_member(data.db(), team.id, &current_user).await?;

    let memos: Vec<TeamMemo> =
        sqlx::query_as("SELECT * FROM team_memos WHERE team_id = ? ORDER BY created_at")
            .bind(team.id)
            .fetch_all(data.db())
            .await?;
    Ok(HttpResponse::Ok().json(memos))
}

// POST /teams/{custom_url}/memos
pub async fn create_memo(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<CreateMemoRequest>,
) -> Result<HttpResponse, ApiError> {
    let current_user = current_user(&req)?;
    let team = team_by_custom_url(data.db(), &path).await?;
    require_member(data.db(), team.id, &current_user).await?;

    if payload.title.trim().is_empty() {
        return Err(ApiError::Validation("title must not be empty".into()));
    }

    let uuid = Uuid::new_v4().to_string();
    let original_id = payload.original_id.clone().unwrap_or_else(|| uuid.clone());
    let now = db::now_ms();

    let done = sqlx::query(
        "INSERT INTO team_memos
             (team_id, user_id, original_id, uuid, title, content, board_category_id, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(team.id)
    .bind(&current_user)
    .bind(&original_id)
    .bind(&uuid)
    .bind(payload.title.trim())
    .bind(&payload.content)
    .bind(payload.board_category_id)
    .bind(now)
    .bind(now)
    .execute(data.db())
    .await?;

    let memo = memo_in_team(&data, team.id, done.last_insert_rowid()).await?;
    activity::record(
        data.db(),
        &data.events,
        ActivityEntry::new(team.id, &current_user, ActionType::MemoCreated, "memo", memo.id)
            .title(&memo.title),
    )
    .await;

    Ok(HttpResponse::Ok().json(memo))
}

// PUT /teams/{custom_url}/memos/{id}
// Conflict-checked.
pub async fn update_memo(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<(String, i64)>,
    payload: web::Json<UpdateMemoRequest>,
) -> Result<HttpResponse, ApiError> {
    let (custom_url, memo_id) = path.into_inner();
    let current_user = current_user(&req)?;
    let team = team_by_custom_url(data.db(), &custom_url).await?;
    require_member(data.db(), team.id, &current_user).await?;

    let check =
        check_conflict(data.db(), MutableTable::TeamMemos, team.id, memo_id, payload.updated_at)
            .await?;
    if check.conflict {
        return Err(ApiError::Conflict(check));
    }

    let memo = memo_in_team(&data, team.id, memo_id).await?;
    let title = payload.title.clone().unwrap_or_else(|| memo.title.clone());
    if title.trim().is_empty() {
        return Err(ApiError::Validation("title must not be empty".into()));
    }
    let content = payload.content.clone().unwrap_or_else(|| memo.content.clone());
    let board_category_id = payload.board_category_id.or(memo.board_category_id);
    let new_version = db::next_version(memo.updated_at);

    sqlx::query(
        "UPDATE team_memos SET title = ?, content = ?, board_category_id = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(title.trim())
    .bind(&content)
    .bind(board_category_id)
    .bind(new_version)
    .bind(memo_id)
    .execute(data.db())
    .await?;

    activity::record(
        data.db(),
        &data.events,
        ActivityEntry::new(team.id, &current_user, ActionType::MemoUpdated, "memo", memo_id)
            .title(title.trim()),
    )
    .await;

    let memo = memo_in_team(&data, team.id, memo_id).await?;
    Ok(HttpResponse::Ok().json(memo))
}

// DELETE /teams/{custom_url}/memos/{id}?updated_at=
// Hard delete, conflict-checked.
pub async fn delete_memo(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<(String, i64)>,
    query: web::Query<DeleteQuery>,
) -> Result<HttpResponse, ApiError> {
    let (custom_url, memo_id) = path.into_inner();
    let current_user = current_user(&req)?;
    let team = team_by_custom_url(data.db(), &custom_url).await?;
    require_member(data.db(), team.id, &current_user).await?;

    let check =
        check_conflict(data.db(), MutableTable::TeamMemos, team.id, memo_id, query.updated_at)
            .await?;
    if check.conflict {
        return Err(ApiError::Conflict(check));
    }

    let memo = memo_in_team(&data, team.id, memo_id).await?;
    sqlx::query("DELETE FROM team_memos WHERE id = ?")
        .bind(memo_id)
        .execute(data.db())
        .await?;

    activity::record(
        data.db(),
        &data.events,
        ActivityEntry::new(team.id, &current_user, ActionType::MemoDeleted, "memo", memo_id)
            .title(&memo.title),
    )
    .await;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "status": "memo deleted" })))
}
