// src/comments.rs

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;

use crate::activity::{self, ActionType, ActivityEntry};
use crate::app_state::AppState;
use crate::auth::current_user;
use crate::conflict::{check_conflict, MutableTable};
use crate::db;
use crate::error::ApiError;
use crate::membership::require_member;
use crate::models::{Comment, TeamRole};

const COMMENT_TARGET_TYPES: &[&str] = &["task", "memo"];

#[derive(Debug, Deserialize)]
pub struct CommentQuery {
    pub team_id: i64,
    pub target_type: String,
    pub target_original_id: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateCommentRequest {
    pub team_id: i64,
    pub target_type: String,
    pub target_original_id: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCommentRequest {
    pub content: String,
    /// Version token from the client's last read; `None` skips the
    /// optimistic-lock check.
    pub updated_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub updated_at: Option<i64>,
}

async fn comment_by_id(data: &AppState, id: i64) -> Result<Comment, ApiError> {
    let comment: Option<Comment> = sqlx::query_as("SELECT * FROM comments WHERE id = ?")
        .bind(id)
        .fetch_optional(data.db())
        .await?;
    comment.ok_or(ApiError::NotFound)
}

// GET /comments?team_id=&target_type=&target_original_id=
pub async fn list_comments(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<CommentQuery>,
) -> Result<HttpResponse, ApiError> {
    let current_user = current_user(&req)?;
    require_member(data.db(), query.team_id, &current_user).await?;

    let comments: Vec<Comment> = sqlx::query_as(
        "SELECT * FROM comments
         WHERE team_id = ? AND target_type = ? AND target_original_id = ?
         ORDER BY created_at",
    )
    .bind(query.team_id)
    .bind(&query.target_type)
    .bind(&query.target_original_id)
    .fetch_all(data.db())
    .await?;
    Ok(HttpResponse::Ok().json(comments))
}

// POST /comments
pub async fn create_comment(
    req: HttpRequest,
    data: web::Data<AppState>,
    payload: web::Json<CreateCommentRequest>,
) -> Result<HttpResponse, ApiError> {
    let current_user = current_user(&req)?;
    require_member(data.db(), payload.team_id, &current_user).await?;

    if !COMMENT_TARGET_TYPES.contains(&payload.target_type.as_str()) {
        return Err(ApiError::Validation(format!(
            "unknown comment target type: {}",
            payload.target_type
        )));
    }
    if payload.content.trim().is_empty() {
        return Err(ApiError::Validation("comment must not be empty".into()));
    }

    let now = db::now_ms();
    let done = sqlx::query(
        "INSERT INTO comments (team_id, user_id, target_type, target_original_id, content, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(payload.team_id)
    .bind(&current_user)
    .bind(&payload.target_type)
    .bind(&payload.target_original_id)
    .bind(payload.content.trim())
    .bind(now)
    .bind(now)
    .execute(data.db())
    .await?;

    let comment: Comment = sqlx::query_as("SELECT * FROM comments WHERE id = ?")
        .bind(done.last_insert_rowid())
        .fetch_one(data.db())
        .await?;

    activity::record(
        data.db(),
        &data.events,
        ActivityEntry::new(
            payload.team_id,
            &current_user,
            ActionType::CommentCreated,
            &payload.target_type,
            &payload.target_original_id,
        ),
    )
    .await;

    Ok(HttpResponse::Ok().json(comment))
}

// PUT /comments/{id}
// Author only, conflict-checked.
pub async fn update_comment(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<i64>,
    payload: web::Json<UpdateCommentRequest>,
) -> Result<HttpResponse, ApiError> {
    let current_user = current_user(&req)?;
    let id = path.into_inner();
    let comment = comment_by_id(&data, id).await?;
    require_member(data.db(), comment.team_id, &current_user).await?;
    if comment.user_id != current_user {
        return Err(ApiError::Forbidden);
    }

    let check =
        check_conflict(data.db(), MutableTable::Comments, comment.team_id, id, payload.updated_at)
            .await?;
    if check.conflict {
        return Err(ApiError::Conflict(check));
    }
    if payload.content.trim().is_empty() {
        return Err(ApiError::Validation("comment must not be empty".into()));
    }

    sqlx::query("UPDATE comments SET content = ?, updated_at = ? WHERE id = ?")
        .bind(payload.content.trim())
        .bind(db::next_version(comment.updated_at))
        .bind(id)
        .execute(data.db())
        .await?;

    activity::record(
        data.db(),
        &data.events,
        ActivityEntry::new(
            comment.team_id,
            &current_user,
            ActionType::CommentUpdated,
            &comment.target_type,
            &comment.target_original_id,
        ),
    )
    .await;

    let comment = comment_by_id(&data, id).await?;
    Ok(HttpResponse::Ok().json(comment))
}

// DELETE /comments/{id}?updated_at=
// The author may delete their own comment; admins may delete any comment
// in their team. Conflict-checked like any other write.
pub async fn delete_comment(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<i64>,
    query: web::Query<DeleteQuery>,
) -> Result<HttpResponse, ApiError> {
    let current_user = current_user(&req)?;
    let id = path.into_inner();
    let comment = comment_by_id(&data, id).await?;
    let role = require_member(data.db(), comment.team_id, &current_user).await?;
    if comment.user_id != current_user && role != TeamRole::Admin {
        return Err(ApiError::Forbidden);
    }

    let check =
        check_conflict(data.db(), MutableTable::Comments, comment.team_id, id, query.updated_at)
            .await?;
    if check.conflict {
        return Err(ApiError::Conflict(check));
    }

    sqlx::query("DELETE FROM comments WHERE id = ?")
        .bind(id)
        .execute(data.db())
        .await?;

    activity::record(
        data.db(),
        &data.events,
        ActivityEntry::new(
            comment.team_id,
            &current_user,
            ActionType::CommentDeleted,
            &comment.target_type,
            &comment.target_original_id,
        ),
    )
    .await;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "status": "comment deleted" })))
}
