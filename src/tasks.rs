// src/tasks.rs

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::activity::{self, ActionType, ActivityEntry};
use crate::app_state::AppState;
use crate::auth::current_user;
use crate::conflict::{check_conflict, MutableTable};
use crate::db;
use crate::error::ApiError;
use crate::events::TeamEvent;
use crate::membership::{require_member, team_by_custom_url};
use crate::models::{TaskStatus, TeamTask};

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub status: Option<TaskStatus>,
    pub original_id: Option<String>,
    pub board_category_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub status: Option<TaskStatus>,
    pub board_category_id: Option<i64>,
    /// Version token from the client's last read; `None` skips the
    /// optimistic-lock check.
    pub updated_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ListTasksQuery {
    #[serde(default)]
    pub include_deleted: bool,
}

#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    pub updated_at: Option<i64>,
}

async fn task_in_team(data: &AppState, team_id: i64, task_id: i64) -> Result<TeamTask, ApiError> {
    let task: Option<TeamTask> =
        sqlx::query_as("SELECT * FROM team_tasks WHERE id = ? AND team_id = ?")
            .bind(task_id)
            .bind(team_id)
            .fetch_optional(data.db())
            .await?;
    task.ok_or(ApiError::NotFound)
}

// GET /teams/{custom_url}/tasks
pub async fn list_tasks(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<ListTasksQuery>,
) -> Result<HttpResponse, ApiError> {
    let current_user = current_user(&req)?;
    let team = team_by_custom_url(data.db(), &path).await?;
    require_member(data.db(), team.id, &current_user).await?;

    let sql = if query.include_deleted {
        "SELECT * FROM team_tasks WHERE team_id = ? ORDER BY created_at"
    } else {
        "SELECT * FROM team_tasks WHERE team_id = ? AND status != 'deleted' ORDER BY created_at"
    };
    let tasks: Vec<TeamTask> = sqlx::query_as(sql).bind(team.id).fetch_all(data.db()).await?;
    Ok(HttpResponse::Ok().json(tasks))
}

// POST /teams/{custom_url}/tasks
pub async fn create_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<CreateTaskRequest>,
) -> Result<HttpResponse, ApiError> {
    let current_user = current_user(&req)?;
    let team = team_by_custom_url(data.db(), &path).await?;
    require_member(data.db(), team.id, &current_user).await?;

    if payload.title.trim().is_empty() {
        return Err(ApiError::Validation("title must not be empty".into()));
    }
    let status = payload.status.unwrap_or(TaskStatus::Todo);
    if status == TaskStatus::Deleted {
        return Err(ApiError::Validation("cannot create a deleted task".into()));
    }

    let uuid = Uuid::new_v4().to_string();
    let original_id = payload.original_id.clone().unwrap_or_else(|| uuid.clone());
    let now = db::now_ms();

    let done = sqlx::query(
        "INSERT INTO team_tasks
             (team_id, user_id, original_id, uuid, title, content, status, board_category_id, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(team.id)
    .bind(&current_user)
    .bind(&original_id)
    .bind(&uuid)
    .bind(payload.title.trim())
    .bind(&payload.content)
    .bind(status.as_str())
    .bind(payload.board_category_id)
    .bind(now)
    .bind(now)
    .execute(data.db())
    .await?;

    let task = task_in_team(&data, team.id, done.last_insert_rowid()).await?;
    activity::record(
        data.db(),
        &data.events,
        ActivityEntry::new(team.id, &current_user, ActionType::TaskCreated, "task", task.id)
            .title(&task.title),
    )
    .await;

    Ok(HttpResponse::Ok().json(task))
}

// PUT /teams/{custom_url}/tasks/{id}
// Conflict-checked. A status change that actually changes the stored value
// produces exactly one task_status_changed log row; otherwise the update is
// logged as task_updated.
pub async fn update_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<(String, i64)>,
    payload: web::Json<UpdateTaskRequest>,
) -> Result<HttpResponse, ApiError> {
    let (custom_url, task_id) = path.into_inner();
    let current_user = current_user(&req)?;
    let team = team_by_custom_url(data.db(), &custom_url).await?;
    require_member(data.db(), team.id, &current_user).await?;

    let check =
        check_conflict(data.db(), MutableTable::TeamTasks, team.id, task_id, payload.updated_at)
            .await?;
    if check.conflict {
        return Err(ApiError::Conflict(check));
    }

    let task = task_in_team(&data, team.id, task_id).await?;

    let new_status = payload.status.unwrap_or(task.status);
    if !task.status.can_transition(new_status) {
        return Err(ApiError::Validation(format!(
            "cannot move task from {} to {}",
            task.status.as_str(),
            new_status.as_str()
        )));
    }
    let title = payload.title.clone().unwrap_or_else(|| task.title.clone());
    if title.trim().is_empty() {
        return Err(ApiError::Validation("title must not be empty".into()));
    }
    let content = payload.content.clone().unwrap_or_else(|| task.content.clone());
    let board_category_id = payload.board_category_id.or(task.board_category_id);
    let new_version = db::next_version(task.updated_at);

    sqlx::query(
        "UPDATE team_tasks SET title = ?, content = ?, status = ?, board_category_id = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(title.trim())
    .bind(&content)
    .bind(new_status.as_str())
    .bind(board_category_id)
    .bind(new_version)
    .bind(task_id)
    .execute(data.db())
    .await?;

    if new_status != task.status {
        activity::record(
            data.db(),
            &data.events,
            ActivityEntry::new(team.id, &current_user, ActionType::TaskStatusChanged, "task", task_id)
                .title(title.trim())
                .metadata(serde_json::json!({
                    "from": task.status.as_str(),
                    "to": new_status.as_str(),
                })),
        )
        .await;
        data.events.emit(&TeamEvent::TaskStatusChanged {
            team_id: team.id,
            task_id,
            from: task.status,
            to: new_status,
        });
    } else {
        activity::record(
            data.db(),
            &data.events,
            ActivityEntry::new(team.id, &current_user, ActionType::TaskUpdated, "task", task_id)
                .title(title.trim()),
        )
        .await;
    }

    let task = task_in_team(&data, team.id, task_id).await?;
    Ok(HttpResponse::Ok().json(task))
}

// DELETE /teams/{custom_url}/tasks/{id}?updated_at=
// Soft delete: parks the task in status `deleted`. Conflict-checked like
// any other write.
pub async fn delete_task(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<(String, i64)>,
    query: web::Query<DeleteQuery>,
) -> Result<HttpResponse, ApiError> {
    let (custom_url, task_id) = path.into_inner();
    let current_user = current_user(&req)?;
    let team = team_by_custom_url(data.db(), &custom_url).await?;
    require_member(data.db(), team.id, &current_user).await?;

    let check =
        check_conflict(data.db(), MutableTable::TeamTasks, team.id, task_id, query.updated_at)
            .await?;
    if check.conflict {
        return Err(ApiError::Conflict(check));
    }

    let task = task_in_team(&data, team.id, task_id).await?;
    if task.status == TaskStatus::Deleted {
        return Ok(HttpResponse::Ok().json(task));
    }

    let new_version = db::next_version(task.updated_at);
    sqlx::query("UPDATE team_tasks SET status = 'deleted', updated_at = ? WHERE id = ?")
        .bind(new_version)
        .bind(task_id)
        .execute(data.db())
        .await?;

    // Soft delete is a status transition like any other, so it gets the
    // one task_status_changed entry and nothing else.
    activity::record(
        data.db(),
        &data.events,
        ActivityEntry::new(team.id, &current_user, ActionType::TaskStatusChanged, "task", task_id)
            .title(&task.title)
            .metadata(serde_json::json!({
                "from": task.status.as_str(),
                "to": "deleted",
            })),
    )
    .await;
    data.events.emit(&TeamEvent::TaskStatusChanged {
        team_id: team.id,
        task_id,
        from: task.status,
        to: TaskStatus::Deleted,
    });

    let task = task_in_team(&data, team.id, task_id).await?;
    Ok(HttpResponse::Ok().json(task))
}
