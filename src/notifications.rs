// src/notifications.rs

use actix_web::{web, HttpRequest, HttpResponse};
use log::warn;
use serde::Deserialize;
use sqlx::SqlitePool;

use crate::app_state::AppState;
use crate::auth::current_user;
use crate::db;
use crate::error::ApiError;
use crate::events::{EventBus, TeamEvent};
use crate::membership::require_member;
use crate::models::Notification;

/// Payload for creating a notification row as a mutation side effect.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub team_id: i64,
    pub user_id: String,
    pub kind: String,
    pub source_type: Option<String>,
    pub source_id: Option<String>,
    pub target_type: Option<String>,
    pub target_original_id: Option<String>,
    pub actor_user_id: Option<String>,
    pub actor_display_name: Option<String>,
    pub message: String,
}

impl NewNotification {
    pub fn new(team_id: i64, user_id: &str, kind: &str, message: &str) -> Self {
        NewNotification {
            team_id,
            user_id: user_id.to_string(),
            kind: kind.to_string(),
            source_type: None,
            source_id: None,
            target_type: None,
            target_original_id: None,
            actor_user_id: None,
            actor_display_name: None,
            message: message.to_string(),
        }
    }

    pub fn actor(mut self, user_id: &str, display_name: Option<&str>) -> Self {
        self.actor_user_id = Some(user_id.to_string());
        self.actor_display_name = display_name.map(str::to_string);
        self
    }

    pub fn source(mut self, source_type: &str, source_id: impl ToString) -> Self {
        self.source_type = Some(source_type.to_string());
        self.source_id = Some(source_id.to_string());
        self
    }
}

/// Insert a notification and announce it on the bus. Best-effort like
/// activity logging: the primary mutation already committed.
pub async fn notify(pool: &SqlitePool, bus: &EventBus, notification: NewNotification) {
    let result = sqlx::query(
        "INSERT INTO notifications
             (team_id, user_id, type, source_type, source_id, target_type, target_original_id,
              actor_user_id, actor_display_name, message, is_read, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?)",
    )
    .bind(notification.team_id)
    .bind(&notification.user_id)
    .bind(&notification.kind)
    .bind(&notification.source_type)
    .bind(&notification.source_id)
    .bind(&notification.target_type)
    .bind(&notification.target_original_id)
    .bind(&notification.actor_user_id)
    .bind(&notification.actor_display_name)
    .bind(&notification.message)
    .bind(db::now_ms())
    .execute(pool)
    .await;

    match result {
        Ok(done) => bus.emit(&TeamEvent::NotificationCreated {
            team_id: notification.team_id,
            user_id: notification.user_id,
            notification_id: done.last_insert_rowid(),
        }),
        Err(err) => warn!(
            "failed to create {} notification for user {}: {}",
            notification.kind, notification.user_id, err
        ),
    }
}

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    pub team_id: i64,
}

// GET /notifications?team_id=
// The caller's own notifications in the given team, newest first.
pub async fn list_notifications(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<NotificationQuery>,
) -> Result<HttpResponse, ApiError> {
    let current_user = current_user(&req)?;
    require_member(data.db(), query.team_id, &current_user).await?;

    let notifications: Vec<Notification> = sqlx::query_as(
        "SELECT * FROM notifications WHERE team_id = ? AND user_id = ? ORDER BY created_at DESC",
    )
    .bind(query.team_id)
    .bind(&current_user)
    .fetch_all(data.db())
    .await?;

    Ok(HttpResponse::Ok().json(notifications))
}

// PUT /notifications/{id}/read
pub async fn mark_read(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let current_user = current_user(&req)?;
    let id = path.into_inner();

    let result = sqlx::query(
        "UPDATE notifications SET is_read = 1, read_at = ? WHERE id = ? AND user_id = ?",
    )
    .bind(db::now_ms())
    .bind(id)
    .bind(&current_user)
    .execute(data.db())
    .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::NotFound);
    }
    Ok(HttpResponse::Ok().json(serde_json::json!({ "status": "read" })))
}

// PUT /notifications/mark-all-read?team_id=
pub async fn mark_all_read(
    req: HttpRequest,
    data: web::Data<AppState>,
    query: web::Query<NotificationQuery>,
) -> Result<HttpResponse, ApiError> {
    let current_user = current_user(&req)?;
    require_member(data.db(), query.team_id, &current_user).await?;

    let result = sqlx::query(
        "UPDATE notifications SET is_read = 1, read_at = ?
         WHERE team_id = ? AND user_id = ? AND is_read = 0",
    )
    .bind(db::now_ms())
    .bind(query.team_id)
    .bind(&current_user)
    .execute(data.db())
    .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "marked": result.rows_affected() })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn notify_inserts_and_emits() {
        let pool = db::connect("sqlite::memory:").await.unwrap();
        sqlx::query("INSERT INTO teams (name, custom_url, created_at, updated_at) VALUES ('t', 's', 1, 1)")
            .execute(&pool)
            .await
            .unwrap();

        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        {
            let hits = hits.clone();
            bus.on(move |event| {
                if matches!(event, TeamEvent::NotificationCreated { .. }) {
                    hits.fetch_add(1, Ordering::SeqCst);
                }
            });
        }

        notify(
            &pool,
            &bus,
            NewNotification::new(1, "bob", "join_approved", "you are in").actor("alice", Some("Alice")),
        )
        .await;

        let rows: Vec<Notification> = sqlx::query_as("SELECT * FROM notifications")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].kind, "join_approved");
        assert_eq!(rows[0].actor_user_id.as_deref(), Some("alice"));
        assert!(!rows[0].is_read);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
