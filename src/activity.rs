// src/activity.rs
//
// Append-only activity trail. Recording is best-effort: the primary
// mutation has already committed by the time we get here, so a failed log
// insert is logged for operators and otherwise swallowed.

use std::fmt;
use std::str::FromStr;

use actix_web::{web, HttpRequest, HttpResponse};
use log::warn;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::app_state::AppState;
use crate::auth::current_user;
use crate::db;
use crate::error::ApiError;
use crate::events::{EventBus, TeamEvent};
use crate::membership::{require_member, team_by_custom_url};
use crate::models::ActivityLog;

/// Closed set of recordable actions. Anything outside this enum is rejected
/// at the edge rather than written through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    MemoCreated,
    MemoUpdated,
    MemoDeleted,
    TaskCreated,
    TaskUpdated,
    TaskDeleted,
    TaskStatusChanged,
    CommentCreated,
    CommentUpdated,
    CommentDeleted,
    MemberJoined,
    MemberLeft,
    MemberRemoved,
    TeamCreated,
    TeamUpdated,
    JoinRequested,
    JoinApproved,
    JoinRejected,
}

impl ActionType {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionType::MemoCreated => "memo_created",
            ActionType::MemoUpdated => "memo_updated",
            ActionType::MemoDeleted => "memo_deleted",
            ActionType::TaskCreated => "task_created",
            ActionType::TaskUpdated => "task_updated",
            ActionType::TaskDeleted => "task_deleted",
            ActionType::TaskStatusChanged => "task_status_changed",
            ActionType::CommentCreated => "comment_created",
            ActionType::CommentUpdated => "comment_updated",
            ActionType::CommentDeleted => "comment_deleted",
            ActionType::MemberJoined => "member_joined",
            ActionType::MemberLeft => "member_left",
            ActionType::MemberRemoved => "member_removed",
            ActionType::TeamCreated => "team_created",
            ActionType::TeamUpdated => "team_updated",
            ActionType::JoinRequested => "join_requested",
            ActionType::JoinApproved => "join_approved",
            ActionType::JoinRejected => "join_rejected",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "memo_created" => Ok(ActionType::MemoCreated),
            "memo_updated" => Ok(ActionType::MemoUpdated),
            "memo_deleted" => Ok(ActionType::MemoDeleted),
            "task_created" => Ok(ActionType::TaskCreated),
            "task_updated" => Ok(ActionType::TaskUpdated),
            "task_deleted" => Ok(ActionType::TaskDeleted),
            "task_status_changed" => Ok(ActionType::TaskStatusChanged),
            "comment_created" => Ok(ActionType::CommentCreated),
            "comment_updated" => Ok(ActionType::CommentUpdated),
            "comment_deleted" => Ok(ActionType::CommentDeleted),
            "member_joined" => Ok(ActionType::MemberJoined),
            "member_left" => Ok(ActionType::MemberLeft),
            "member_removed" => Ok(ActionType::MemberRemoved),
            "team_created" => Ok(ActionType::TeamCreated),
            "team_updated" => Ok(ActionType::TeamUpdated),
            "join_requested" => Ok(ActionType::JoinRequested),
            "join_approved" => Ok(ActionType::JoinApproved),
            "join_rejected" => Ok(ActionType::JoinRejected),
            other => Err(format!("unknown action type: {}", other)),
        }
    }
}

/// One record to append to `team_activity_logs`.
#[derive(Debug, Clone)]
pub struct ActivityEntry {
    pub team_id: i64,
    pub user_id: String,
    pub action_type: ActionType,
    pub target_type: String,
    pub target_id: String,
    pub target_title: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

impl ActivityEntry {
    pub fn new(
        team_id: i64,
        user_id: &str,
        action_type: ActionType,
        target_type: &str,
        target_id: impl ToString,
    ) -> Self {
        ActivityEntry {
            team_id,
            user_id: user_id.to_string(),
            action_type,
            target_type: target_type.to_string(),
            target_id: target_id.to_string(),
            target_title: None,
            metadata: None,
        }
    }

    pub fn title(mut self, title: &str) -> Self {
        self.target_title = Some(title.to_string());
        self
    }

    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Append one activity row and fan the event out to live listeners.
///
/// Never fails the caller: an insert error is logged and dropped because
/// the primary mutation has already succeeded.
pub async fn record(pool: &SqlitePool, bus: &EventBus, entry: ActivityEntry) {
    let metadata = entry.metadata.as_ref().map(|m| m.to_string());
    let result = sqlx::query(
        "INSERT INTO team_activity_logs
             (team_id, user_id, action_type, target_type, target_id, target_title, metadata, created_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(entry.team_id)
    .bind(&entry.user_id)
    .bind(entry.action_type.as_str())
    .bind(&entry.target_type)
    .bind(&entry.target_id)
    .bind(&entry.target_title)
    .bind(&metadata)
    .bind(db::now_ms())
    .execute(pool)
    .await;

    if let Err(err) = result {
        warn!(
            "failed to record activity {} for team {}: {}",
            entry.action_type, entry.team_id, err
        );
        return;
    }

    bus.emit(&TeamEvent::Activity {
        team_id: entry.team_id,
        actor_id: entry.user_id,
        action_type: entry.action_type.as_str().to_string(),
        target_type: entry.target_type,
        target_id: entry.target_id,
    });
}

// GET /teams/{custom_url}/activity
// Most recent activity first, capped at 100 rows.
pub async fn list_activity(
    req: HttpRequest,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let current_user = current_user(&req)?;
    let team = team_by_custom_url(data.db(), &path).await?;
    require_member(data.db(), team.id, &current_user).await?;

    let logs: Vec<ActivityLog> = sqlx::query_as(
        "SELECT * FROM team_activity_logs WHERE team_id = ? ORDER BY created_at DESC, id DESC LIMIT 100",
    )
    .bind(team.id)
    .fetch_all(data.db())
    .await?;
    Ok(HttpResponse::Ok().json(logs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn action_type_round_trip() {
        for action in [
            ActionType::MemoCreated,
            ActionType::TaskStatusChanged,
            ActionType::MemberJoined,
            ActionType::JoinRejected,
        ] {
            assert_eq!(action.as_str().parse::<ActionType>().unwrap(), action);
        }
    }

    #[test]
    fn unknown_action_type_rejected() {
        assert!("task_exploded".parse::<ActionType>().is_err());
        assert!("".parse::<ActionType>().is_err());
    }

    #[tokio::test]
    async fn record_appends_row_and_emits() {
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
                assert_eq!(event.team_id(), 1);
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }

        let entry = ActivityEntry::new(1, "u1", ActionType::TaskCreated, "task", 42).title("do it");
        record(&pool, &bus, entry).await;

        let logs: Vec<ActivityLog> =
            sqlx::query_as("SELECT * FROM team_activity_logs WHERE team_id = 1")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].action_type, "task_created");
        assert_eq!(logs[0].target_id, "42");
        assert_eq!(logs[0].target_title.as_deref(), Some("do it"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn record_failure_is_swallowed() {
        let pool = db::connect("sqlite::memory:").await.unwrap();
        sqlx::query("DROP TABLE team_activity_logs")
            .execute(&pool)
            .await
            .unwrap();
        let bus = EventBus::new();
        // Must not panic or propagate even though the table is gone.
        record(
            &pool,
            &bus,
            ActivityEntry::new(1, "u1", ActionType::TaskCreated, "task", 1),
        )
        .await;
    }
}
