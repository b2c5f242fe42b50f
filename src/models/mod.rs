mod memo;
mod task;
mod team;
mod user;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

pub use memo::TeamMemo;
pub use task::{TaskStatus, TeamTask};
pub use team::{Team, TeamInvitation, TeamJoinRequest, TeamMember, TeamRole};
pub use user::User;

/// A comment on a task or memo, addressed by the target's `original_id`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Comment {
    pub id: i64,
    pub team_id: i64,
    pub user_id: String,
    pub target_type: String,
    pub target_original_id: String,
    pub content: String,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Append-only audit record of a domain action within a team. Never updated
/// or deleted by normal flow.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ActivityLog {
    pub id: i64,
    pub team_id: i64,
    pub user_id: String,
    pub action_type: String,
    pub target_type: String,
    pub target_id: String,
    pub target_title: Option<String>,
    pub metadata: Option<String>,
    pub created_at: i64,
}

/// A per-user notification row. Only `is_read`/`read_at` ever change after
/// insert.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: i64,
    pub team_id: i64,
    pub user_id: String,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub kind: String,
    pub source_type: Option<String>,
    pub source_id: Option<String>,
    pub target_type: Option<String>,
    pub target_original_id: Option<String>,
    pub actor_user_id: Option<String>,
    pub actor_display_name: Option<String>,
    pub message: String,
    pub is_read: bool,
    pub created_at: i64,
    pub read_at: Option<i64>,
}
