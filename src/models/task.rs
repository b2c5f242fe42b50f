use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Task lifecycle. `deleted` is a soft-delete parking state; the only way
/// out of it is a restore back to `todo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Completed,
    Deleted,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Completed => "completed",
            TaskStatus::Deleted => "deleted",
        }
    }

    /// Whether moving from `self` to `to` is a legal transition. Active
    /// statuses move freely among themselves; a deleted task can only be
    /// restored to `todo`.
    pub fn can_transition(self, to: TaskStatus) -> bool {
        if self == to {
            return true;
        }
        match self {
            TaskStatus::Deleted => to == TaskStatus::Todo,
            _ => true,
        }
    }
}

/// A team task. `updated_at` is the optimistic-lock version token.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TeamTask {
    pub id: i64,
    pub team_id: i64,
    pub user_id: String,
    pub original_id: String,
    pub uuid: String,
    pub title: String,
    pub content: String,
    pub status: TaskStatus,
    pub board_category_id: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deleted_only_restores_to_todo() {
        assert!(TaskStatus::Deleted.can_transition(TaskStatus::Todo));
        assert!(!TaskStatus::Deleted.can_transition(TaskStatus::InProgress));
        assert!(!TaskStatus::Deleted.can_transition(TaskStatus::Completed));
    }

    #[test]
    fn active_statuses_move_freely() {
        assert!(TaskStatus::Todo.can_transition(TaskStatus::InProgress));
        assert!(TaskStatus::InProgress.can_transition(TaskStatus::Completed));
        assert!(TaskStatus::Completed.can_transition(TaskStatus::Todo));
        assert!(TaskStatus::InProgress.can_transition(TaskStatus::Deleted));
    }
}
