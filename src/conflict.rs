// src/conflict.rs
//
// Optimistic-lock conflict detection. Writers send the `updated_at` value
// they last read; a mutation is rejected when the stored value differs.
// Detect-and-reject only: nothing here serializes concurrent writers.

use serde::Serialize;
use sqlx::{Row, SqlitePool};

/// Fixed allow-list of tables that participate in conflict checking. The
/// table-name fragment interpolated into SQL only ever comes from here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutableTable {
    TeamTasks,
    TeamMemos,
    Comments,
}

impl MutableTable {
    pub fn as_str(self) -> &'static str {
        match self {
            MutableTable::TeamTasks => "team_tasks",
            MutableTable::TeamMemos => "team_memos",
            MutableTable::Comments => "comments",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictReason {
    NotFound,
    Outdated,
}

/// Result of a conflict check, returned verbatim in 409 response bodies.
#[derive(Debug, Clone, Serialize)]
pub struct ConflictCheck {
    pub conflict: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<ConflictReason>,
    #[serde(rename = "currentUpdatedAt", skip_serializing_if = "Option::is_none")]
    pub current_updated_at: Option<i64>,
}

impl ConflictCheck {
    pub fn clean() -> Self {
        ConflictCheck {
            conflict: false,
            reason: None,
            current_updated_at: None,
        }
    }

    fn not_found() -> Self {
        ConflictCheck {
            conflict: true,
            reason: Some(ConflictReason::NotFound),
            current_updated_at: None,
        }
    }

    fn outdated(current: i64) -> Self {
        ConflictCheck {
            conflict: true,
            reason: Some(ConflictReason::Outdated),
            current_updated_at: Some(current),
        }
    }
}

/// Check whether a write to `table` row `id` in `team_id` would clobber a
/// newer version.
///
/// The lookup is scoped to the team: a row belonging to a different team
/// reads as missing, so the check never discloses another team's timestamps.
/// A `None` client timestamp skips the check entirely: clients that predate
/// version tokens keep working, at the cost of last-write-wins for them.
/// Store errors propagate; they are never reported as "no conflict".
pub async fn check_conflict(
    pool: &SqlitePool,
    table: MutableTable,
    team_id: i64,
    id: i64,
    client_updated_at: Option<i64>,
) -> Result<ConflictCheck, sqlx::Error> {
    let client_updated_at = match client_updated_at {
        Some(ts) => ts,
        None => return Ok(ConflictCheck::clean()),
    };

    let sql = format!(
        "SELECT updated_at FROM {} WHERE id = ? AND team_id = ?",
        table.as_str()
    );
    let row = sqlx::query(&sql)
        .bind(id)
        .bind(team_id)
        .fetch_optional(pool)
        .await?;

    match row {
        None => Ok(ConflictCheck::not_found()),
        Some(row) => {
            let current: i64 = row.try_get("updated_at")?;
            if current != client_updated_at {
                Ok(ConflictCheck::outdated(current))
            } else {
                Ok(ConflictCheck::clean())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    async fn pool_with_task(updated_at: i64) -> SqlitePool {
        let pool = db::connect("sqlite::memory:").await.unwrap();
        sqlx::query("INSERT INTO teams (id, name, custom_url, created_at, updated_at) VALUES (1, 't', 's', 1, 1)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO team_tasks (id, team_id, user_id, original_id, uuid, title, content, status, created_at, updated_at)
             VALUES (42, 1, 'u1', 'orig-42', 'uuid-42', 't', 'c', 'todo', 900, ?)",
        )
        .bind(updated_at)
        .execute(&pool)
        .await
        .unwrap();
        pool
    }

    #[tokio::test]
    async fn no_token_skips_check() {
        let pool = db::connect("sqlite::memory:").await.unwrap();
        // Row does not even exist; without a token the check must pass.
        let res = check_conflict(&pool, MutableTable::TeamTasks, 1, 7, None)
            .await
            .unwrap();
        assert!(!res.conflict);
        assert!(res.reason.is_none());
    }

    #[tokio::test]
    async fn missing_row_is_not_found() {
        let pool = db::connect("sqlite::memory:").await.unwrap();
        let res = check_conflict(&pool, MutableTable::TeamTasks, 1, 7, Some(1000))
            .await
            .unwrap();
        assert!(res.conflict);
        assert_eq!(res.reason, Some(ConflictReason::NotFound));
        assert_eq!(res.current_updated_at, None);
    }

    #[tokio::test]
    async fn stale_token_is_outdated() {
        let pool = pool_with_task(1000).await;
        let res = check_conflict(&pool, MutableTable::TeamTasks, 1, 42, Some(999))
            .await
            .unwrap();
        assert!(res.conflict);
        assert_eq!(res.reason, Some(ConflictReason::Outdated));
        assert_eq!(res.current_updated_at, Some(1000));
    }

    #[tokio::test]
    async fn fresh_token_passes() {
        let pool = pool_with_task(1000).await;
        let res = check_conflict(&pool, MutableTable::TeamTasks, 1, 42, Some(1000))
            .await
            .unwrap();
        assert!(!res.conflict);
        assert!(res.reason.is_none());
    }

    #[tokio::test]
    async fn row_in_another_team_reads_as_missing() {
        let pool = pool_with_task(1000).await;
        // Same row id, wrong team: the check must not reveal the row's
        // existence or its timestamp.
        let res = check_conflict(&pool, MutableTable::TeamTasks, 2, 42, Some(999))
            .await
            .unwrap();
        assert!(res.conflict);
        assert_eq!(res.reason, Some(ConflictReason::NotFound));
        assert_eq!(res.current_updated_at, None);
    }

    #[tokio::test]
    async fn conflict_payload_shape() {
        let json = serde_json::to_value(ConflictCheck::outdated(1100)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "conflict": true, "reason": "outdated", "currentUpdatedAt": 1100 })
        );
    }
}
