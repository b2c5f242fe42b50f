// src/membership.rs
//
// Team-scoped authorization. Membership implies read access; destructive
// and administrative operations additionally require the admin role.

use sqlx::SqlitePool;

use crate::db;
use crate::error::ApiError;
use crate::models::{Team, TeamMember, TeamRole};

/// Resolve the caller's role in `team_id`, failing closed with `Forbidden`
/// when no membership row exists.
pub async fn require_member(
    pool: &SqlitePool,
    team_id: i64,
    user_id: &str,
) -> Result<TeamRole, ApiError> {
    let member: Option<TeamMember> =
        sqlx::query_as("SELECT * FROM team_members WHERE team_id = ? AND user_id = ?")
            .bind(team_id)
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
    match member {
        Some(member) => Ok(member.role),
        None => Err(ApiError::Forbidden),
    }
}

/// Like `require_member`, but only admins pass.
pub async fn require_admin(
    pool: &SqlitePool,
    team_id: i64,
    user_id: &str,
) -> Result<(), ApiError> {
    match require_member(pool, team_id, user_id).await? {
        TeamRole::Admin => Ok(()),
        TeamRole::Member => Err(ApiError::Forbidden),
    }
}

/// Look up a team by its external slug.
pub async fn team_by_custom_url(pool: &SqlitePool, custom_url: &str) -> Result<Team, ApiError> {
    let team: Option<Team> = sqlx::query_as("SELECT * FROM teams WHERE custom_url = ?")
        .bind(custom_url)
        .fetch_optional(pool)
        .await?;
    team.ok_or(ApiError::NotFound)
}

/// Insert a membership row. The `(team_id, user_id)` UNIQUE constraint
/// turns a duplicate join into a validation error instead of a second row.
pub async fn add_member(
    pool: &SqlitePool,
    team_id: i64,
    user_id: &str,
    role: TeamRole,
    display_name: Option<&str>,
) -> Result<TeamMember, ApiError> {
    let result = sqlx::query(
        "INSERT INTO team_members (team_id, user_id, role, joined_at, display_name)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(team_id)
    .bind(user_id)
    .bind(role.as_str())
    .bind(db::now_ms())
    .bind(display_name)
    .execute(pool)
    .await;

    match result {
        Ok(done) => {
            let member: TeamMember = sqlx::query_as("SELECT * FROM team_members WHERE id = ?")
                .bind(done.last_insert_rowid())
                .fetch_one(pool)
                .await?;
            Ok(member)
        }
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(
            ApiError::Validation("user is already a member of this team".into()),
        ),
        Err(err) => Err(err.into()),
    }
}

/// Number of admins currently in the team. Used to keep the last admin seat
/// occupied.
pub async fn admin_count(pool: &SqlitePool, team_id: i64) -> Result<i64, ApiError> {
    let row: (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM team_members WHERE team_id = ? AND role = 'admin'")
            .bind(team_id)
            .fetch_one(pool)
            .await?;
    Ok(row.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn pool_with_team() -> SqlitePool {
        let pool = db::connect("sqlite::memory:").await.unwrap();
        sqlx::query("INSERT INTO teams (name, custom_url, created_at, updated_at) VALUES ('t', 'crew', 1, 1)")
            .execute(&pool)
            .await
            .unwrap();
        pool
    }

    #[tokio::test]
    async fn non_member_is_forbidden() {
        let pool = pool_with_team().await;
        let err = require_member(&pool, 1, "stranger").await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden));
    }

    #[tokio::test]
    async fn member_role_blocks_admin_gate() {
        let pool = pool_with_team().await;
        add_member(&pool, 1, "alice", TeamRole::Admin, None).await.unwrap();
        add_member(&pool, 1, "bob", TeamRole::Member, None).await.unwrap();

        assert!(require_admin(&pool, 1, "alice").await.is_ok());
        let err = require_admin(&pool, 1, "bob").await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden));
        assert_eq!(require_member(&pool, 1, "bob").await.unwrap(), TeamRole::Member);
    }

    #[tokio::test]
    async fn duplicate_membership_is_validation_error() {
        let pool = pool_with_team().await;
        add_member(&pool, 1, "alice", TeamRole::Member, None).await.unwrap();
        let err = add_member(&pool, 1, "alice", TeamRole::Member, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let rows: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM team_members WHERE team_id = 1 AND user_id = 'alice'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(rows.0, 1);
    }

    #[tokio::test]
    async fn slug_lookup() {
        let pool = pool_with_team().await;
        assert_eq!(team_by_custom_url(&pool, "crew").await.unwrap().id, 1);
        let err = team_by_custom_url(&pool, "nope").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound));
    }
}
