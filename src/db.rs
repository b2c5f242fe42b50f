// src/db.rs

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

/// Open the database and ensure the schema exists.
///
/// In-memory databases get a single pinned connection; a pooled `:memory:`
/// URL would otherwise hand every connection its own empty database.
pub async fn connect(url: &str) -> Result<SqlitePool, sqlx::Error> {
    let opts = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let in_memory = url.contains(":memory:");
    let pool = SqlitePoolOptions::new()
        .max_connections(if in_memory { 1 } else { 5 })
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(opts)
        .await?;

    init_schema(&pool).await?;
    Ok(pool)
}

/// Create all tables. Timestamps are millisecond epoch integers; `updated_at`
/// doubles as the optimistic-lock token on mutable rows.
pub async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::raw_sql(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id              TEXT PRIMARY KEY,
            email           TEXT NOT NULL UNIQUE,
            username        TEXT,
            hashed_password TEXT NOT NULL,
            plan            TEXT NOT NULL DEFAULT 'free',
            created_at      INTEGER NOT NULL,
            updated_at      INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS teams (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            name        TEXT NOT NULL,
            custom_url  TEXT NOT NULL UNIQUE,
            description TEXT,
            is_public   INTEGER NOT NULL DEFAULT 0,
            created_at  INTEGER NOT NULL,
            updated_at  INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS team_members (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            team_id       INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
            user_id       TEXT NOT NULL,
            role          TEXT NOT NULL,
            joined_at     INTEGER NOT NULL,
            display_name  TEXT,
            avatar_color  TEXT,
            UNIQUE(team_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS team_tasks (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            team_id           INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
            user_id           TEXT NOT NULL,
            original_id       TEXT NOT NULL,
            uuid              TEXT NOT NULL,
            title             TEXT NOT NULL,
            content           TEXT NOT NULL DEFAULT '',
            status            TEXT NOT NULL DEFAULT 'todo',
            board_category_id INTEGER,
            created_at        INTEGER NOT NULL,
            updated_at        INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS team_memos (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            team_id           INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
            user_id           TEXT NOT NULL,
            original_id       TEXT NOT NULL,
            uuid              TEXT NOT NULL,
            title             TEXT NOT NULL,
            content           TEXT NOT NULL DEFAULT '',
            board_category_id INTEGER,
            created_at        INTEGER NOT NULL,
            updated_at        INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS comments (
            id                 INTEGER PRIMARY KEY AUTOINCREMENT,
            team_id            INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
            user_id            TEXT NOT NULL,
            target_type        TEXT NOT NULL,
            target_original_id TEXT NOT NULL,
            content            TEXT NOT NULL,
            created_at         INTEGER NOT NULL,
            updated_at         INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS team_activity_logs (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            team_id      INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
            user_id      TEXT NOT NULL,
            action_type  TEXT NOT NULL,
            target_type  TEXT NOT NULL,
            target_id    TEXT NOT NULL,
            target_title TEXT,
            metadata     TEXT,
            created_at   INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS notifications (
            id                 INTEGER PRIMARY KEY AUTOINCREMENT,
            team_id            INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
            user_id            TEXT NOT NULL,
            type               TEXT NOT NULL,
            source_type        TEXT,
            source_id          TEXT,
            target_type        TEXT,
            target_original_id TEXT,
            actor_user_id      TEXT,
            actor_display_name TEXT,
            message            TEXT NOT NULL,
            is_read            INTEGER NOT NULL DEFAULT 0,
            created_at         INTEGER NOT NULL,
            read_at            INTEGER
        );

        CREATE TABLE IF NOT EXISTS team_invitations (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            team_id      INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
            invite_code  TEXT NOT NULL UNIQUE,
            inviter_id   TEXT NOT NULL,
            role         TEXT NOT NULL DEFAULT 'member',
            status       TEXT NOT NULL DEFAULT 'active',
            created_at   INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS team_join_requests (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            team_id       INTEGER NOT NULL REFERENCES teams(id) ON DELETE CASCADE,
            user_id       TEXT NOT NULL,
            display_name  TEXT,
            status        TEXT NOT NULL DEFAULT 'pending',
            created_at    INTEGER NOT NULL,
            processed_at  INTEGER
        );
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Current wall clock in milliseconds, the resolution of every stored
/// timestamp and version token.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Next version token for a row: wall clock, bumped past the previous token
/// so same-millisecond writes still produce a strictly increasing value.
pub fn next_version(previous: i64) -> i64 {
    now_ms().max(previous + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn schema_round_trips() {
        let pool = connect("sqlite::memory:").await.unwrap();
        sqlx::query("INSERT INTO teams (name, custom_url, created_at, updated_at) VALUES ('t', 'slug', 1, 1)")
            .execute(&pool)
            .await
            .unwrap();
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM teams")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(row.0, 1);
    }

    #[tokio::test]
    async fn duplicate_membership_rejected() {
        let pool = connect("sqlite::memory:").await.unwrap();
        sqlx::query("INSERT INTO teams (name, custom_url, created_at, updated_at) VALUES ('t', 'slug', 1, 1)")
            .execute(&pool)
            .await
            .unwrap();
        let insert = "INSERT INTO team_members (team_id, user_id, role, joined_at) VALUES (1, 'u1', 'member', 1)";
        sqlx::query(insert).execute(&pool).await.unwrap();
        let err = sqlx::query(insert).execute(&pool).await.unwrap_err();
        match err {
            sqlx::Error::Database(db) => assert!(db.is_unique_violation()),
            other => panic!("expected unique violation, got {:?}", other),
        }
    }

    #[test]
    fn version_strictly_increases() {
        let now = now_ms();
        assert!(next_version(now) > now);
        // Far-future previous value still moves forward.
        assert_eq!(next_version(now + 10_000), now + 10_001);
    }
}
