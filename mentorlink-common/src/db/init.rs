//! Database initialization
//!
//! Creates the SQLite database on first run and brings the schema up
//! idempotently (`CREATE TABLE IF NOT EXISTS` throughout, safe to call on
//! every startup).
//!
//! Document layout: `academic_years.doc` holds the nested
//! sessions -> semesters -> sections tree for one year as a JSON array of
//! sessions; `mentor_meetings.doc` holds the meeting list of one
//! (mentor, year, session) container. A single-row compare-and-swap UPDATE
//! of either column is the per-document atomic write the mutation layer
//! relies on.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    configure_pragmas(&pool).await?;
    create_tables(&pool).await?;

    Ok(pool)
}

/// In-memory database for tests
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    configure_pragmas(&pool).await?;
    create_tables(&pool).await?;
    Ok(pool)
}

async fn configure_pragmas(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;

    // WAL allows concurrent readers with one writer
    sqlx::query("PRAGMA journal_mode = WAL").execute(pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(pool).await?;

    Ok(())
}

async fn create_tables(pool: &SqlitePool) -> Result<()> {
    create_academic_years_table(pool).await?;
    create_mentor_meetings_table(pool).await?;
    create_mentors_table(pool).await?;
    create_mentees_table(pool).await?;
    Ok(())
}

/// One row per academic year; `doc` is the nested session tree.
/// The `(start_year, end_year)` pair is unique across the store.
async fn create_academic_years_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS academic_years (
            guid TEXT PRIMARY KEY,
            start_year INTEGER NOT NULL,
            end_year INTEGER NOT NULL,
            doc TEXT NOT NULL DEFAULT '[]',
            UNIQUE(start_year, end_year)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// One row per (mentor, year, session); `doc` is the meeting list.
async fn create_mentor_meetings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS mentor_meetings (
            guid TEXT PRIMARY KEY,
            mentor_mujid TEXT NOT NULL,
            start_year INTEGER NOT NULL,
            end_year INTEGER NOT NULL,
            session_name TEXT NOT NULL,
            doc TEXT NOT NULL DEFAULT '[]',
            UNIQUE(mentor_mujid, start_year, end_year, session_name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_mentor_meetings_scope
         ON mentor_meetings (start_year, end_year, session_name)",
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_mentors_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS mentors (
            mujid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            phone TEXT,
            role TEXT NOT NULL DEFAULT 'mentor',
            meetings_scheduled INTEGER NOT NULL DEFAULT 0,
            assigned_mentees TEXT NOT NULL DEFAULT '[]'
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_mentees_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS mentees (
            mujid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            phone TEXT,
            mentor_mujid TEXT,
            semester INTEGER NOT NULL,
            section TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_mentees_mentor ON mentees (mentor_mujid)",
    )
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("mentorlink.db");

        let pool = init_database(&db_path).await.expect("init should succeed");
        assert!(db_path.exists());

        // Schema must be queryable
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM academic_years")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("mentorlink.db");

        let pool = init_database(&db_path).await.unwrap();
        sqlx::query("INSERT INTO mentors (mujid, name, email) VALUES ('M1', 'A', 'a@x.edu')")
            .execute(&pool)
            .await
            .unwrap();
        drop(pool);

        // Re-opening must not clobber existing data
        let pool = init_database(&db_path).await.unwrap();
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM mentors")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn test_duplicate_year_rejected_by_schema() {
        let pool = init_memory_database().await.unwrap();

        sqlx::query(
            "INSERT INTO academic_years (guid, start_year, end_year) VALUES ('g1', 2023, 2024)",
        )
        .execute(&pool)
        .await
        .unwrap();

        let dup = sqlx::query(
            "INSERT INTO academic_years (guid, start_year, end_year) VALUES ('g2', 2023, 2024)",
        )
        .execute(&pool)
        .await;
        assert!(dup.is_err());
    }
}
