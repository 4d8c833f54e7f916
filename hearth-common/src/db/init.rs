//! Database initialization
//!
//! Graceful degradation on first run [HEARTH-INIT-010]: the database file
//! and every table are created automatically when missing, and creation is
//! idempotent so any service can start first. Collaborator-owned tables
//! (groups, members, commitments, completions) are created IF NOT EXISTS
//! too so the shared database bootstraps cleanly, but the engine only ever
//! reads them.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;

    // WAL allows the query service to read while the nightly batch writes
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    // Idempotent schema creation - safe to call multiple times
    create_schema_version_table(&pool).await?;
    create_settings_table(&pool).await?;

    // Collaborator-owned tables (read-only to the engine)
    create_groups_table(&pool).await?;
    create_group_members_table(&pool).await?;
    create_commitments_table(&pool).await?;
    create_completions_table(&pool).await?;

    // Engine-owned tables
    create_daily_rates_table(&pool).await?;
    create_momentum_state_table(&pool).await?;

    init_default_settings(&pool).await?;

    Ok(pool)
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (1)")
        .execute(pool)
        .await?;
    Ok(())
}

async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_groups_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS groups (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            created_on TEXT NOT NULL,
            deleted_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_group_members_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS group_members (
            group_guid TEXT NOT NULL,
            member_guid TEXT NOT NULL,
            joined_on TEXT NOT NULL,
            removed_on TEXT,
            PRIMARY KEY (group_guid, member_guid)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_commitments_table(pool: &SqlitePool) -> Result<()> {
    // kind is not constrained here; the engine validates it and an unknown
    // kind fails only that group's run
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS commitments (
            guid TEXT PRIMARY KEY,
            group_guid TEXT NOT NULL,
            title TEXT NOT NULL,
            kind TEXT NOT NULL,
            threshold REAL,
            cadence TEXT NOT NULL DEFAULT 'daily',
            created_on TEXT NOT NULL,
            archived_on TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_completions_table(pool: &SqlitePool) -> Result<()> {
    // Append-only completion ledger; the engine never writes here
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS completions (
            member_guid TEXT NOT NULL,
            commitment_guid TEXT NOT NULL,
            date TEXT NOT NULL,
            value REAL NOT NULL,
            recorded_at TEXT NOT NULL,
            PRIMARY KEY (member_guid, commitment_guid, date)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_daily_rates_table(pool: &SqlitePool) -> Result<()> {
    // rate is NULL (not 0.0) when eligible_pairs = 0 [HEAT-RATE-020]
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS daily_rates (
            group_guid TEXT NOT NULL,
            date TEXT NOT NULL,
            eligible_pairs INTEGER NOT NULL,
            completed_pairs INTEGER NOT NULL,
            rate REAL,
            member_count INTEGER NOT NULL,
            commitment_count INTEGER NOT NULL,
            computed_at TEXT NOT NULL,
            PRIMARY KEY (group_guid, date)
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_momentum_state_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS momentum_state (
            group_guid TEXT PRIMARY KEY,
            score REAL NOT NULL DEFAULT 0.0,
            tier INTEGER NOT NULL DEFAULT 0,
            streak_days INTEGER NOT NULL DEFAULT 0,
            peak_score REAL NOT NULL DEFAULT 0.0,
            peak_date TEXT,
            computed_for TEXT,
            last_computed_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Seed default engine settings [HEARTH-INIT-020]
///
/// INSERT OR IGNORE: operator overrides survive restarts.
pub async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    let defaults: &[(&str, String)] = &[
        ("heat_sensitivity", "50.0".to_string()),
        ("heat_decay", "0.98".to_string()),
        ("heat_baseline_window_days", "7".to_string()),
        ("heat_history_cap", "30".to_string()),
        ("heat_batch_concurrency", "8".to_string()),
        ("heat_group_timeout_ms", "30000".to_string()),
        ("heat_retry_passes", "2".to_string()),
        ("heat_retry_backoff_ms", "500".to_string()),
        // Empty = no retention horizon; pruning is policy, not code
        ("heat_rate_retention_days", String::new()),
        (
            "heat_tier_table",
            serde_json::to_string(
                &crate::tiers::TierTable::default()
                    .bands()
                    .iter()
                    .map(|b| (b.upper_bound, b.tier, b.label.clone()))
                    .collect::<Vec<_>>(),
            )
            .map_err(|e| crate::Error::Internal(format!("tier table serialization: {}", e)))?,
        ),
    ];

    for (key, value) in defaults {
        sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(pool)
            .await?;
    }
    Ok(())
}
