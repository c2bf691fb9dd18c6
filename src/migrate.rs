use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply_schema(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Create all tables and indexes. Idempotent.
pub async fn apply_schema(pool: &SqlitePool) -> Result<()> {
    // Collected items; external_id is kind-namespaced (t3_/t1_)
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS items (
            id TEXT PRIMARY KEY,
            external_id TEXT NOT NULL UNIQUE,
            subreddit TEXT NOT NULL,
            title TEXT NOT NULL DEFAULT '',
            body TEXT NOT NULL DEFAULT '',
            author TEXT NOT NULL DEFAULT '[deleted]',
            url TEXT NOT NULL DEFAULT '',
            score INTEGER NOT NULL DEFAULT 0,
            num_comments INTEGER NOT NULL DEFAULT 0,
            created_utc INTEGER NOT NULL DEFAULT 0,
            kind TEXT NOT NULL DEFAULT 'submission',
            parent_external_id TEXT,
            collected_at INTEGER NOT NULL,
            classified INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    // One classification per item, enforced by the UNIQUE item_id
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS classifications (
            id TEXT PRIMARY KEY,
            item_id TEXT NOT NULL UNIQUE,
            pain_point_summary TEXT NOT NULL,
            category TEXT NOT NULL,
            severity INTEGER NOT NULL,
            affected_audience TEXT NOT NULL,
            potential_solutions TEXT NOT NULL DEFAULT '[]',
            market_size_tier TEXT NOT NULL DEFAULT 'Unknown',
            market_size_estimate TEXT NOT NULL DEFAULT '',
            existing_solutions TEXT NOT NULL DEFAULT '[]',
            opportunity_score INTEGER NOT NULL,
            raw_llm_response TEXT NOT NULL DEFAULT '',
            classified_at INTEGER NOT NULL,
            FOREIGN KEY (item_id) REFERENCES items(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS collection_runs (
            id TEXT PRIMARY KEY,
            started_at INTEGER NOT NULL,
            finished_at INTEGER,
            subreddits TEXT NOT NULL DEFAULT '[]',
            items_found INTEGER NOT NULL DEFAULT 0,
            items_matched INTEGER NOT NULL DEFAULT 0,
            source_errors INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'running'
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes
    for statement in [
        "CREATE INDEX IF NOT EXISTS idx_items_subreddit ON items(subreddit)",
        "CREATE INDEX IF NOT EXISTS idx_items_score ON items(score DESC)",
        "CREATE INDEX IF NOT EXISTS idx_items_classified ON items(classified)",
        "CREATE INDEX IF NOT EXISTS idx_classifications_category ON classifications(category)",
        "CREATE INDEX IF NOT EXISTS idx_classifications_score ON classifications(opportunity_score DESC)",
        "CREATE INDEX IF NOT EXISTS idx_runs_started_at ON collection_runs(started_at DESC)",
    ] {
        sqlx::query(statement).execute(pool).await?;
    }

    Ok(())
}
