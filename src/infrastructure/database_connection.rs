//! Database connection and pool management
//!
//! SQLite via sqlx, with the schema created in place. Timestamps are stored
//! as ISO-8601 TEXT so lexical ordering matches chronological ordering.

use std::path::Path;

use anyhow::{Context, Result};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;

pub struct DatabaseConnection {
    pool: SqlitePool,
}

impl DatabaseConnection {
    /// Open (creating the file if necessary) and pool a SQLite database.
    /// `sqlite::memory:` is accepted for ephemeral use.
    pub async fn new(database_url: &str) -> Result<Self> {
        let db_path = database_url
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:");

        if db_path != ":memory:" && !db_path.is_empty() {
            if let Some(parent) = Path::new(db_path).parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .with_context(|| format!("failed to create database directory {parent:?}"))?;
                }
            }
            if !Path::new(db_path).exists() {
                std::fs::File::create(db_path)
                    .with_context(|| format!("failed to create database file {db_path}"))?;
            }
        }

        // A pooled in-memory database must stay on one connection; every
        // extra connection would see its own empty database.
        let max_connections = if db_path == ":memory:" { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .with_context(|| format!("failed to connect to {database_url}"))?;

        Ok(Self { pool })
    }

    /// An in-memory database, for tests and dry runs.
    pub async fn in_memory() -> Result<Self> {
        Self::new("sqlite::memory:").await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Create the ingestion tables if they do not exist yet.
    pub async fn migrate(&self) -> Result<()> {
        let create_categories_sql = r#"
            CREATE TABLE IF NOT EXISTS categories (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                slug TEXT NOT NULL UNIQUE,
                icon TEXT,
                sort_order INTEGER NOT NULL DEFAULT 0
            )
        "#;

        let create_source_offers_sql = r#"
            CREATE TABLE IF NOT EXISTS source_offers (
                id TEXT PRIMARY KEY,
                store TEXT NOT NULL,
                external_id TEXT,
                category_id TEXT NOT NULL REFERENCES categories (id),
                component_id TEXT,
                title TEXT NOT NULL,
                normalized_name TEXT NOT NULL,
                brand TEXT,
                model TEXT,
                price INTEGER NOT NULL,
                currency TEXT NOT NULL DEFAULT 'BRL',
                in_stock BOOLEAN NOT NULL DEFAULT 1,
                stock_text TEXT,
                url TEXT NOT NULL,
                image_url TEXT,
                meta_json TEXT,
                last_seen_at TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
        "#;

        let create_price_history_sql = r#"
            CREATE TABLE IF NOT EXISTS price_history (
                id TEXT PRIMARY KEY,
                source_offer_id TEXT NOT NULL REFERENCES source_offers (id),
                price INTEGER NOT NULL,
                currency TEXT NOT NULL DEFAULT 'BRL',
                in_stock BOOLEAN NOT NULL DEFAULT 1,
                captured_at TEXT NOT NULL
            )
        "#;

        let create_queue_sql = r#"
            CREATE TABLE IF NOT EXISTS gpu_specs_queue (
                id TEXT PRIMARY KEY,
                url TEXT NOT NULL UNIQUE,
                external_gpu_id TEXT,
                gpu_name TEXT,
                status TEXT NOT NULL DEFAULT 'pending',
                attempt_count INTEGER NOT NULL DEFAULT 0,
                last_error TEXT,
                last_attempt_at TEXT,
                completed_at TEXT,
                payload_json TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
        "#;

        let create_indexes_sql = [
            "CREATE INDEX IF NOT EXISTS idx_source_offers_category ON source_offers (category_id)",
            "CREATE INDEX IF NOT EXISTS idx_source_offers_store ON source_offers (store)",
            "CREATE INDEX IF NOT EXISTS idx_price_history_offer_captured ON price_history (source_offer_id, captured_at)",
            "CREATE INDEX IF NOT EXISTS idx_gpu_specs_queue_status_updated ON gpu_specs_queue (status, updated_at)",
        ];

        sqlx::query(create_categories_sql).execute(&self.pool).await?;
        sqlx::query(create_source_offers_sql).execute(&self.pool).await?;
        sqlx::query(create_price_history_sql).execute(&self.pool).await?;
        sqlx::query(create_queue_sql).execute(&self.pool).await?;
        for index_sql in create_indexes_sql {
            sqlx::query(index_sql).execute(&self.pool).await?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn migration_creates_all_tables() -> Result<()> {
        let db = DatabaseConnection::in_memory().await?;
        db.migrate().await?;

        for table in ["categories", "source_offers", "price_history", "gpu_specs_queue"] {
            let row =
                sqlx::query("SELECT name FROM sqlite_master WHERE type='table' AND name = ?")
                    .bind(table)
                    .fetch_optional(db.pool())
                    .await?;
            assert!(row.is_some(), "missing table {table}");
        }
        Ok(())
    }

    #[tokio::test]
    async fn migration_is_idempotent() -> Result<()> {
        let db = DatabaseConnection::in_memory().await?;
        db.migrate().await?;
        db.migrate().await?;
        Ok(())
    }
}
