//! Spec-crawl queue persistence
//!
//! Rows are unique by url. Discovery upserts keep an already-known external
//! id when a later sighting lacks one. Every processing attempt writes
//! exactly one terminal status and increments `attempt_count`, whatever the
//! outcome.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::domain::queue::{QueueStatus, SpecQueueRow};
use crate::utils::short_hash;

/// Error strings are truncated before persisting; some fetch errors embed
/// whole response bodies.
const MAX_ERROR_LEN: usize = 2000;

#[derive(Clone)]
pub struct QueueRepository {
    pool: Arc<SqlitePool>,
}

impl QueueRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Insert a discovered url as pending, or refresh an existing row's
    /// `updated_at`. An existing external id is preserved when the new
    /// discovery lacks one.
    pub async fn enqueue(
        &self,
        url: &str,
        external_gpu_id: Option<&str>,
        now: &str,
    ) -> Result<()> {
        let id = format!(
            "tpuq-{}",
            external_gpu_id
                .map(str::to_string)
                .unwrap_or_else(|| short_hash(url))
        );

        sqlx::query(
            r#"
            INSERT INTO gpu_specs_queue (
                id, url, external_gpu_id, status, attempt_count, created_at, updated_at
            ) VALUES (?, ?, ?, 'pending', 0, ?, ?)
            ON CONFLICT(url) DO UPDATE SET
                external_gpu_id = COALESCE(excluded.external_gpu_id, gpu_specs_queue.external_gpu_id),
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&id)
        .bind(url)
        .bind(external_gpu_id)
        .bind(now)
        .bind(now)
        .execute(&*self.pool)
        .await?;

        Ok(())
    }

    /// Load up to `limit` rows eligible for processing, stalest first.
    /// `include_failed` widens the selection to the retry-failed mode.
    pub async fn load_batch(&self, include_failed: bool, limit: i64) -> Result<Vec<SpecQueueRow>> {
        let sql = if include_failed {
            r#"
            SELECT * FROM gpu_specs_queue
            WHERE status IN ('pending', 'failed')
            ORDER BY updated_at ASC
            LIMIT ?
            "#
        } else {
            r#"
            SELECT * FROM gpu_specs_queue
            WHERE status = 'pending'
            ORDER BY updated_at ASC
            LIMIT ?
            "#
        };

        let rows = sqlx::query(sql).bind(limit).fetch_all(&*self.pool).await?;
        rows.into_iter().map(|row| Self::map_row(&row)).collect()
    }

    pub async fn get_by_url(&self, url: &str) -> Result<Option<SpecQueueRow>> {
        let row = sqlx::query("SELECT * FROM gpu_specs_queue WHERE url = ?")
            .bind(url)
            .fetch_optional(&*self.pool)
            .await?;
        row.map(|row| Self::map_row(&row)).transpose()
    }

    pub async fn mark_success(
        &self,
        row_id: &str,
        gpu_name: Option<&str>,
        payload_json: &str,
        now: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE gpu_specs_queue SET
                status = 'success',
                attempt_count = attempt_count + 1,
                last_error = NULL,
                last_attempt_at = ?,
                completed_at = ?,
                gpu_name = ?,
                payload_json = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(gpu_name)
        .bind(payload_json)
        .bind(now)
        .bind(row_id)
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    /// Fetched fine but out of catalog scope; recorded distinctly from
    /// failure so operators can tell "irrelevant" from "broken".
    pub async fn mark_skipped(
        &self,
        row_id: &str,
        gpu_name: Option<&str>,
        payload_json: &str,
        now: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE gpu_specs_queue SET
                status = 'skipped',
                attempt_count = attempt_count + 1,
                last_error = NULL,
                last_attempt_at = ?,
                completed_at = ?,
                gpu_name = ?,
                payload_json = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(gpu_name)
        .bind(payload_json)
        .bind(now)
        .bind(row_id)
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_failed(&self, row_id: &str, error: &str, now: &str) -> Result<()> {
        let truncated: String = error.chars().take(MAX_ERROR_LEN).collect();
        sqlx::query(
            r#"
            UPDATE gpu_specs_queue SET
                status = 'failed',
                attempt_count = attempt_count + 1,
                last_error = ?,
                last_attempt_at = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(truncated)
        .bind(now)
        .bind(now)
        .bind(row_id)
        .execute(&*self.pool)
        .await?;
        Ok(())
    }

    /// Row counts per status, for operator introspection.
    pub async fn status_summary(&self) -> Result<BTreeMap<String, i64>> {
        let rows = sqlx::query(
            r#"
            SELECT status, COUNT(*) AS total
            FROM gpu_specs_queue
            GROUP BY status
            ORDER BY status
            "#,
        )
        .fetch_all(&*self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| (row.get::<String, _>("status"), row.get::<i64, _>("total")))
            .collect())
    }

    fn map_row(row: &sqlx::sqlite::SqliteRow) -> Result<SpecQueueRow> {
        let status_text: String = row.get("status");
        let status = QueueStatus::parse(&status_text)
            .ok_or_else(|| anyhow::anyhow!("unknown queue status '{status_text}'"))?;

        Ok(SpecQueueRow {
            id: row.get("id"),
            url: row.get("url"),
            external_gpu_id: row.get("external_gpu_id"),
            gpu_name: row.get("gpu_name"),
            status,
            attempt_count: row.get("attempt_count"),
            last_error: row.get("last_error"),
            last_attempt_at: row.get("last_attempt_at"),
            completed_at: row.get("completed_at"),
            payload_json: row.get("payload_json"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}
