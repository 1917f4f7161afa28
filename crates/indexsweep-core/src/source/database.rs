//! SQL paging over the primary store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;
use std::time::Duration;
use tracing::debug;

use crate::error::SweepResult;
use crate::models::{RecordRef, ReconciliationWindow};
use crate::source::RecordSource;

/// Open a small pool against the primary store. One sweep runs a single
/// query at a time, so a handful of connections is plenty.
pub async fn connect_pool(database_url: &str) -> SweepResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(30))
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Pages `id, updated_at` rows out of one table, newest first.
pub struct DatabaseSource {
    pool: PgPool,
    table: String,
    id_prefix: String,
    window: ReconciliationWindow,
    page_size: i64,
    offset: i64,
    exhausted: bool,
}

impl DatabaseSource {
    /// `table` must already be validated; it is interpolated into the query.
    pub fn new(
        pool: PgPool,
        table: &str,
        id_prefix: &str,
        window: ReconciliationWindow,
        page_size: usize,
    ) -> Self {
        Self {
            pool,
            table: table.to_string(),
            id_prefix: id_prefix.to_string(),
            window,
            page_size: page_size as i64,
            offset: 0,
            exhausted: false,
        }
    }
}

#[async_trait]
impl RecordSource for DatabaseSource {
    async fn probe(&self) -> SweepResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn next_page(&mut self) -> SweepResult<Option<Vec<RecordRef>>> {
        if self.exhausted {
            return Ok(None);
        }
        // Secondary sort on id keeps pagination stable when many rows share
        // one updated_at value.
        let sql = format!(
            "SELECT id, updated_at FROM {} \
             WHERE updated_at >= $1 AND updated_at < $2 \
             ORDER BY updated_at DESC, id DESC \
             LIMIT $3 OFFSET $4",
            self.table
        );
        let rows = sqlx::query(&sql)
            .bind(self.window.start)
            .bind(self.window.end)
            .bind(self.page_size)
            .bind(self.offset)
            .fetch_all(&self.pool)
            .await?;

        if rows.is_empty() {
            self.exhausted = true;
            return Ok(None);
        }
        if (rows.len() as i64) < self.page_size {
            // Short page: nothing can follow it.
            self.exhausted = true;
        }
        self.offset += rows.len() as i64;

        let mut page = Vec::with_capacity(rows.len());
        for row in rows {
            let id: i64 = row.try_get("id")?;
            let updated_at: DateTime<Utc> = row.try_get("updated_at")?;
            page.push(RecordRef {
                id: format!("{}{}", self.id_prefix, id),
                updated_at,
            });
        }
        debug!("[Source] db page of {} records (offset now {})", page.len(), self.offset);
        Ok(Some(page))
    }
}
