//! Cursor paging over the public API.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::error::SweepResult;
use crate::models::{RecordRef, ReconciliationWindow};
use crate::remote::RemoteClient;
use crate::source::RecordSource;

/// Cursor value that starts a fresh walk.
pub const INITIAL_CURSOR: &str = "*";

/// Fields requested per record. Anything more is wasted transfer.
const SELECT_FIELDS: &str = "id,updated_date";

/// Pages changed records out of the API with opaque cursors.
pub struct ApiSource {
    remote: RemoteClient,
    base_url: String,
    entity: String,
    mailto: Option<String>,
    window: ReconciliationWindow,
    page_size: usize,
    /// `None` once the walk is finished.
    cursor: Option<String>,
    pages_fetched: u64,
}

impl ApiSource {
    pub fn new(
        remote: RemoteClient,
        base_url: &str,
        entity: &str,
        mailto: Option<&str>,
        window: ReconciliationWindow,
        page_size: usize,
    ) -> Self {
        Self {
            remote,
            base_url: base_url.trim_end_matches('/').to_string(),
            entity: entity.to_string(),
            mailto: mailto.map(str::to_string),
            window,
            page_size,
            cursor: Some(INITIAL_CURSOR.to_string()),
            pages_fetched: 0,
        }
    }

    fn entity_url(&self) -> String {
        format!("{}/{}", self.base_url, self.entity)
    }

    fn base_query(&self, per_page: usize) -> Vec<(&'static str, String)> {
        let mut query = vec![
            ("filter", range_filter(&self.window)),
            ("per-page", per_page.to_string()),
            ("select", SELECT_FIELDS.to_string()),
        ];
        if let Some(mailto) = &self.mailto {
            query.push(("mailto", mailto.clone()));
        }
        query
    }
}

/// Filter expression limiting results to the window.
///
/// The server side treats these bounds loosely in places, so the caller
/// still drops anything outside `[start, end)` after decoding.
pub(crate) fn range_filter(window: &ReconciliationWindow) -> String {
    format!(
        "from_updated_date:{},to_updated_date:{}",
        window.start.to_rfc3339_opts(SecondsFormat::Secs, true),
        window.end.to_rfc3339_opts(SecondsFormat::Secs, true)
    )
}

#[async_trait]
impl RecordSource for ApiSource {
    async fn probe(&self) -> SweepResult<()> {
        let _: PageEnvelope = self
            .remote
            .get_json("api probe", &self.entity_url(), &self.base_query(1))
            .await?;
        Ok(())
    }

    async fn next_page(&mut self) -> SweepResult<Option<Vec<RecordRef>>> {
        let Some(cursor) = self.cursor.clone() else {
            return Ok(None);
        };
        let mut query = self.base_query(self.page_size);
        query.push(("cursor", cursor));

        let page: PageEnvelope = self
            .remote
            .get_json("api page", &self.entity_url(), &query)
            .await?;

        if self.pages_fetched == 0 {
            if let Some(count) = page.meta.count {
                debug!("[Source] api reports {} changed records in window", count);
            }
        }
        self.pages_fetched += 1;

        // An empty result list ends the walk even if a cursor came back.
        if page.results.is_empty() {
            self.cursor = None;
            return Ok(None);
        }
        self.cursor = page.meta.next_cursor.filter(|c| !c.is_empty());

        let mut records = Vec::with_capacity(page.results.len());
        for raw in page.results {
            if !self.window.contains(raw.updated_date) {
                continue;
            }
            records.push(RecordRef {
                id: raw.id,
                updated_at: raw.updated_date,
            });
        }
        Ok(Some(records))
    }
}

#[derive(Debug, Deserialize)]
struct PageEnvelope {
    meta: PageMeta,
    results: Vec<ChangedRecord>,
}

#[derive(Debug, Deserialize)]
struct PageMeta {
    #[serde(default)]
    count: Option<u64>,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChangedRecord {
    id: String,
    updated_date: DateTime<Utc>,
}
