//! Secondary index boundary: bulk copy lookup and per-document delete.
//!
//! The engine only ever needs three things from the index, so the trait is
//! small on purpose. The HTTP implementation targets an Elasticsearch-style
//! search endpoint but nothing outside this module knows that.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::error::{SweepError, SweepResult};
use crate::models::{DeleteOutcome, IndexLocation, IndexedCopy};
use crate::remote::RemoteClient;

/// One document returned by a bulk lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundDoc {
    /// Logical record id the document carries.
    pub id: String,
    /// When the document was written into the index.
    pub index_timestamp: DateTime<Utc>,
    /// Physical address of the document.
    pub location: IndexLocation,
    /// The record's own last-modified field, when the index stores one.
    /// Only the audit compares it against the primary store.
    pub record_updated_at: Option<DateTime<Utc>>,
}

impl FoundDoc {
    pub fn into_copy(self) -> IndexedCopy {
        IndexedCopy {
            id: self.id,
            index_timestamp: self.index_timestamp,
            location: self.location,
        }
    }
}

/// Read and delete access to the secondary index.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Every physical copy matching any of `ids`, capped at the index's
    /// result limit. A truncated result undercounts duplicates for one
    /// pass; the overlap of the next window picks them up.
    async fn find_copies(&self, ids: &[String]) -> SweepResult<Vec<FoundDoc>>;

    /// Remove one physical document. `Ok(AlreadyGone)` covers both a
    /// missing document and a version conflict.
    async fn delete_copy(&self, location: &IndexLocation) -> SweepResult<DeleteOutcome>;

    /// Cheap liveness probe used during initialization.
    async fn ping(&self) -> SweepResult<()>;
}

/// [`SearchIndex`] over an Elasticsearch-style HTTP API.
pub struct HttpSearchIndex {
    remote: RemoteClient,
    base_url: String,
    index: String,
    result_cap: usize,
}

impl HttpSearchIndex {
    pub fn new(remote: RemoteClient, base_url: &str, index: &str, result_cap: usize) -> Self {
        Self {
            remote,
            base_url: base_url.trim_end_matches('/').to_string(),
            index: index.to_string(),
            result_cap,
        }
    }

    fn search_url(&self) -> String {
        format!("{}/{}/_search", self.base_url, self.index)
    }

    fn doc_url(&self, location: &IndexLocation) -> String {
        format!("{}/{}/_doc/{}", self.base_url, location.index, location.doc_id)
    }
}

#[async_trait]
impl SearchIndex for HttpSearchIndex {
    async fn find_copies(&self, ids: &[String]) -> SweepResult<Vec<FoundDoc>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let body = json!({
            "size": self.result_cap,
            "_source": ["id", "@timestamp", "updated"],
            "query": { "terms": { "id": ids } },
        });
        let response: SearchResponse = self
            .remote
            .post_json("index search", &self.search_url(), &body)
            .await?;

        let mut found = Vec::with_capacity(response.hits.hits.len());
        for hit in response.hits.hits {
            found.push(hit.into_found_doc()?);
        }
        debug!("[Index] lookup of {} ids matched {} docs", ids.len(), found.len());
        Ok(found)
    }

    async fn delete_copy(&self, location: &IndexLocation) -> SweepResult<DeleteOutcome> {
        let status = self
            .remote
            .delete("index delete", &self.doc_url(location))
            .await?;
        match status {
            404 | 409 => Ok(DeleteOutcome::AlreadyGone),
            _ => Ok(DeleteOutcome::Deleted),
        }
    }

    async fn ping(&self) -> SweepResult<()> {
        let _: serde_json::Value = self
            .remote
            .get_json("index ping", &format!("{}/", self.base_url), &[])
            .await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: SearchHits,
}

#[derive(Debug, Deserialize)]
struct SearchHits {
    hits: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    #[serde(rename = "_index")]
    index: String,
    #[serde(rename = "_id")]
    doc_id: String,
    #[serde(rename = "_source")]
    source: HitSource,
}

#[derive(Debug, Deserialize)]
struct HitSource {
    id: Option<String>,
    #[serde(rename = "@timestamp")]
    timestamp: Option<DateTime<Utc>>,
    updated: Option<DateTime<Utc>>,
}

impl SearchHit {
    /// A hit without an id or write timestamp cannot be ordered against its
    /// siblings, so it poisons the whole batch rather than being guessed at.
    fn into_found_doc(self) -> SweepResult<FoundDoc> {
        let id = self.source.id.ok_or(SweepError::Malformed {
            context: "index search",
            detail: "hit missing _source.id".to_string(),
        })?;
        let index_timestamp = self.source.timestamp.ok_or(SweepError::Malformed {
            context: "index search",
            detail: "hit missing _source.@timestamp".to_string(),
        })?;
        Ok(FoundDoc {
            id,
            index_timestamp,
            location: IndexLocation {
                index: self.index,
                doc_id: self.doc_id,
            },
            record_updated_at: self.source.updated,
        })
    }
}
