//! Batched duplicate lookup against the secondary index.
//!
//! One page of records becomes one bulk query (chunked if the page is
//! larger than the index's terms cap). The report keeps every matched
//! document so the pass and the audit can both work off a single lookup.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::SweepResult;
use crate::index::{FoundDoc, SearchIndex};

/// Groups bulk-lookup results by logical record id.
pub struct DuplicateDetector {
    index: Arc<dyn SearchIndex>,
    batch_cap: usize,
}

impl DuplicateDetector {
    pub fn new(index: Arc<dyn SearchIndex>, batch_cap: usize) -> Self {
        Self { index, batch_cap }
    }

    /// Look up every id and group the copies found for each.
    ///
    /// Ids with no match simply have no entry; the audit distinguishes
    /// missing from unique, the pass only cares about counts above one.
    pub async fn detect(&self, ids: &[String]) -> SweepResult<DetectReport> {
        let mut found: BTreeMap<String, Vec<FoundDoc>> = BTreeMap::new();
        let mut matched = 0usize;
        for chunk in ids.chunks(self.batch_cap) {
            let docs = self.index.find_copies(chunk).await?;
            matched += docs.len();
            for doc in docs {
                found.entry(doc.id.clone()).or_default().push(doc);
            }
        }
        debug!("[Detect] {} ids matched {} indexed docs", ids.len(), matched);
        Ok(DetectReport { found })
    }
}

/// Everything one lookup learned, keyed by record id.
pub struct DetectReport {
    found: BTreeMap<String, Vec<FoundDoc>>,
}

impl DetectReport {
    /// How many physical copies the index holds for `id`.
    pub fn copy_count(&self, id: &str) -> usize {
        self.found.get(id).map_or(0, Vec::len)
    }

    /// The one copy of `id`, when exactly one exists.
    pub fn sole_copy(&self, id: &str) -> Option<&FoundDoc> {
        match self.found.get(id).map(Vec::as_slice) {
            Some([only]) => Some(only),
            _ => None,
        }
    }

    /// Ids holding more than one copy, in stable id order.
    pub fn duplicates(&self) -> impl Iterator<Item = (&str, &[FoundDoc])> {
        self.found
            .iter()
            .filter(|(_, docs)| docs.len() > 1)
            .map(|(id, docs)| (id.as_str(), docs.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::Mutex;

    use crate::models::{DeleteOutcome, IndexLocation};

    struct FakeIndex {
        docs: Vec<FoundDoc>,
        batch_sizes: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl SearchIndex for FakeIndex {
        async fn find_copies(&self, ids: &[String]) -> SweepResult<Vec<FoundDoc>> {
            self.batch_sizes.lock().unwrap().push(ids.len());
            Ok(self
                .docs
                .iter()
                .filter(|d| ids.contains(&d.id))
                .cloned()
                .collect())
        }

        async fn delete_copy(&self, _location: &IndexLocation) -> SweepResult<DeleteOutcome> {
            Ok(DeleteOutcome::Deleted)
        }

        async fn ping(&self) -> SweepResult<()> {
            Ok(())
        }
    }

    fn doc(id: &str, ts: &str, doc_id: &str) -> FoundDoc {
        FoundDoc {
            id: id.to_string(),
            index_timestamp: ts.parse::<DateTime<Utc>>().unwrap(),
            location: IndexLocation {
                index: "works-a".to_string(),
                doc_id: doc_id.to_string(),
            },
            record_updated_at: None,
        }
    }

    fn ids(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn groups_copies_by_record_id() {
        let index = Arc::new(FakeIndex {
            docs: vec![
                doc("W1", "2026-08-20T09:00:00Z", "a"),
                doc("W1", "2026-08-20T08:00:00Z", "b"),
                doc("W2", "2026-08-20T09:00:00Z", "c"),
            ],
            batch_sizes: Mutex::new(Vec::new()),
        });
        let detector = DuplicateDetector::new(index, 2000);
        let report = detector.detect(&ids(&["W1", "W2", "W3"])).await.unwrap();

        assert_eq!(report.copy_count("W1"), 2);
        assert_eq!(report.copy_count("W2"), 1);
        assert_eq!(report.copy_count("W3"), 0);

        let dupes: Vec<&str> = report.duplicates().map(|(id, _)| id).collect();
        assert_eq!(dupes, vec!["W1"]);
    }

    #[tokio::test]
    async fn sole_copy_requires_exactly_one_match() {
        let index = Arc::new(FakeIndex {
            docs: vec![
                doc("W1", "2026-08-20T09:00:00Z", "a"),
                doc("W1", "2026-08-20T08:00:00Z", "b"),
                doc("W2", "2026-08-20T09:00:00Z", "c"),
            ],
            batch_sizes: Mutex::new(Vec::new()),
        });
        let detector = DuplicateDetector::new(index, 2000);
        let report = detector.detect(&ids(&["W1", "W2"])).await.unwrap();

        assert!(report.sole_copy("W1").is_none(), "two copies is not sole");
        assert_eq!(report.sole_copy("W2").map(|d| d.location.doc_id.as_str()), Some("c"));
        assert!(report.sole_copy("W9").is_none());
    }

    #[tokio::test]
    async fn large_pages_are_chunked_to_the_batch_cap() {
        let index = Arc::new(FakeIndex {
            docs: Vec::new(),
            batch_sizes: Mutex::new(Vec::new()),
        });
        let detector = DuplicateDetector::new(Arc::<FakeIndex>::clone(&index), 2);
        let many = ids(&["W1", "W2", "W3", "W4", "W5"]);
        detector.detect(&many).await.unwrap();

        assert_eq!(*index.batch_sizes.lock().unwrap(), vec![2, 2, 1]);
    }
}
