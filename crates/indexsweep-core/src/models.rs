//! Core data models shared across the reconciliation pipeline.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// One logical record as reported by the primary store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordRef {
    /// Globally unique record id (already carries any id prefix, e.g. "W123").
    pub id: String,
    /// Last-modified timestamp according to the primary store.
    pub updated_at: DateTime<Utc>,
}

/// Physical address of one document inside the secondary index.
///
/// Two copies of the same logical record always differ in at least one of
/// these fields, so the pair is what the deletion executor targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexLocation {
    /// Concrete index (or shard alias) holding the document.
    pub index: String,
    /// Document handle within that index.
    pub doc_id: String,
}

/// One physical copy of a logical record found in the secondary index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedCopy {
    /// Logical record id this copy claims to represent.
    pub id: String,
    /// When this copy was written into the index.
    pub index_timestamp: DateTime<Utc>,
    /// Where this copy physically lives.
    pub location: IndexLocation,
}

/// Half-open time interval `[start, end)` over which changed records are
/// enumerated. The trailing lag keeps the window clear of in-flight writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconciliationWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ReconciliationWindow {
    /// Window ending `lag` before `now` and extending `width` back from there.
    pub fn trailing(now: DateTime<Utc>, lag: Duration, width: Duration) -> Self {
        let end = now - lag;
        Self { start: end - width, end }
    }

    /// Membership test honoring the half-open bounds: `start` is in, `end` is out.
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        t >= self.start && t < self.end
    }
}

impl std::fmt::Display for ReconciliationWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {})",
            self.start.to_rfc3339_opts(SecondsFormat::Secs, true),
            self.end.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
    }
}

/// Which copies of one logical record survive and which get removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionDecision {
    pub id: String,
    /// The single copy that stays in the index.
    pub keep: IndexedCopy,
    /// Every other copy, ordered newest first. May be empty.
    pub drop: Vec<IndexedCopy>,
}

/// Terminal outcome of one physical delete attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// The index acknowledged removal of the document.
    Deleted,
    /// The document was no longer there (missing or version conflict).
    /// Another actor got to it first; the goal state is reached either way.
    AlreadyGone,
    /// The delete could not be completed this pass. Left for the next run.
    Failed,
}

/// Counters accumulated over one reconciliation pass.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub window: ReconciliationWindow,
    /// Records enumerated from the primary store.
    pub scanned: u64,
    /// Logical records that had more than one indexed copy.
    pub duplicates_found: u64,
    /// Physical copies actually removed.
    pub deleted: u64,
    /// Copies that were gone before we deleted them (404 / version conflict).
    pub already_gone: u64,
    /// Copies whose delete failed and was left for a later pass.
    pub delete_failures: u64,
    /// Records holding three or more copies.
    pub ambiguous: u64,
    /// Pages fetched from the primary store.
    pub pages: u64,
    /// Pages dropped after a lookup kept failing. Recounted next pass.
    pub pages_skipped: u64,
    pub elapsed_ms: u64,
}

impl RunSummary {
    pub fn new(window: ReconciliationWindow) -> Self {
        Self {
            window,
            scanned: 0,
            duplicates_found: 0,
            deleted: 0,
            already_gone: 0,
            delete_failures: 0,
            ambiguous: 0,
            pages: 0,
            pages_skipped: 0,
            elapsed_ms: 0,
        }
    }

    /// Fold one delete outcome into the counters.
    pub fn record_outcome(&mut self, outcome: DeleteOutcome) {
        match outcome {
            DeleteOutcome::Deleted => self.deleted += 1,
            DeleteOutcome::AlreadyGone => self.already_gone += 1,
            DeleteOutcome::Failed => self.delete_failures += 1,
        }
    }
}
