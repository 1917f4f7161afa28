//! Applies resolution decisions to the index, one delete at a time.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::index::SearchIndex;
use crate::models::{DeleteOutcome, IndexedCopy};

/// Issues the physical deletes for copies a decision marked as droppable.
pub struct DeletionExecutor {
    index: Arc<dyn SearchIndex>,
}

impl DeletionExecutor {
    pub fn new(index: Arc<dyn SearchIndex>) -> Self {
        Self { index }
    }

    /// Delete every copy in `doomed`. Returns one outcome per copy, in
    /// input order. A failed delete never aborts the batch; the copy stays
    /// behind for the next pass to retry.
    pub async fn execute(&self, doomed: &[IndexedCopy]) -> Vec<DeleteOutcome> {
        let mut outcomes = Vec::with_capacity(doomed.len());
        for copy in doomed {
            let outcome = match self.index.delete_copy(&copy.location).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(
                        "[Delete] {} at {}/{} failed: {}",
                        copy.id, copy.location.index, copy.location.doc_id, err
                    );
                    DeleteOutcome::Failed
                }
            };
            match outcome {
                DeleteOutcome::Deleted => {
                    debug!(
                        "[Delete] removed stale copy of {} from {}/{}",
                        copy.id, copy.location.index, copy.location.doc_id
                    );
                }
                DeleteOutcome::AlreadyGone => {
                    debug!(
                        "[Delete] copy of {} already gone from {}/{}",
                        copy.id, copy.location.index, copy.location.doc_id
                    );
                }
                DeleteOutcome::Failed => {}
            }
            outcomes.push(outcome);
        }
        outcomes
    }
}
