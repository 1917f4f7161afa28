//! Retention policy: the newest write wins.

use tracing::warn;

use crate::models::{IndexedCopy, ResolutionDecision};

/// Decide which copy of `id` survives.
///
/// Copies are ranked by index write time, newest first, with the physical
/// address as a tie break so reruns over identical state always pick the
/// same survivor. Returns `None` only for an empty input.
pub fn resolve(id: &str, mut copies: Vec<IndexedCopy>) -> Option<ResolutionDecision> {
    if copies.is_empty() {
        return None;
    }
    copies.sort_by(|a, b| {
        b.index_timestamp
            .cmp(&a.index_timestamp)
            .then_with(|| b.location.doc_id.cmp(&a.location.doc_id))
            .then_with(|| b.location.index.cmp(&a.location.index))
    });
    if copies.len() > 2 {
        warn!("[Resolve] record {} has {} indexed copies", id, copies.len());
    }
    let keep = copies.remove(0);
    Some(ResolutionDecision {
        id: id.to_string(),
        keep,
        drop: copies,
    })
}

#[cfg(test)]
#[path = "resolve_tests.rs"]
mod resolve_tests;
