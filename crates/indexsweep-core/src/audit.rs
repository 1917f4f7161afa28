//! Read-only consistency audit over a wider trailing window.
//!
//! Walks the same enumerate-then-lookup pipeline as a sweep but never
//! deletes. Classifies every record as unique, duplicated, missing from
//! the index, or carrying a stale last-modified timestamp.

use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::SweepConfig;
use crate::detect::DuplicateDetector;
use crate::error::{SweepError, SweepResult};
use crate::models::ReconciliationWindow;
use crate::pass::{connect_index, connect_source};
use crate::source::RecordSource;

/// Counters accumulated over one audit.
#[derive(Debug, Clone, Serialize)]
pub struct AuditSummary {
    pub window: ReconciliationWindow,
    /// Records enumerated from the primary store.
    pub scanned: u64,
    /// Records with more than one indexed copy.
    pub duplicates: u64,
    /// Records the index has no copy of at all.
    pub missing_from_index: u64,
    /// Records whose sole indexed copy carries a different last-modified
    /// timestamp than the primary store (millisecond precision).
    pub mismatched_timestamps: u64,
    pub pages: u64,
    pub pages_skipped: u64,
    pub elapsed_ms: u64,
}

impl AuditSummary {
    fn new(window: ReconciliationWindow) -> Self {
        Self {
            window,
            scanned: 0,
            duplicates: 0,
            missing_from_index: 0,
            mismatched_timestamps: 0,
            pages: 0,
            pages_skipped: 0,
            elapsed_ms: 0,
        }
    }

    /// True when the audited slice of the corpus is fully consistent.
    pub fn is_clean(&self) -> bool {
        self.duplicates == 0
            && self.missing_from_index == 0
            && self.mismatched_timestamps == 0
            && self.pages_skipped == 0
    }
}

/// Drives one audit from window computation to summary.
pub struct AuditRunner {
    run_id: String,
    window: ReconciliationWindow,
    source: Box<dyn RecordSource>,
    detector: DuplicateDetector,
}

impl AuditRunner {
    /// Connect and probe, like a sweep, but over the audit window.
    pub async fn initialize(config: &SweepConfig) -> SweepResult<Self> {
        let window = config.audit_window(Utc::now());
        let run_id = crate::pass::short_run_id();
        info!("[Audit {}] initializing for window {}", run_id, window);
        config.validate()?;

        let index = connect_index(config)?;
        index
            .ping()
            .await
            .map_err(|e| SweepError::Init(format!("index unreachable: {e}")))?;

        let source = connect_source(config, window).await?;
        source
            .probe()
            .await
            .map_err(|e| SweepError::Init(format!("source unreachable: {e}")))?;

        Ok(Self {
            run_id,
            window,
            source,
            detector: DuplicateDetector::new(index, config.batch_cap),
        })
    }

    /// Run the audit to completion. Read-only; always ends in a summary.
    pub async fn run(mut self) -> AuditSummary {
        let started = Instant::now();
        let mut summary = AuditSummary::new(self.window);
        info!("[Audit {}] audit started for window {}", self.run_id, self.window);

        loop {
            let page = match self.source.next_page().await {
                Ok(Some(page)) => page,
                Ok(None) => break,
                Err(err) => {
                    error!(
                        "[Audit {}] enumeration failed, ending audit early: {}",
                        self.run_id, err
                    );
                    break;
                }
            };
            summary.pages += 1;
            summary.scanned += page.len() as u64;
            if page.is_empty() {
                continue;
            }

            let ids: Vec<String> = page.iter().map(|r| r.id.clone()).collect();
            let report = match self.detector.detect(&ids).await {
                Ok(report) => report,
                Err(err) => {
                    warn!(
                        "[Audit {}] lookup failed, skipping page of {}: {}",
                        self.run_id,
                        ids.len(),
                        err
                    );
                    summary.pages_skipped += 1;
                    continue;
                }
            };

            for record in &page {
                match report.copy_count(&record.id) {
                    0 => {
                        debug!("[Audit {}] {} not in index", self.run_id, record.id);
                        summary.missing_from_index += 1;
                    }
                    1 => {
                        let indexed = report
                            .sole_copy(&record.id)
                            .and_then(|doc| doc.record_updated_at);
                        if timestamps_differ(record.updated_at, indexed) {
                            debug!(
                                "[Audit {}] {} timestamps differ, store {} vs index {:?}",
                                self.run_id, record.id, record.updated_at, indexed
                            );
                            summary.mismatched_timestamps += 1;
                        }
                    }
                    n => {
                        debug!("[Audit {}] {} has {} copies in index", self.run_id, record.id, n);
                        summary.duplicates += 1;
                    }
                }
            }
        }

        summary.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            run_id = %self.run_id,
            window = %summary.window,
            scanned = summary.scanned,
            duplicates = summary.duplicates,
            missing = summary.missing_from_index,
            mismatched = summary.mismatched_timestamps,
            pages = summary.pages,
            pages_skipped = summary.pages_skipped,
            elapsed_ms = summary.elapsed_ms,
            "[Audit] audit complete"
        );
        summary
    }
}

/// Compare at millisecond precision. The index rounds sub-millisecond
/// digits away, so finer differences are not real drift. A missing index
/// timestamp always counts as a mismatch.
fn timestamps_differ(store: DateTime<Utc>, indexed: Option<DateTime<Utc>>) -> bool {
    match indexed {
        Some(indexed) => indexed.timestamp_millis() != store.timestamp_millis(),
        None => true,
    }
}
