//! One full reconciliation pass: enumerate, detect, resolve, delete, summarize.
//!
//! Initialization is the only phase allowed to fail the run. Once deletes
//! may have happened, the pass always finishes with a summary; partial
//! failures are folded into its counters and the overlapping window of the
//! next pass recounts whatever was skipped.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::{SourceMode, SweepConfig};
use crate::detect::DuplicateDetector;
use crate::error::{SweepError, SweepResult};
use crate::executor::DeletionExecutor;
use crate::index::{FoundDoc, HttpSearchIndex, SearchIndex};
use crate::models::{ReconciliationWindow, RunSummary};
use crate::remote::RemoteClient;
use crate::resolve::resolve;
use crate::retry::RetryPolicy;
use crate::source::{connect_pool, ApiSource, DatabaseSource, RecordSource};

/// Pipeline states, in the order a pass moves through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassState {
    Initializing,
    Enumerating,
    Detecting,
    Resolving,
    Deleting,
    Summarizing,
    Done,
}

/// Drives one pass from window computation to summary.
pub struct PassRunner {
    run_id: String,
    window: ReconciliationWindow,
    source: Box<dyn RecordSource>,
    detector: DuplicateDetector,
    executor: DeletionExecutor,
    state: PassState,
}

impl PassRunner {
    /// Validate config, connect both stores, and probe them.
    ///
    /// Every error here is fatal to the run: a pass that cannot see both
    /// sides must not delete anything.
    pub async fn initialize(config: &SweepConfig) -> SweepResult<Self> {
        let window = config.window(Utc::now());
        Self::initialize_for(config, window).await
    }

    pub(crate) async fn initialize_for(
        config: &SweepConfig,
        window: ReconciliationWindow,
    ) -> SweepResult<Self> {
        let run_id = short_run_id();
        info!("[Sweep {}] initializing for window {}", run_id, window);
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
            detector: DuplicateDetector::new(Arc::clone(&index), config.batch_cap),
            executor: DeletionExecutor::new(index),
            state: PassState::Initializing,
        })
    }

    pub fn window(&self) -> ReconciliationWindow {
        self.window
    }

    /// Run the pass to completion. Never fails: whatever happens after
    /// initialization ends in a summary.
    pub async fn run(mut self) -> RunSummary {
        let started = Instant::now();
        let mut summary = RunSummary::new(self.window);
        info!("[Sweep {}] pass started for window {}", self.run_id, self.window);

        loop {
            self.enter(PassState::Enumerating);
            let page = match self.source.next_page().await {
                Ok(Some(page)) => page,
                Ok(None) => break,
                Err(err) => {
                    // Losing the page stream loses our position in it, so
                    // the pass ends early; the next window recounts.
                    error!(
                        "[Sweep {}] enumeration failed, ending pass early: {}",
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

            self.enter(PassState::Detecting);
            let ids: Vec<String> = page.iter().map(|r| r.id.clone()).collect();
            let report = match self.detector.detect(&ids).await {
                Ok(report) => report,
                Err(err) => {
                    warn!(
                        "[Sweep {}] lookup failed, skipping page of {}: {}",
                        self.run_id,
                        ids.len(),
                        err
                    );
                    summary.pages_skipped += 1;
                    continue;
                }
            };

            self.enter(PassState::Resolving);
            for (id, docs) in report.duplicates() {
                summary.duplicates_found += 1;
                if docs.len() > 2 {
                    summary.ambiguous += 1;
                }
                let copies = docs.iter().cloned().map(FoundDoc::into_copy).collect();
                let Some(decision) = resolve(id, copies) else {
                    continue;
                };

                self.enter(PassState::Deleting);
                for outcome in self.executor.execute(&decision.drop).await {
                    summary.record_outcome(outcome);
                }
            }
        }

        self.enter(PassState::Summarizing);
        summary.elapsed_ms = started.elapsed().as_millis() as u64;
        info!(
            run_id = %self.run_id,
            window = %summary.window,
            scanned = summary.scanned,
            duplicates = summary.duplicates_found,
            deleted = summary.deleted,
            already_gone = summary.already_gone,
            delete_failures = summary.delete_failures,
            ambiguous = summary.ambiguous,
            pages = summary.pages,
            pages_skipped = summary.pages_skipped,
            elapsed_ms = summary.elapsed_ms,
            "[Sweep] pass complete"
        );
        self.enter(PassState::Done);
        summary
    }

    fn enter(&mut self, next: PassState) {
        if self.state != next {
            debug!("[Sweep {}] {:?} -> {:?}", self.run_id, self.state, next);
            self.state = next;
        }
    }
}

/// Short id correlating all log lines of one run.
pub(crate) fn short_run_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

/// Short policy with the budget the config asks for.
fn pass_policy(config: &SweepConfig) -> RetryPolicy {
    RetryPolicy {
        budget: Duration::from_secs(config.retry_budget_secs),
        ..RetryPolicy::short()
    }
}

pub(crate) fn connect_index(config: &SweepConfig) -> SweepResult<Arc<dyn SearchIndex>> {
    let remote = RemoteClient::new(pass_policy(config))?;
    Ok(Arc::new(HttpSearchIndex::new(
        remote,
        &config.index_url,
        &config.index_name,
        config.result_cap,
    )))
}

pub(crate) async fn connect_source(
    config: &SweepConfig,
    window: ReconciliationWindow,
) -> SweepResult<Box<dyn RecordSource>> {
    match config.source {
        SourceMode::Database => {
            let url = config
                .database_url
                .as_deref()
                .ok_or_else(|| SweepError::Config("database url missing".to_string()))?;
            let pool = connect_pool(url)
                .await
                .map_err(|e| SweepError::Init(format!("database unreachable: {e}")))?;
            Ok(Box::new(DatabaseSource::new(
                pool,
                &config.record_table,
                &config.id_prefix,
                window,
                config.page_size,
            )))
        }
        SourceMode::Api => {
            let base = config
                .api_base_url
                .as_deref()
                .ok_or_else(|| SweepError::Config("api url missing".to_string()))?;
            let remote = RemoteClient::new(pass_policy(config))?;
            Ok(Box::new(ApiSource::new(
                remote,
                base,
                &config.api_entity,
                config.mailto.as_deref(),
                window,
                config.page_size,
            )))
        }
    }
}
