//! # Indexsweep Core
//!
//! Reconciliation engine keeping a secondary search index free of duplicate
//! copies of recently changed records.
//!
//! ## Pipeline
//!
//! ```text
//! indexsweep-core/src/
//! ├── source/      # Windowed enumeration (SQL paging or API cursors)
//! ├── detect.rs    # Bulk copy lookup, grouped per record
//! ├── resolve.rs   # Newest-write-wins retention policy
//! ├── executor.rs  # Idempotent per-document deletes
//! ├── pass.rs      # One sweep wiring the stages in order
//! ├── audit.rs     # Read-only consistency check over a wider window
//! └── stats.rs     # Corpus-level entity counts
//! ```
//!
//! A pass only deletes copies ranked strictly older than the survivor, so
//! rerunning over unchanged state is a no-op and two overlapping runs
//! converge on the same end state.

pub mod audit;
pub mod config;
pub mod detect;
pub mod error;
pub mod executor;
pub mod index;
pub mod models;
pub mod pass;
pub mod remote;
pub mod resolve;
pub mod retry;
pub mod source;
pub mod stats;

// Re-export commonly used types
pub use audit::{AuditRunner, AuditSummary};
pub use config::{SourceMode, SweepConfig};
pub use error::{SweepError, SweepResult};
pub use models::{
    DeleteOutcome, IndexLocation, IndexedCopy, ReconciliationWindow, RecordRef,
    ResolutionDecision, RunSummary,
};
pub use pass::{PassRunner, PassState};
