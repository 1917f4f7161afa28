//! Changed-record enumeration over the reconciliation window.
//!
//! Two interchangeable sources: direct SQL paging over the primary store,
//! and cursor paging over the public API. The orchestrator only sees the
//! [`RecordSource`] trait.

mod api;
mod database;

pub use api::ApiSource;
pub use database::{connect_pool, DatabaseSource};

use async_trait::async_trait;

use crate::error::SweepResult;
use crate::models::RecordRef;

/// A paged stream of records whose `updated_at` falls inside the window.
#[async_trait]
pub trait RecordSource: Send {
    /// Verify the source is reachable. Runs once, before the first page.
    async fn probe(&self) -> SweepResult<()>;

    /// The next page, or `None` once the window is exhausted.
    ///
    /// A returned page may be empty (records filtered at the boundary)
    /// without meaning exhaustion; only `None` ends the stream.
    async fn next_page(&mut self) -> SweepResult<Option<Vec<RecordRef>>>;
}
