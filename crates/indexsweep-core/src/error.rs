//! Unified error types for the reconciliation engine.

use serde::Serialize;
use thiserror::Error;

/// Main error type for all sweep operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SweepError {
    /// Primary store query failed (PostgreSQL).
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Network request failed before a response arrived (HTTP client).
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The remote answered with a status that retrying will not fix.
    #[error("Remote returned {status} from {context}: {body}")]
    Status {
        context: &'static str,
        status: u16,
        body: String,
    },

    /// The remote answered 2xx but the body did not match the expected shape.
    #[error("Malformed response from {context}: {detail}")]
    Malformed {
        context: &'static str,
        detail: String,
    },

    /// The retry budget ran out before the remote recovered.
    #[error("Retry budget exhausted after {waited_ms}ms: {source}")]
    RetryExhausted {
        waited_ms: u64,
        #[source]
        source: Box<SweepError>,
    },

    /// Configuration loading or validation failed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A dependency could not be reached during startup.
    #[error("Initialization error: {0}")]
    Init(String),
}

impl SweepError {
    /// Whether a retry of the same request could plausibly succeed.
    ///
    /// Transport failures, undecodable bodies, and throttling or server-side
    /// statuses qualify. Client errors other than 429 never do.
    pub fn is_retryable(&self) -> bool {
        match self {
            SweepError::Network(_) | SweepError::Malformed { .. } => true,
            SweepError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl Serialize for SweepError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.to_string().as_str())
    }
}

/// Result type alias for sweep operations.
pub type SweepResult<T> = Result<T, SweepError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification_follows_status_class() {
        let throttled = SweepError::Status {
            context: "index",
            status: 429,
            body: String::new(),
        };
        let server_err = SweepError::Status {
            context: "index",
            status: 503,
            body: String::new(),
        };
        let not_found = SweepError::Status {
            context: "index",
            status: 404,
            body: String::new(),
        };
        assert!(throttled.is_retryable());
        assert!(server_err.is_retryable());
        assert!(!not_found.is_retryable());
    }

    #[test]
    fn malformed_is_retryable_but_config_is_not() {
        let malformed = SweepError::Malformed {
            context: "search",
            detail: "missing hits".into(),
        };
        let config = SweepError::Config("no index url".into());
        assert!(malformed.is_retryable());
        assert!(!config.is_retryable());
    }

    #[test]
    fn exhausted_error_keeps_the_underlying_cause() {
        let inner = SweepError::Status {
            context: "search",
            status: 429,
            body: "slow down".into(),
        };
        let outer = SweepError::RetryExhausted {
            waited_ms: 30_000,
            source: Box::new(inner),
        };
        let text = outer.to_string();
        assert!(text.contains("30000ms"));
        assert!(text.contains("429"));
    }
}
