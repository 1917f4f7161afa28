//! Runtime configuration for a sweep.
//!
//! The CLI builds one [`SweepConfig`] from flags and environment variables;
//! everything downstream takes it by reference. Validation happens once,
//! before any connection is opened.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{SweepError, SweepResult};
use crate::models::ReconciliationWindow;

/// Where changed records are enumerated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceMode {
    /// Page directly over the primary store with SQL.
    Database,
    /// Page over the public API with cursor pagination.
    Api,
}

impl std::str::FromStr for SourceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "database" | "db" => Ok(SourceMode::Database),
            "api" => Ok(SourceMode::Api),
            other => Err(format!("unknown source mode '{other}' (expected 'database' or 'api')")),
        }
    }
}

impl std::fmt::Display for SourceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceMode::Database => write!(f, "database"),
            SourceMode::Api => write!(f, "api"),
        }
    }
}

/// Everything one pass needs to know. Built by the binary, validated here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    pub source: SourceMode,
    /// Postgres connection string. Required in database mode.
    pub database_url: Option<String>,
    /// Table holding the records, e.g. "records" or "mid.json_records".
    pub record_table: String,
    /// Prefix prepended to numeric primary-store ids, e.g. "W".
    pub id_prefix: String,
    /// Base URL of the public API. Required in api mode.
    pub api_base_url: Option<String>,
    /// Entity path segment under the API base, e.g. "works".
    pub api_entity: String,
    /// Contact address forwarded to the API as a politeness parameter.
    pub mailto: Option<String>,
    /// Base URL of the secondary search index.
    pub index_url: String,
    /// Logical index (or alias) queried for copies.
    pub index_name: String,
    /// How far behind now the window ends, in minutes.
    pub window_lag_minutes: i64,
    /// Width of the window, in minutes. Wider than the scheduling cadence so
    /// consecutive passes overlap.
    pub window_width_minutes: i64,
    /// How far back the audit looks, in hours.
    pub audit_window_hours: i64,
    /// Records fetched per page from the primary store.
    pub page_size: usize,
    /// Cumulative backoff budget for lookups inside a pass, in seconds.
    /// Zero disables retries entirely.
    pub retry_budget_secs: u64,
    /// Max ids packed into one bulk lookup.
    pub batch_cap: usize,
    /// Max hits requested from one bulk lookup.
    pub result_cap: usize,
    /// Entities reported by the stats command.
    pub stats_entities: Vec<String>,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            source: SourceMode::Database,
            database_url: None,
            record_table: "records".to_string(),
            id_prefix: String::new(),
            api_base_url: None,
            api_entity: "works".to_string(),
            mailto: None,
            index_url: String::new(),
            index_name: "works".to_string(),
            window_lag_minutes: 120,
            window_width_minutes: 70,
            audit_window_hours: 24,
            page_size: 1000,
            retry_budget_secs: 30,
            batch_cap: 2000,
            result_cap: 2000,
            stats_entities: vec![
                "works".to_string(),
                "authors".to_string(),
                "sources".to_string(),
                "institutions".to_string(),
                "publishers".to_string(),
                "funders".to_string(),
                "concepts".to_string(),
            ],
        }
    }
}

impl SweepConfig {
    /// Reject configurations that could not possibly run.
    pub fn validate(&self) -> SweepResult<()> {
        match self.source {
            SourceMode::Database => {
                if self.database_url.as_deref().unwrap_or("").is_empty() {
                    return Err(SweepError::Config(
                        "database source selected but no database url given".to_string(),
                    ));
                }
            }
            SourceMode::Api => {
                let base = self.api_base_url.as_deref().unwrap_or("");
                if base.is_empty() {
                    return Err(SweepError::Config(
                        "api source selected but no api url given".to_string(),
                    ));
                }
                validate_http_url("api url", base)?;
            }
        }

        validate_http_url("index url", &self.index_url)?;

        if self.index_name.is_empty() {
            return Err(SweepError::Config("index name must not be empty".to_string()));
        }
        if self.record_table.is_empty()
            || !self
                .record_table
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
        {
            // The table name is interpolated into SQL, so keep it boring.
            return Err(SweepError::Config(format!(
                "record table '{}' must be alphanumeric with '_' or '.'",
                self.record_table
            )));
        }
        if self.api_entity.is_empty() {
            return Err(SweepError::Config("api entity must not be empty".to_string()));
        }
        if self.page_size == 0 {
            return Err(SweepError::Config("page size must be at least 1".to_string()));
        }
        if self.batch_cap == 0 || self.result_cap == 0 {
            return Err(SweepError::Config(
                "lookup batch and result caps must be at least 1".to_string(),
            ));
        }
        if self.window_lag_minutes < 0 {
            return Err(SweepError::Config("window lag must not be negative".to_string()));
        }
        if self.window_width_minutes <= 0 || self.audit_window_hours <= 0 {
            return Err(SweepError::Config("window width must be positive".to_string()));
        }
        Ok(())
    }

    /// The sweep window for a pass starting at `now`.
    pub fn window(&self, now: DateTime<Utc>) -> ReconciliationWindow {
        ReconciliationWindow::trailing(
            now,
            Duration::minutes(self.window_lag_minutes),
            Duration::minutes(self.window_width_minutes),
        )
    }

    /// The wider window used by the audit command. Same lag, wider span.
    pub fn audit_window(&self, now: DateTime<Utc>) -> ReconciliationWindow {
        ReconciliationWindow::trailing(
            now,
            Duration::minutes(self.window_lag_minutes),
            Duration::hours(self.audit_window_hours),
        )
    }
}

fn validate_http_url(what: &str, raw: &str) -> SweepResult<()> {
    if raw.is_empty() {
        return Err(SweepError::Config(format!("{what} must not be empty")));
    }
    let parsed = url::Url::parse(raw)
        .map_err(|e| SweepError::Config(format!("{what} '{raw}' is not a valid url: {e}")))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(SweepError::Config(format!(
            "{what} '{raw}' must use http or https"
        )));
    }
    Ok(())
}
