use clap::{Args, Parser, Subcommand};

use indexsweep_core::config::{SourceMode, SweepConfig};

#[derive(Parser)]
#[command(
    name = "indexsweep",
    about = "Indexsweep - reconciliation sweeps for a secondary search index",
    version = env!("CARGO_PKG_VERSION"),
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, env = "RUST_LOG", default_value = "info", global = true)]
    pub log_level: String,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run one reconciliation pass over the trailing window")]
    Run {
        #[command(flatten)]
        sweep: SweepArgs,

        #[arg(short, long, help = "Output the summary as JSON")]
        json: bool,
    },

    #[command(about = "Read-only consistency audit over a wider window")]
    Audit {
        #[command(flatten)]
        sweep: SweepArgs,

        #[arg(long, default_value_t = 24, help = "Hours of history to audit")]
        window_hours: i64,

        #[arg(short, long, help = "Output the summary as JSON")]
        json: bool,
    },

    #[command(about = "Report corpus-wide entity counts from the API")]
    Stats {
        #[command(flatten)]
        sweep: SweepArgs,

        #[arg(
            long = "entity",
            value_delimiter = ',',
            help = "Entities to count (repeat the flag or comma-separate)"
        )]
        entities: Vec<String>,

        #[arg(long, help = "Also append the counts to the database log table")]
        record: bool,

        #[arg(short, long, help = "Output the counts as JSON")]
        json: bool,
    },

    #[command(about = "Run passes on a fixed cadence until stopped")]
    Watch {
        #[command(flatten)]
        sweep: SweepArgs,

        #[arg(long, default_value_t = 3600, help = "Seconds between pass starts")]
        every: u64,
    },
}

/// Connection and window knobs shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct SweepArgs {
    #[arg(
        long,
        env = "INDEXSWEEP_SOURCE",
        default_value = "database",
        help = "Where to enumerate changed records from ('database' or 'api')"
    )]
    pub source: SourceMode,

    #[arg(long, env = "DATABASE_URL", help = "Postgres connection string")]
    pub database_url: Option<String>,

    #[arg(
        long,
        env = "INDEXSWEEP_TABLE",
        default_value = "records",
        help = "Table holding the records"
    )]
    pub table: String,

    #[arg(
        long,
        env = "INDEXSWEEP_ID_PREFIX",
        default_value = "",
        help = "Prefix prepended to numeric record ids"
    )]
    pub id_prefix: String,

    #[arg(long, env = "INDEXSWEEP_API_URL", help = "Base URL of the public API")]
    pub api_url: Option<String>,

    #[arg(
        long,
        env = "INDEXSWEEP_ENTITY",
        default_value = "works",
        help = "Entity path under the API base"
    )]
    pub entity: String,

    #[arg(
        long,
        env = "INDEXSWEEP_MAILTO",
        help = "Contact address sent with API requests"
    )]
    pub mailto: Option<String>,

    #[arg(
        long,
        env = "INDEXSWEEP_INDEX_URL",
        default_value = "",
        help = "Base URL of the search index"
    )]
    pub index_url: String,

    #[arg(
        long,
        env = "INDEXSWEEP_INDEX",
        default_value = "works",
        help = "Index or alias queried for copies"
    )]
    pub index_name: String,

    #[arg(long, default_value_t = 120, help = "Minutes the window trails behind now")]
    pub lag_minutes: i64,

    #[arg(long, default_value_t = 70, help = "Window width in minutes")]
    pub width_minutes: i64,

    #[arg(long, default_value_t = 1000, help = "Records per page from the source")]
    pub page_size: usize,

    #[arg(
        long,
        default_value_t = 30,
        help = "Seconds of backoff budget for lookups (0 disables retries)"
    )]
    pub retry_budget: u64,
}

impl SweepArgs {
    pub fn into_config(self) -> SweepConfig {
        SweepConfig {
            source: self.source,
            database_url: self.database_url,
            record_table: self.table,
            id_prefix: self.id_prefix,
            api_base_url: self.api_url,
            api_entity: self.entity,
            mailto: self.mailto,
            index_url: self.index_url,
            index_name: self.index_name,
            window_lag_minutes: self.lag_minutes,
            window_width_minutes: self.width_minutes,
            page_size: self.page_size,
            retry_budget_secs: self.retry_budget,
            ..SweepConfig::default()
        }
    }
}
