use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL, Cell, Table};
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use indexsweep_core::audit::AuditSummary;
use indexsweep_core::config::SweepConfig;
use indexsweep_core::models::RunSummary;
use indexsweep_core::remote::RemoteClient;
use indexsweep_core::retry::RetryPolicy;
use indexsweep_core::source::connect_pool;
use indexsweep_core::stats::{fetch_entity_counts, record_entity_counts};
use indexsweep_core::{AuditRunner, PassRunner};

pub async fn run_pass(config: SweepConfig, json: bool) -> Result<()> {
    let runner = PassRunner::initialize(&config)
        .await
        .context("pass failed to initialize")?;
    let summary = runner.run().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    print_run_summary(&summary);
    Ok(())
}

fn print_run_summary(summary: &RunSummary) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        "Scanned",
        "Duplicated",
        "Deleted",
        "Already gone",
        "Failed",
        "Ambiguous",
        "Pages",
    ]);
    table.add_row(vec![
        Cell::new(summary.scanned),
        Cell::new(summary.duplicates_found),
        Cell::new(summary.deleted),
        Cell::new(summary.already_gone),
        Cell::new(summary.delete_failures),
        Cell::new(summary.ambiguous),
        Cell::new(summary.pages),
    ]);

    println!("Window {}", summary.window);
    println!("{table}");
    if summary.delete_failures > 0 || summary.pages_skipped > 0 {
        println!(
            "{}",
            format!(
                "{} deletes failed, {} pages skipped; the next pass retries them.",
                summary.delete_failures, summary.pages_skipped
            )
            .yellow()
        );
    } else {
        println!(
            "{} Pass finished in {} ms",
            "✓".green(),
            summary.elapsed_ms
        );
    }
}

pub async fn run_audit(mut config: SweepConfig, window_hours: i64, json: bool) -> Result<()> {
    config.audit_window_hours = window_hours;
    let runner = AuditRunner::initialize(&config)
        .await
        .context("audit failed to initialize")?;
    let summary = runner.run().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }
    print_audit_summary(&summary);
    Ok(())
}

fn print_audit_summary(summary: &AuditSummary) {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        "Scanned",
        "Duplicated",
        "Missing",
        "Mismatched dates",
        "Pages",
        "Pages skipped",
    ]);
    table.add_row(vec![
        Cell::new(summary.scanned),
        Cell::new(summary.duplicates),
        Cell::new(summary.missing_from_index),
        Cell::new(summary.mismatched_timestamps),
        Cell::new(summary.pages),
        Cell::new(summary.pages_skipped),
    ]);

    println!("Window {}", summary.window);
    println!("{table}");
    if summary.is_clean() {
        println!("{} Index and store agree over the audited window", "✓".green());
    } else {
        println!(
            "{}",
            "Index and store disagree; see the counts above.".yellow()
        );
    }
}

pub async fn run_stats(
    config: SweepConfig,
    entities: Vec<String>,
    record: bool,
    json: bool,
) -> Result<()> {
    let base_url = config
        .api_base_url
        .as_deref()
        .context("stats needs an API url (--api-url or INDEXSWEEP_API_URL)")?;
    let entities = if entities.is_empty() {
        config.stats_entities.clone()
    } else {
        entities
    };

    let remote = RemoteClient::new(RetryPolicy::long())?;
    let counts =
        fetch_entity_counts(&remote, base_url, &entities, config.mailto.as_deref()).await?;

    if record {
        let url = config
            .database_url
            .as_deref()
            .context("--record needs a database url (--database-url or DATABASE_URL)")?;
        let pool = connect_pool(url).await?;
        record_entity_counts(&pool, &counts).await?;
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&counts)?);
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Entity", "Total"]);
    for count in &counts {
        table.add_row(vec![Cell::new(&count.entity), Cell::new(count.total)]);
    }
    println!("{table}");
    Ok(())
}

/// Sweep forever on a fixed cadence. Passes never overlap; a pass that
/// fails to initialize is logged and retried at the next tick.
pub async fn run_watch(config: SweepConfig, every: u64) -> Result<()> {
    config.validate()?;
    info!("[Watch] sweeping every {}s until stopped", every);

    let mut ticker = tokio::time::interval(Duration::from_secs(every.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match PassRunner::initialize(&config).await {
            Ok(runner) => {
                let summary = runner.run().await;
                info!(
                    "[Watch] pass done: {} scanned, {} deleted, next in {}s",
                    summary.scanned, summary.deleted, every
                );
            }
            Err(err) => {
                error!("[Watch] pass skipped, initialization failed: {}", err);
            }
        }
    }
}
