//! Corpus-level entity counts pulled from the public API.
//!
//! A reporting helper, not part of the sweep itself: one GET per entity,
//! optionally appended to a log table so growth can be graphed over time.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPool;
use tracing::info;

use crate::error::SweepResult;
use crate::remote::RemoteClient;

/// Table the counts land in when a database url is configured.
const COUNTS_TABLE: &str = "sweep_entity_counts";

/// Total record count for one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityCount {
    pub entity: String,
    pub total: u64,
}

#[derive(Debug, Deserialize)]
struct CountEnvelope {
    meta: CountMeta,
}

#[derive(Debug, Deserialize)]
struct CountMeta {
    count: u64,
}

/// Fetch the total count for every entity, in the order given.
pub async fn fetch_entity_counts(
    remote: &RemoteClient,
    base_url: &str,
    entities: &[String],
    mailto: Option<&str>,
) -> SweepResult<Vec<EntityCount>> {
    let base = base_url.trim_end_matches('/');
    let mut query: Vec<(&str, String)> = Vec::new();
    if let Some(mailto) = mailto {
        query.push(("mailto", mailto.to_string()));
    }

    let mut counts = Vec::with_capacity(entities.len());
    for entity in entities {
        let url = format!("{base}/{entity}");
        let envelope: CountEnvelope = remote.get_json("entity count", &url, &query).await?;
        info!("[Stats] {} holds {} records", entity, envelope.meta.count);
        counts.push(EntityCount {
            entity: entity.clone(),
            total: envelope.meta.count,
        });
    }
    Ok(counts)
}

/// Append one row per entity, all sharing the same query timestamp.
pub async fn record_entity_counts(pool: &PgPool, counts: &[EntityCount]) -> SweepResult<()> {
    let queried_at = Utc::now();
    for count in counts {
        sqlx::query(&format!(
            "INSERT INTO {COUNTS_TABLE} (queried_at, entity, total) VALUES ($1, $2, $3)"
        ))
        .bind(queried_at)
        .bind(&count.entity)
        .bind(count.total as i64)
        .execute(pool)
        .await?;
    }
    info!("[Stats] logged {} entity counts at {}", counts.len(), queried_at);
    Ok(())
}
