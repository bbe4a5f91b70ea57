use async_trait::async_trait;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::models::{validate_batch, RecommendationEvent};
use crate::store::EventStore;
use crate::window::DAY_MS;

// Transaction-scoped advisory lock key serializing appends across writers.
const APPEND_LOCK_KEY: i64 = 0x5245_435F_4556; // "REC_EV"

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// PostgreSQL-backed event log; `seq` defines insertion order.
#[derive(Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn row_to_event(row: &sqlx::postgres::PgRow) -> AnalyticsResult<RecommendationEvent> {
    let position: i32 = row.try_get("position")?;
    let item_id: String = row.try_get("item_id")?;
    let position = u32::try_from(position).map_err(|_| {
        AnalyticsError::store_unavailable(format!(
            "stored position {position} for `{item_id}` is negative"
        ))
    })?;

    Ok(RecommendationEvent {
        item_id,
        timestamp: row.try_get("recorded_at_ms")?,
        subject_id: row.try_get("subject_id")?,
        confidence: row.try_get("confidence")?,
        position,
    })
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn append(&self, events: &[RecommendationEvent]) -> AnalyticsResult<()> {
        validate_batch(events)?;
        if events.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(APPEND_LOCK_KEY)
            .execute(&mut *tx)
            .await?;

        for event in events {
            let position = i32::try_from(event.position).map_err(|_| {
                AnalyticsError::invalid_event(&event.item_id, "position exceeds storage range")
            })?;
            sqlx::query(
                r#"
                INSERT INTO recommendation_trends.events
                (id, item_id, subject_id, confidence, position, recorded_at_ms)
                VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(&event.item_id)
            .bind(&event.subject_id)
            .bind(event.confidence)
            .bind(position)
            .bind(event.timestamp)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        tracing::info!(appended = events.len(), "events appended to postgres");
        Ok(())
    }

    async fn all(&self) -> AnalyticsResult<Vec<RecommendationEvent>> {
        self.since(0).await
    }

    async fn since(&self, lower_bound: i64) -> AnalyticsResult<Vec<RecommendationEvent>> {
        let rows = sqlx::query(
            "SELECT item_id, subject_id, confidence, position, recorded_at_ms \
             FROM recommendation_trends.events \
             WHERE recorded_at_ms >= $1 \
             ORDER BY seq",
        )
        .bind(lower_bound)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_event).collect()
    }

    async fn len(&self) -> AnalyticsResult<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM recommendation_trends.events")
            .fetch_one(&self.pool)
            .await?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

/// Demo history spread over the last few weeks relative to `now`.
pub fn seed_events(now: i64) -> Vec<RecommendationEvent> {
    let batches: [(&str, i64, [(&str, f64); 3]); 6] = [
        (
            "agent-avery",
            1,
            [("defi-starter", 88.0), ("nft-creator", 74.0), ("yield-plus", 61.0)],
        ),
        (
            "agent-jules",
            3,
            [("defi-starter", 91.0), ("yield-plus", 70.0), ("dao-governance", 55.0)],
        ),
        (
            "agent-kiara",
            5,
            [("nft-creator", 83.0), ("defi-starter", 79.0), ("analytics-pro", 58.0)],
        ),
        (
            "agent-avery",
            9,
            [("yield-plus", 86.0), ("dao-governance", 72.0), ("defi-starter", 64.0)],
        ),
        (
            "agent-jules",
            12,
            [("yield-plus", 90.0), ("analytics-pro", 77.0), ("nft-creator", 52.0)],
        ),
        (
            "agent-kiara",
            40,
            [("analytics-pro", 81.0), ("defi-starter", 66.0), ("yield-plus", 50.0)],
        ),
    ];

    let mut events = Vec::new();
    for (subject_id, days_ago, picks) in batches {
        let timestamp = now - days_ago * DAY_MS;
        for (index, (item_id, confidence)) in picks.into_iter().enumerate() {
            events.push(RecommendationEvent {
                item_id: item_id.to_string(),
                timestamp,
                subject_id: subject_id.to_string(),
                confidence,
                position: index as u32 + 1,
            });
        }
    }
    events
}
