use std::path::Path;
use std::sync::RwLock;

use anyhow::Context;
use async_trait::async_trait;

use crate::error::{AnalyticsError, AnalyticsResult};
use crate::models::{validate_batch, RecommendationEvent};

/// Append-only, insertion-ordered record of recommendation events.
///
/// Reads return a snapshot; events appended while a caller holds one are
/// visible on the next read.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Validates the whole batch before storing any of it.
    async fn append(&self, events: &[RecommendationEvent]) -> AnalyticsResult<()>;

    async fn all(&self) -> AnalyticsResult<Vec<RecommendationEvent>>;

    async fn since(&self, lower_bound: i64) -> AnalyticsResult<Vec<RecommendationEvent>> {
        let mut events = self.all().await?;
        events.retain(|event| event.timestamp >= lower_bound);
        Ok(events)
    }

    async fn len(&self) -> AnalyticsResult<usize> {
        Ok(self.all().await?.len())
    }
}

#[derive(Debug, Default)]
pub struct MemoryEventStore {
    events: RwLock<Vec<RecommendationEvent>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> AnalyticsError {
    AnalyticsError::store_unavailable("in-memory event log lock poisoned")
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn append(&self, events: &[RecommendationEvent]) -> AnalyticsResult<()> {
        validate_batch(events)?;
        let mut log = self.events.write().map_err(poisoned)?;
        log.extend_from_slice(events);
        tracing::debug!(appended = events.len(), total = log.len(), "events appended");
        Ok(())
    }

    async fn all(&self) -> AnalyticsResult<Vec<RecommendationEvent>> {
        Ok(self.events.read().map_err(poisoned)?.clone())
    }

    async fn since(&self, lower_bound: i64) -> AnalyticsResult<Vec<RecommendationEvent>> {
        let log = self.events.read().map_err(poisoned)?;
        Ok(log
            .iter()
            .filter(|event| event.timestamp >= lower_bound)
            .cloned()
            .collect())
    }

    async fn len(&self) -> AnalyticsResult<usize> {
        Ok(self.events.read().map_err(poisoned)?.len())
    }
}

/// Reads `item_id,subject_id,confidence,position,timestamp` rows.
pub fn read_events_csv(csv_path: &Path) -> anyhow::Result<Vec<RecommendationEvent>> {
    #[derive(serde::Deserialize)]
    struct CsvRow {
        item_id: String,
        subject_id: String,
        confidence: f64,
        position: u32,
        timestamp: i64,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut events = Vec::new();

    for (index, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("malformed event row {}", index + 1))?;
        let event = RecommendationEvent {
            item_id: row.item_id,
            timestamp: row.timestamp,
            subject_id: row.subject_id,
            confidence: row.confidence,
            position: row.position,
        };
        event
            .validate()
            .with_context(|| format!("invalid event row {}", index + 1))?;
        events.push(event);
    }

    Ok(events)
}
