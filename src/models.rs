use serde::{Deserialize, Serialize};

use crate::error::{AnalyticsError, AnalyticsResult};

/// One observation of an item being recommended to a subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationEvent {
    pub item_id: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub subject_id: String,
    pub confidence: f64,
    /// 1-based rank within the batch the oracle returned.
    pub position: u32,
}

impl RecommendationEvent {
    pub fn validate(&self) -> AnalyticsResult<()> {
        if self.item_id.is_empty() {
            return Err(AnalyticsError::invalid_event(
                &self.item_id,
                "item id must not be empty",
            ));
        }
        if self.position < 1 {
            return Err(AnalyticsError::invalid_event(
                &self.item_id,
                "position must be at least 1",
            ));
        }
        if !self.confidence.is_finite() || !(0.0..=100.0).contains(&self.confidence) {
            return Err(AnalyticsError::invalid_event(
                &self.item_id,
                format!("confidence {} outside 0..=100", self.confidence),
            ));
        }
        if self.timestamp < 0 {
            return Err(AnalyticsError::invalid_event(
                &self.item_id,
                format!("timestamp {} precedes the epoch", self.timestamp),
            ));
        }
        Ok(())
    }
}

/// Rejects the whole batch if any event is invalid.
pub fn validate_batch(events: &[RecommendationEvent]) -> AnalyticsResult<()> {
    events.iter().try_for_each(RecommendationEvent::validate)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    Stable,
}

impl TrendDirection {
    pub fn from_counts(current: usize, previous: usize) -> Self {
        match current.cmp(&previous) {
            std::cmp::Ordering::Greater => TrendDirection::Up,
            std::cmp::Ordering::Less => TrendDirection::Down,
            std::cmp::Ordering::Equal => TrendDirection::Stable,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Up => "up",
            TrendDirection::Down => "down",
            TrendDirection::Stable => "stable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemTrend {
    pub item_id: String,
    pub count: usize,
    pub avg_confidence: f64,
    pub avg_position: f64,
    pub last_recommended_at: i64,
    pub trend_direction: TrendDirection,
    pub previous_count: usize,
}

/// Display metadata for an item, owned by the host catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDescriptor {
    pub name: String,
    pub category: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub discount_percent: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendRow {
    pub trend: ItemTrend,
    pub descriptor: ItemDescriptor,
}
