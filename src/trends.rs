use std::cmp::Ordering;
use std::collections::HashMap;

use serde::Serialize;

use crate::descriptors::DescriptorLookup;
use crate::error::AnalyticsResult;
use crate::models::{ItemTrend, RecommendationEvent, TrendDirection, TrendRow};
use crate::store::EventStore;
use crate::window::{filter_events, TimeRange};

#[derive(Default)]
struct Accumulator {
    count: usize,
    confidence_total: f64,
    position_total: u64,
    last_recommended_at: i64,
    previous_count: usize,
}

/// Reduces events to one trend per item in the current window.
///
/// `events` may include history older than the window; events in the
/// preceding window of equal length only feed the trend direction. For
/// [`TimeRange::All`] there is no preceding window and every direction is
/// `Stable`.
pub fn aggregate(events: &[RecommendationEvent], range: TimeRange, now: i64) -> Vec<ItemTrend> {
    let mut groups: HashMap<&str, Accumulator> = HashMap::new();

    for event in filter_events(events, range, now) {
        let entry = groups.entry(event.item_id.as_str()).or_default();
        if entry.count == 0 || event.timestamp > entry.last_recommended_at {
            entry.last_recommended_at = event.timestamp;
        }
        entry.count += 1;
        entry.confidence_total += event.confidence;
        entry.position_total += u64::from(event.position);
    }

    if range.duration_ms().is_some() {
        let lower = range.lower_bound(now);
        let comparison_lower = range.comparison_lower_bound(now);
        for event in events {
            if event.timestamp >= comparison_lower && event.timestamp < lower {
                if let Some(entry) = groups.get_mut(event.item_id.as_str()) {
                    entry.previous_count += 1;
                }
            }
        }
    }

    let mut trends: Vec<ItemTrend> = groups
        .into_iter()
        .map(|(item_id, acc)| ItemTrend {
            item_id: item_id.to_string(),
            count: acc.count,
            avg_confidence: acc.confidence_total / acc.count as f64,
            avg_position: acc.position_total as f64 / acc.count as f64,
            last_recommended_at: acc.last_recommended_at,
            trend_direction: match range {
                TimeRange::All => TrendDirection::Stable,
                _ => TrendDirection::from_counts(acc.count, acc.previous_count),
            },
            previous_count: acc.previous_count,
        })
        .collect();

    trends.sort_by(compare_trends);
    trends
}

fn compare_trends(a: &ItemTrend, b: &ItemTrend) -> Ordering {
    b.count
        .cmp(&a.count)
        .then_with(|| b.avg_confidence.total_cmp(&a.avg_confidence))
        .then_with(|| a.item_id.cmp(&b.item_id))
}

pub fn join_descriptors(trends: Vec<ItemTrend>, lookup: &dyn DescriptorLookup) -> Vec<TrendRow> {
    trends
        .into_iter()
        .map(|trend| {
            let descriptor = lookup.describe(&trend.item_id);
            TrendRow { trend, descriptor }
        })
        .collect()
}

/// Ordered trend rows for `range`, resolved against `now` (ms since epoch).
pub async fn get_trends(
    store: &dyn EventStore,
    lookup: &dyn DescriptorLookup,
    range: TimeRange,
    now: i64,
) -> AnalyticsResult<Vec<TrendRow>> {
    let events = store.since(range.comparison_lower_bound(now)).await?;
    let trends = aggregate(&events, range, now);
    tracing::info!(
        range = %range,
        events = events.len(),
        items = trends.len(),
        "trends computed"
    );
    Ok(join_descriptors(trends, lookup))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSummary {
    pub total_recommendations: usize,
    pub unique_items: usize,
    pub mean_confidence: f64,
}

pub fn summarize(rows: &[TrendRow]) -> TrendSummary {
    let total_recommendations = rows.iter().map(|row| row.trend.count).sum();
    let mean_confidence = if rows.is_empty() {
        0.0
    } else {
        rows.iter().map(|row| row.trend.avg_confidence).sum::<f64>() / rows.len() as f64
    };

    TrendSummary {
        total_recommendations,
        unique_items: rows.len(),
        mean_confidence,
    }
}
