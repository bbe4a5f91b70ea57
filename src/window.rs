use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::AnalyticsError;
use crate::models::RecommendationEvent;

pub const DAY_MS: i64 = 86_400_000;

/// Relative reporting window, resolved against a reference "now".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TimeRange {
    #[serde(rename = "24h")]
    Last24Hours,
    #[serde(rename = "7d")]
    Last7Days,
    #[serde(rename = "30d")]
    Last30Days,
    #[serde(rename = "all")]
    All,
}

impl TimeRange {
    /// Window length, or `None` for the unbounded range.
    pub fn duration_ms(&self) -> Option<i64> {
        match self {
            TimeRange::Last24Hours => Some(DAY_MS),
            TimeRange::Last7Days => Some(7 * DAY_MS),
            TimeRange::Last30Days => Some(30 * DAY_MS),
            TimeRange::All => None,
        }
    }

    pub fn lower_bound(&self, now: i64) -> i64 {
        self.duration_ms().map_or(0, |len| now - len)
    }

    /// Start of the preceding window of equal length.
    pub fn comparison_lower_bound(&self, now: i64) -> i64 {
        self.duration_ms().map_or(0, |len| now - 2 * len)
    }

    pub fn contains(&self, timestamp: i64, now: i64) -> bool {
        timestamp >= self.lower_bound(now) && timestamp <= now
    }

    pub fn token(&self) -> &'static str {
        match self {
            TimeRange::Last24Hours => "24h",
            TimeRange::Last7Days => "7d",
            TimeRange::Last30Days => "30d",
            TimeRange::All => "all",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TimeRange::Last24Hours => "Last 24 hours",
            TimeRange::Last7Days => "Last 7 days",
            TimeRange::Last30Days => "Last 30 days",
            TimeRange::All => "All time",
        }
    }
}

impl FromStr for TimeRange {
    type Err = AnalyticsError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "24h" => Ok(TimeRange::Last24Hours),
            "7d" => Ok(TimeRange::Last7Days),
            "30d" => Ok(TimeRange::Last30Days),
            "all" => Ok(TimeRange::All),
            _ => Err(AnalyticsError::UnknownRange(value.to_string())),
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

pub fn filter_events<'a>(
    events: &'a [RecommendationEvent],
    range: TimeRange,
    now: i64,
) -> impl Iterator<Item = &'a RecommendationEvent> + 'a {
    events
        .iter()
        .filter(move |event| range.contains(event.timestamp, now))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event_at(item_id: &str, timestamp: i64) -> RecommendationEvent {
        RecommendationEvent {
            item_id: item_id.to_string(),
            timestamp,
            subject_id: "agent-1".to_string(),
            confidence: 70.0,
            position: 1,
        }
    }

    #[test]
    fn parses_known_tokens() {
        assert_eq!("24h".parse::<TimeRange>().unwrap(), TimeRange::Last24Hours);
        assert_eq!("7d".parse::<TimeRange>().unwrap(), TimeRange::Last7Days);
        assert_eq!(" 30D ".parse::<TimeRange>().unwrap(), TimeRange::Last30Days);
        assert_eq!("all".parse::<TimeRange>().unwrap(), TimeRange::All);
    }

    #[test]
    fn unknown_token_is_an_error() {
        let err = "90d".parse::<TimeRange>().unwrap_err();
        assert!(matches!(err, AnalyticsError::UnknownRange(token) if token == "90d"));
        assert!("".parse::<TimeRange>().is_err());
    }

    #[test]
    fn lower_bounds_follow_window_length() {
        let now = 100 * DAY_MS;
        assert_eq!(TimeRange::Last24Hours.lower_bound(now), now - 86_400_000);
        assert_eq!(TimeRange::Last7Days.lower_bound(now), now - 7 * 86_400_000);
        assert_eq!(TimeRange::Last30Days.lower_bound(now), now - 30 * 86_400_000);
        assert_eq!(TimeRange::All.lower_bound(now), 0);
        assert_eq!(TimeRange::Last7Days.comparison_lower_bound(now), now - 14 * DAY_MS);
    }

    #[test]
    fn filter_keeps_order_and_inclusive_bounds() {
        let now = 10 * DAY_MS;
        let events = vec![
            event_at("c", now),
            event_at("old", now - DAY_MS - 1),
            event_at("a", now - DAY_MS),
            event_at("future", now + 1),
            event_at("b", now - 5),
        ];

        let ids: Vec<&str> = filter_events(&events, TimeRange::Last24Hours, now)
            .map(|event| event.item_id.as_str())
            .collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn all_range_starts_at_epoch() {
        let now = 10 * DAY_MS;
        let events = vec![event_at("a", 0), event_at("b", now)];
        assert_eq!(filter_events(&events, TimeRange::All, now).count(), 2);
    }
}
