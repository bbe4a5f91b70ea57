/// Errors surfaced by the event store, window filter and query layer.
#[derive(thiserror::Error, Debug)]
pub enum AnalyticsError {
    #[error("invalid event for item `{item_id}`: {reason}")]
    InvalidEvent { item_id: String, reason: String },

    #[error("unknown range `{0}` (expected one of 24h, 7d, 30d, all)")]
    UnknownRange(String),

    #[error("event store unavailable: {0}")]
    StoreUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl AnalyticsError {
    pub fn invalid_event(item_id: &str, reason: impl Into<String>) -> Self {
        AnalyticsError::InvalidEvent {
            item_id: item_id.to_string(),
            reason: reason.into(),
        }
    }

    pub fn store_unavailable(message: impl Into<String>) -> Self {
        let message: String = message.into();
        AnalyticsError::StoreUnavailable(message.into())
    }
}

impl From<sqlx::Error> for AnalyticsError {
    fn from(err: sqlx::Error) -> Self {
        AnalyticsError::StoreUnavailable(Box::new(err))
    }
}

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;
