use crate::condition::MatchKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque rate limiter identifier. Treated as an opaque string end-to-end,
/// including on delete, so there is never more than one representation
/// of an id to keep in sync.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LimiterId(pub String);

impl LimiterId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl Default for LimiterId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for LimiterId {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(fmt)
    }
}

impl From<String> for LimiterId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The sentinel text returned when a blocking limiter carries no
/// `custom_text` of its own.
pub const DEFAULT_LIMIT_TEXT: &str = "400: Rate limit exceeded";

/// A fixed-window rate limiter definition: throttles sessions whose
/// `key` attribute matches `{value, condition}` once more
/// than `limit` hits land inside any `duration`-minute window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimiterConfig {
    pub id: LimiterId,
    pub key: String,
    pub value: String,
    pub condition: MatchKind,
    pub limit: u32,
    /// Window length, in minutes.
    pub duration: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_text: Option<String>,
}

/// One (limiter, observed value) hit counter, live for the limiter's
/// current fixed window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    pub limiter_id: LimiterId,
    pub key: String,
    pub value: String,
    pub count: u32,
    pub window_start: DateTime<Utc>,
}
