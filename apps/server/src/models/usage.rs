use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Per-user, per-calendar-day generation counter
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UsageCounter {
    pub user_id: String,
    pub date_key: NaiveDate,
    pub count: i32,
    pub last_at: DateTime<Utc>,
}

/// Outcome of a quota admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Usage {
    pub allowed: bool,
    /// Counter value after the check (unchanged when rejected)
    pub count: i32,
    pub limit: i32,
    /// False when the counter could not be read or written and the request
    /// was let through uncounted
    pub counted: bool,
}

/// Usage as reported to the client after an accepted request.
///
/// `current` and `remaining` are `null` when the usage store was unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UsageSummary {
    pub current: Option<i32>,
    pub limit: i32,
    pub remaining: Option<i32>,
}

impl From<Usage> for UsageSummary {
    fn from(usage: Usage) -> Self {
        let current = usage.counted.then_some(usage.count);
        Self {
            current,
            limit: usage.limit,
            remaining: current.map(|count| (usage.limit - count).max(0)),
        }
    }
}

impl std::fmt::Display for UsageSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.current {
            Some(current) => write!(f, "{}/{}", current, self.limit),
            None => write!(f, "uncounted/{}", self.limit),
        }
    }
}
