use std::sync::Arc;

use chrono::{DateTime, Days, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::config::QuotaConfig;
use crate::models::Usage;
use crate::store::UsageStore;

/// Admits or rejects generation requests against a per-user daily limit
#[derive(Clone)]
pub struct QuotaTracker {
    store: Arc<dyn UsageStore>,
    limit: i32,
    offset: FixedOffset,
}

impl QuotaTracker {
    pub fn new(store: Arc<dyn UsageStore>, config: &QuotaConfig) -> Self {
        Self {
            store,
            limit: config.daily_limit,
            offset: config.offset(),
        }
    }

    pub fn limit(&self) -> i32 {
        self.limit
    }

    /// Calendar day of `now` in the reference timezone
    pub fn date_key(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.offset).date_naive()
    }

    /// Next local midnight after `now`, in UTC
    pub fn reset_at(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let tomorrow = self
            .date_key(now)
            .checked_add_days(Days::new(1))
            .unwrap_or(NaiveDate::MAX);
        let midnight = tomorrow.and_time(NaiveTime::MIN);

        // A fixed offset has exactly one mapping for every local time
        self.offset
            .from_local_datetime(&midnight)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or(now)
    }

    /// Consumes one unit of quota for `user_id` if any is left today.
    ///
    /// A rejected request does not touch the counter. If the usage store is
    /// unreachable the request is admitted: availability wins over strict
    /// enforcement.
    pub async fn admit(&self, user_id: &str, now: DateTime<Utc>) -> Usage {
        let date_key = self.date_key(now);

        match self
            .store
            .increment_if_below(user_id, date_key, self.limit, now)
            .await
        {
            Ok(Some(count)) => Usage {
                allowed: true,
                count,
                limit: self.limit,
                counted: true,
            },
            Ok(None) => {
                let count = match self.store.current(user_id, date_key).await {
                    Ok(count) => count,
                    Err(e) => {
                        log::warn!("Failed to read usage for {} after rejection: {}", user_id, e);
                        self.limit
                    }
                };
                log::info!(
                    "Quota exceeded for user {} on {} ({}/{})",
                    user_id,
                    date_key,
                    count,
                    self.limit
                );
                Usage {
                    allowed: false,
                    count,
                    limit: self.limit,
                    counted: true,
                }
            }
            Err(e) => {
                log::warn!(
                    "Usage store unavailable, admitting request for {} without counting: {}",
                    user_id,
                    e
                );
                Usage {
                    allowed: true,
                    count: 0,
                    limit: self.limit,
                    counted: false,
                }
            }
        }
    }
}
