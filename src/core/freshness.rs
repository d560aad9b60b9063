//! Decides when the stored currency data needs a refresh.

use crate::core::error::{Result, UpdateError};
use crate::core::models::UpdateTimestamp;
use chrono::{DateTime, Duration, FixedOffset, NaiveTime, Utc};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePolicy {
    /// Data is stale once it is at least this old.
    Interval(Duration),
    /// The source publishes once per day at `publish_time` in `offset`; data
    /// is stale if it was stored before the most recent publication.
    Daily {
        publish_time: NaiveTime,
        offset: FixedOffset,
    },
}

#[derive(Debug, Clone)]
pub struct FreshnessEvaluator {
    policy: UpdatePolicy,
}

impl FreshnessEvaluator {
    pub fn new(policy: UpdatePolicy) -> Self {
        Self { policy }
    }

    pub fn is_need_for_update(&self, latest: Option<&UpdateTimestamp>) -> Result<bool> {
        self.is_need_for_update_at(latest, Utc::now())
    }

    /// Returns whether `latest` is stale at `now`. No stored update is always
    /// stale.
    pub fn is_need_for_update_at(
        &self,
        latest: Option<&UpdateTimestamp>,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let Some(latest) = latest else {
            debug!("No stored update, refresh is due");
            return Ok(true);
        };
        let updated_at = parse_timestamp(&latest.timestamp)?;

        let stale = match self.policy {
            UpdatePolicy::Interval(interval) => now - updated_at >= interval,
            UpdatePolicy::Daily { .. } => updated_at < self.latest_publish(now),
        };
        debug!(updated_at = %updated_at, stale, "Checked stored update");
        Ok(stale)
    }

    pub fn time_to_next_update(
        &self,
        latest: Option<&UpdateTimestamp>,
    ) -> Result<std::time::Duration> {
        self.time_to_next_update_at(latest, Utc::now())
    }

    /// How long to wait from `now` until the next refresh is due. Never
    /// negative: an overdue refresh yields zero.
    pub fn time_to_next_update_at(
        &self,
        latest: Option<&UpdateTimestamp>,
        now: DateTime<Utc>,
    ) -> Result<std::time::Duration> {
        let Some(latest) = latest else {
            return Ok(std::time::Duration::ZERO);
        };
        let updated_at = parse_timestamp(&latest.timestamp)?;

        let due_at = match self.policy {
            UpdatePolicy::Interval(interval) => updated_at + interval,
            UpdatePolicy::Daily { .. } => {
                let published = self.latest_publish(now);
                if updated_at < published {
                    published
                } else {
                    published + Duration::days(1)
                }
            }
        };

        Ok((due_at - now).to_std().unwrap_or(std::time::Duration::ZERO))
    }

    /// The most recent publication instant not after `now`. Only meaningful for
    /// the daily policy; the interval policy has no publication schedule.
    fn latest_publish(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let UpdatePolicy::Daily {
            publish_time,
            offset,
        } = self.policy
        else {
            return now;
        };

        let local_date = now.with_timezone(&offset).date_naive();
        let local_publish = local_date.and_time(publish_time);
        let publish = DateTime::<Utc>::from_naive_utc_and_offset(
            local_publish - Duration::seconds(i64::from(offset.local_minus_utc())),
            Utc,
        );

        if publish > now {
            publish - Duration::days(1)
        } else {
            publish
        }
    }
}

pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| UpdateError::TimeParse {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(value: &str) -> DateTime<Utc> {
        parse_timestamp(value).unwrap()
    }

    fn stored(value: &str) -> UpdateTimestamp {
        UpdateTimestamp {
            id: 1,
            timestamp: value.to_string(),
        }
    }

    fn hourly() -> FreshnessEvaluator {
        FreshnessEvaluator::new(UpdatePolicy::Interval(Duration::hours(1)))
    }

    fn daily() -> FreshnessEvaluator {
        FreshnessEvaluator::new(UpdatePolicy::Daily {
            publish_time: NaiveTime::from_hms_opt(15, 30, 0).unwrap(),
            offset: FixedOffset::east_opt(3 * 3600).unwrap(),
        })
    }

    #[test]
    fn test_missing_update_is_always_stale() {
        let now = at("2026-10-16T12:00:00Z");
        assert!(hourly().is_need_for_update_at(None, now).unwrap());
        assert!(daily().is_need_for_update_at(None, now).unwrap());
        assert_eq!(
            hourly().time_to_next_update_at(None, now).unwrap(),
            std::time::Duration::ZERO
        );
    }

    #[test]
    fn test_interval_boundary() {
        let evaluator = hourly();
        let latest = stored("2026-10-16T12:00:00+00:00");

        assert!(
            !evaluator
                .is_need_for_update_at(Some(&latest), at("2026-10-16T12:00:00Z"))
                .unwrap()
        );
        assert!(
            !evaluator
                .is_need_for_update_at(Some(&latest), at("2026-10-16T12:59:59Z"))
                .unwrap()
        );
        // Elapsed time equal to the interval is stale
        assert!(
            evaluator
                .is_need_for_update_at(Some(&latest), at("2026-10-16T13:00:00Z"))
                .unwrap()
        );
        assert!(
            evaluator
                .is_need_for_update_at(Some(&latest), at("2026-10-16T14:00:00Z"))
                .unwrap()
        );
    }

    #[test]
    fn test_interval_respects_timestamp_offset() {
        let latest = stored("2026-10-16T15:00:00+03:00");
        assert!(
            !hourly()
                .is_need_for_update_at(Some(&latest), at("2026-10-16T12:30:00Z"))
                .unwrap()
        );
    }

    #[test]
    fn test_interval_time_to_next_update() {
        let evaluator = hourly();
        let latest = stored("2026-10-16T12:00:00Z");

        assert_eq!(
            evaluator
                .time_to_next_update_at(Some(&latest), at("2026-10-16T12:15:00Z"))
                .unwrap(),
            std::time::Duration::from_secs(45 * 60)
        );
        // Overdue clamps to zero
        assert_eq!(
            evaluator
                .time_to_next_update_at(Some(&latest), at("2026-10-16T18:00:00Z"))
                .unwrap(),
            std::time::Duration::ZERO
        );
    }

    #[test]
    fn test_daily_stale_only_after_publication() {
        let evaluator = daily();
        // Stored after yesterday's 15:30 MSK publication
        let latest = stored("2026-10-15T13:00:00Z");

        // 15:29 MSK, today's feed not published yet
        assert!(
            !evaluator
                .is_need_for_update_at(Some(&latest), at("2026-10-16T12:29:00Z"))
                .unwrap()
        );
        // 15:30 MSK, published
        assert!(
            evaluator
                .is_need_for_update_at(Some(&latest), at("2026-10-16T12:30:00Z"))
                .unwrap()
        );
    }

    #[test]
    fn test_daily_fresh_after_fetching_todays_feed() {
        let evaluator = daily();
        let latest = stored("2026-10-16T12:31:00Z");
        let now = at("2026-10-16T12:45:00Z");

        assert!(!evaluator.is_need_for_update_at(Some(&latest), now).unwrap());
        // Next publication is tomorrow 15:30 MSK
        assert_eq!(
            evaluator.time_to_next_update_at(Some(&latest), now).unwrap(),
            std::time::Duration::from_secs(24 * 3600 - 15 * 60)
        );
    }

    #[test]
    fn test_daily_publication_crossing_utc_midnight() {
        // 01:00 at UTC+5 is 20:00 UTC the previous day
        let evaluator = FreshnessEvaluator::new(UpdatePolicy::Daily {
            publish_time: NaiveTime::from_hms_opt(1, 0, 0).unwrap(),
            offset: FixedOffset::east_opt(5 * 3600).unwrap(),
        });
        let latest = stored("2026-10-15T19:00:00Z");

        assert!(
            !evaluator
                .is_need_for_update_at(Some(&latest), at("2026-10-15T19:59:00Z"))
                .unwrap()
        );
        assert!(
            evaluator
                .is_need_for_update_at(Some(&latest), at("2026-10-15T20:00:00Z"))
                .unwrap()
        );
    }

    #[test]
    fn test_daily_overdue_waits_zero() {
        let evaluator = daily();
        let latest = stored("2026-10-14T13:00:00Z");
        assert_eq!(
            evaluator
                .time_to_next_update_at(Some(&latest), at("2026-10-16T08:00:00Z"))
                .unwrap(),
            std::time::Duration::ZERO
        );
    }

    #[test]
    fn test_unparsable_timestamp_is_time_parse_error() {
        let latest = stored("16.10.2026 12:00");
        let now = at("2026-10-16T12:00:00Z");

        assert!(matches!(
            hourly().is_need_for_update_at(Some(&latest), now),
            Err(UpdateError::TimeParse { .. })
        ));
        assert!(matches!(
            daily().time_to_next_update_at(Some(&latest), now),
            Err(UpdateError::TimeParse { .. })
        ));
    }
}
