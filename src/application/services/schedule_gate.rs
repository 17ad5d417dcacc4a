use chrono::{DateTime, Duration, Utc};

use crate::domain::models::Broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleDecision {
    Allowed,
    /// Dispatch must wait at least until the contained instant.
    Deferred(DateTime<Utc>),
}

impl ScheduleDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, ScheduleDecision::Allowed)
    }
}

/// Decides whether a broadcast may dispatch at `now`.
///
/// An explicit scheduled start time is checked first, then the smart-pause
/// working-hours window. The gate applies to the whole broadcast; individual
/// contacts carry no schedule policy of their own.
pub fn can_dispatch_now(broadcast: &Broadcast, now: DateTime<Utc>) -> ScheduleDecision {
    if let Some(start) = broadcast.scheduled_at {
        if start > now {
            return ScheduleDecision::Deferred(start);
        }
    }

    if let Some(window) = broadcast.smart_pause {
        let time = now.time();
        if !window.contains(time) {
            let today_start = now
                .date_naive()
                .and_time(window.start)
                .and_utc();
            let next = if time < window.start {
                today_start
            } else {
                today_start + Duration::days(1)
            };
            return ScheduleDecision::Deferred(next);
        }
    }

    ScheduleDecision::Allowed
}
