use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Daily working-hours window outside which sending is suppressed.
/// The window is half-open: sends may start at `start` and stop at `end`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SmartPauseWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl SmartPauseWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        self.start <= time && time < self.end
    }
}
