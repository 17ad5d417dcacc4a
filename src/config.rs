use std::env::var;
use std::time::Duration;

use dotenvy::dotenv;

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Interval between scheduled checks.
    pub tick_interval: Duration,
    /// Maximum number of pending contacts claimed per dispatch cycle.
    pub batch_size: u32,
    /// Defensive cap on one send call; a timeout counts as a failed send.
    pub send_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(5),
            batch_size: 20,
            send_timeout: Duration::from_secs(60),
        }
    }
}

impl DispatcherConfig {
    /// Reads overrides from the environment, falling back to defaults.
    pub fn from_env() -> Self {
        let _ = dotenv();
        let defaults = Self::default();

        Self {
            tick_interval: var("DISPATCH_TICK_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.tick_interval),
            batch_size: var("DISPATCH_BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(defaults.batch_size),
            send_timeout: var("SEND_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.send_timeout),
        }
    }
}
