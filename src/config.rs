use std::env;
use std::time::Duration;

/// How long a user's worker may sit without requests before it shuts down.
pub const DEFAULT_STALE_HANDLER_TIMEOUT: Duration = Duration::from_secs(3600);

/// How often the reaper sweeps the registry for dead workers.
pub const DEFAULT_STALE_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// The two knobs the core consumes.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    pub stale_handler_timeout: Duration,
    pub stale_check_interval: Duration,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            stale_handler_timeout: DEFAULT_STALE_HANDLER_TIMEOUT,
            stale_check_interval: DEFAULT_STALE_CHECK_INTERVAL,
        }
    }
}

impl CoreConfig {
    /// Reads both knobs from the environment, falling back to the defaults
    /// on missing or unparseable values.
    pub fn from_env() -> Self {
        Self {
            stale_handler_timeout: env_secs(
                "TELLER_STALE_HANDLER_TIMEOUT_SECS",
                DEFAULT_STALE_HANDLER_TIMEOUT,
            ),
            stale_check_interval: env_secs(
                "TELLER_STALE_CHECK_INTERVAL_SECS",
                DEFAULT_STALE_CHECK_INTERVAL,
            ),
        }
    }
}

fn env_secs(key: &str, default: Duration) -> Duration {
    env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}
