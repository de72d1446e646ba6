// Scheduler configuration: environment-driven, with documented defaults.
// Mirrors `orchestrator::OrchestratorConfig::from_env()`'s idiom.

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub tick_interval_ms: u64,
    pub max_concurrent: usize,
    pub default_retries: u32,
    pub default_retry_delay_ms: u64,
    pub default_timeout_ms: u64,
}

impl SchedulerConfig {
    pub fn from_env() -> Self {
        Self {
            tick_interval_ms: env_u64("SCHEDULER_TICK_MS", 60_000),
            max_concurrent: env_usize("SCHEDULER_MAX_CONCURRENT", 10),
            default_retries: env_u32("SCHEDULER_DEFAULT_RETRIES", 3),
            default_retry_delay_ms: env_u64("SCHEDULER_DEFAULT_RETRY_DELAY_MS", 5_000),
            default_timeout_ms: env_u64("SCHEDULER_DEFAULT_TIMEOUT_MS", 300_000),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 60_000,
            max_concurrent: 10,
            default_retries: 3,
            default_retry_delay_ms: 5_000,
            default_timeout_ms: 300_000,
        }
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_documented_defaults() {
        let config = SchedulerConfig::default();
        assert_eq!(config.tick_interval_ms, 60_000);
        assert_eq!(config.max_concurrent, 10);
        assert_eq!(config.default_retries, 3);
        assert_eq!(config.default_timeout_ms, 300_000);
    }
}
