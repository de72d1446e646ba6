// Orchestrator configuration: environment-driven, with documented defaults.
// Mirrors the teacher's `RunnerConfig::from_env()` idiom (one `env::var` per
// field, parsed with a fallback rather than failing construction).

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub max_concurrent_steps: usize,
    pub default_step_timeout_ms: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl OrchestratorConfig {
    pub fn from_env() -> Self {
        Self {
            max_concurrent_steps: env_usize("ORCH_MAX_CONCURRENT_STEPS", 3),
            default_step_timeout_ms: env_u64("ORCH_DEFAULT_STEP_TIMEOUT_MS", 60_000),
            max_retries: env_u32("ORCH_MAX_RETRIES", 2),
            retry_delay_ms: env_u64("ORCH_RETRY_DELAY_MS", 1_000),
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_steps: 3,
            default_step_timeout_ms: 60_000,
            max_retries: 2,
            retry_delay_ms: 1_000,
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
        let config = OrchestratorConfig::default();
        assert_eq!(config.max_concurrent_steps, 3);
        assert_eq!(config.default_step_timeout_ms, 60_000);
        assert_eq!(config.max_retries, 2);
        assert_eq!(config.retry_delay_ms, 1_000);
    }
}
