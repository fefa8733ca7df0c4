//! Process configuration, read once at startup from the environment.
//!
//! Mirrors the way `database::Database::new` and the LLM client used to read
//! their own settings piecemeal from `std::env`; collected here so `main`
//! reads the environment exactly once.

use std::env;
use std::time::Duration;

/// Recognized process configuration (spec §6.5).
#[derive(Debug, Clone)]
pub struct Config {
    /// Authentication for the LLM provider.
    pub llm_api_key: String,
    /// Wire version tag sent to the LLM provider.
    pub llm_api_version: String,
    /// Relational store connection string.
    pub database_url: String,
    /// Max pooled database connections.
    pub database_max_connections: u32,
    /// Whether the per-minute scheduler tick runs.
    pub scheduler_enabled: bool,
    /// Tick interval for the scheduler. Not a spec-required key; an internal
    /// tuning knob that defaults to the spec's "once per minute" cadence.
    pub scheduler_tick: Duration,
    /// Admin HTTP bind port. Read for completeness; the admin surface itself
    /// is an external collaborator this crate does not serve.
    pub port: u16,
}

impl Config {
    /// Load configuration from the environment, applying the same
    /// optional-with-default pattern the source crate used per setting.
    pub fn from_env() -> Self {
        Self {
            llm_api_key: env::var("LLM_API_KEY").unwrap_or_default(),
            llm_api_version: env::var("LLM_API_VERSION")
                .unwrap_or_else(|_| "2023-06-01".to_string()),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgresql://localhost/conveyor".to_string()),
            database_max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10),
            scheduler_enabled: env::var("SCHEDULER_ENABLED")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(true),
            scheduler_tick: env::var("SCHEDULER_TICK_SECONDS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or_else(|| Duration::from_secs(60)),
            port: env::var("PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8080),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn defaults_when_unset() {
        for key in [
            "LLM_API_KEY",
            "LLM_API_VERSION",
            "DATABASE_URL",
            "SCHEDULER_ENABLED",
            "SCHEDULER_TICK_SECONDS",
            "PORT",
        ] {
            env::remove_var(key);
        }
        let config = Config::from_env();
        assert_eq!(config.llm_api_version, "2023-06-01");
        assert!(config.scheduler_enabled);
        assert_eq!(config.scheduler_tick, Duration::from_secs(60));
    }
}
