//! Retry discipline (spec §4.6.1): exponential backoff with a total
//! failure cap.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_INITIAL_DELAY_MS: u64 = 1000;
const DEFAULT_MAX_DELAY_MS: u64 = 30_000;
const DEFAULT_MULTIPLIER: f64 = 2.0;

/// A step's `retry_config` document, with spec-mandated defaults applied
/// per missing field.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}
fn default_initial_delay_ms() -> u64 {
    DEFAULT_INITIAL_DELAY_MS
}
fn default_max_delay_ms() -> u64 {
    DEFAULT_MAX_DELAY_MS
}
fn default_multiplier() -> f64 {
    DEFAULT_MULTIPLIER
}

impl RetryConfig {
    /// Parse a step's `retry_config` JSON document, if present. An absent
    /// document (`None`) means the step is not retried at all; a present
    /// but empty object (`{}`) takes every default.
    pub fn from_json(value: Option<&Value>) -> Option<Self> {
        let value = value?;
        if value.is_null() {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    /// Delay before attempt `n` (n≥0, counted from the first retry):
    /// `min(initial·multiplier^n, max)` ms (spec §4.6.1).
    pub fn delay_for_attempt(&self, n: u32) -> Duration {
        let scaled = self.initial_delay_ms as f64 * self.multiplier.powi(n as i32);
        let capped = scaled.min(self.max_delay_ms as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }
}
