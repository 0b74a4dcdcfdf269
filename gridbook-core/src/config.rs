//! Core configuration structures.
//!
//! Deserializable so an embedding server can map its config file straight
//! onto these; every field has a default so `CoreConfig::default()` is a
//! working configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the betting core.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CoreConfig {
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub breaker: BreakerConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

/// Pricing cache tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// How long a cache entry is considered fresh.
    #[serde(default = "default_entry_ttl")]
    pub entry_ttl: Duration,
    /// Bound on a single authoritative catalog read.
    #[serde(default = "default_catalog_timeout")]
    pub catalog_timeout: Duration,
}

fn default_entry_ttl() -> Duration {
    Duration::from_secs(60)
}

fn default_catalog_timeout() -> Duration {
    Duration::from_secs(5)
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            entry_ttl: default_entry_ttl(),
            catalog_timeout: default_catalog_timeout(),
        }
    }
}

/// Circuit breaker tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Number of most recent call outcomes kept in the sliding window.
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    /// Minimum outcomes in the window before the failure rate is evaluated.
    #[serde(default = "default_min_calls")]
    pub min_calls: usize,
    /// Failure rate in the window at or above which the breaker opens.
    #[serde(default = "default_failure_rate")]
    pub failure_rate_threshold: f64,
    /// How long the breaker stays Open before allowing half-open probes.
    #[serde(default = "default_cooldown")]
    pub cooldown: Duration,
    /// Maximum concurrent trial calls while HalfOpen.
    #[serde(default = "default_half_open_max_probes")]
    pub half_open_max_probes: u32,
    /// Consecutive probe successes required to close the breaker.
    #[serde(default = "default_half_open_required_successes")]
    pub half_open_required_successes: u32,
}

fn default_window_size() -> usize {
    16
}

fn default_min_calls() -> usize {
    4
}

fn default_failure_rate() -> f64 {
    0.5
}

fn default_cooldown() -> Duration {
    Duration::from_secs(30)
}

fn default_half_open_max_probes() -> u32 {
    2
}

fn default_half_open_required_successes() -> u32 {
    2
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            min_calls: default_min_calls(),
            failure_rate_threshold: default_failure_rate(),
            cooldown: default_cooldown(),
            half_open_max_probes: default_half_open_max_probes(),
            half_open_required_successes: default_half_open_required_successes(),
        }
    }
}

/// Notification relay tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// How long a delivery may stay unacknowledged before it is re-sent.
    #[serde(default = "default_redeliver_after")]
    pub redeliver_after: Duration,
    /// How often the redelivery sweep runs.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval: Duration,
    /// Delivery attempts per notification before the relay gives up.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

fn default_redeliver_after() -> Duration {
    Duration::from_secs(30)
}

fn default_sweep_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_max_attempts() -> u32 {
    12
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            redeliver_after: default_redeliver_after(),
            sweep_interval: default_sweep_interval(),
            max_attempts: default_max_attempts(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let config = CoreConfig::default();
        assert!(config.pricing.entry_ttl > config.pricing.catalog_timeout);
        assert!(config.breaker.min_calls <= config.breaker.window_size);
        assert!(config.breaker.failure_rate_threshold > 0.0);
        assert!(config.breaker.failure_rate_threshold <= 1.0);
        assert!(config.relay.sweep_interval < config.relay.redeliver_after);
    }

    #[test]
    fn test_partial_config_parsing() {
        let json = r#"{ "breaker": { "min_calls": 2 } }"#;
        let config: CoreConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.breaker.min_calls, 2);
        // Unspecified sections and fields fall back to defaults.
        assert_eq!(config.breaker.window_size, 16);
        assert_eq!(config.pricing.entry_ttl, Duration::from_secs(60));
    }
}
