// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::rollout::{ExponentialBackoff, RolloutSettings};
use anyhow::{bail, Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Restrict the controller to one namespace; all namespaces when unset
    pub watch_namespace: Option<String>,
    /// Upper bound on reconciliation passes running in parallel
    pub max_concurrent_reconciles: u16,
    /// Upper bound on restart triggers running in parallel
    pub max_concurrent_rollouts: usize,
    pub rollout_backoff_base: Duration,
    pub rollout_backoff_max: Duration,
    /// Consecutive failures after which a rollout is abandoned
    pub rollout_max_attempts: u32,
    pub provider_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let watch_namespace = lookup("WATCH_NAMESPACE").filter(|ns| !ns.trim().is_empty());
        let max_concurrent_reconciles = parse_or(&lookup, "MAX_CONCURRENT_RECONCILES", 2u16)?;
        let max_concurrent_rollouts = parse_or(&lookup, "MAX_CONCURRENT_ROLLOUTS", 3usize)?;
        let backoff_base = parse_or(&lookup, "ROLLOUT_BACKOFF_BASE_SECS", 1u64)?;
        let backoff_max = parse_or(&lookup, "ROLLOUT_BACKOFF_MAX_SECS", 60u64)?;
        let rollout_max_attempts = parse_or(&lookup, "ROLLOUT_MAX_ATTEMPTS", 10u32)?;
        let provider_timeout = parse_or(&lookup, "PROVIDER_TIMEOUT_SECS", 30u64)?;

        if max_concurrent_rollouts == 0 {
            bail!("MAX_CONCURRENT_ROLLOUTS must be greater than zero");
        }
        if rollout_max_attempts == 0 {
            bail!("ROLLOUT_MAX_ATTEMPTS must be greater than zero");
        }
        if backoff_base > backoff_max {
            bail!("ROLLOUT_BACKOFF_BASE_SECS must not exceed ROLLOUT_BACKOFF_MAX_SECS");
        }

        Ok(Config {
            watch_namespace,
            max_concurrent_reconciles,
            max_concurrent_rollouts,
            rollout_backoff_base: Duration::from_secs(backoff_base),
            rollout_backoff_max: Duration::from_secs(backoff_max),
            rollout_max_attempts,
            provider_timeout: Duration::from_secs(provider_timeout),
        })
    }

    pub fn rollout_settings(&self) -> RolloutSettings {
        RolloutSettings {
            max_concurrent: self.max_concurrent_rollouts,
            backoff: ExponentialBackoff::new(self.rollout_backoff_base, self.rollout_backoff_max),
            max_attempts: self.rollout_max_attempts,
        }
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {:?}", key, raw)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();

        assert_eq!(config.watch_namespace, None);
        assert_eq!(config.max_concurrent_reconciles, 2);
        assert_eq!(config.max_concurrent_rollouts, 3);
        assert_eq!(config.rollout_backoff_base, Duration::from_secs(1));
        assert_eq!(config.rollout_backoff_max, Duration::from_secs(60));
        assert_eq!(config.rollout_max_attempts, 10);
        assert_eq!(config.provider_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("WATCH_NAMESPACE", "apps"),
            ("MAX_CONCURRENT_ROLLOUTS", " 5 "),
            ("ROLLOUT_MAX_ATTEMPTS", "4"),
        ]))
        .unwrap();

        assert_eq!(config.watch_namespace.as_deref(), Some("apps"));
        assert_eq!(config.max_concurrent_rollouts, 5);
        assert_eq!(config.rollout_settings().max_attempts, 4);
    }

    #[test]
    fn test_blank_namespace_means_all() {
        let config = Config::from_lookup(lookup_from(&[("WATCH_NAMESPACE", "  ")])).unwrap();
        assert_eq!(config.watch_namespace, None);
    }

    #[test]
    fn test_rejects_garbage() {
        let err = Config::from_lookup(lookup_from(&[("MAX_CONCURRENT_ROLLOUTS", "many")]))
            .unwrap_err();
        assert!(err.to_string().contains("MAX_CONCURRENT_ROLLOUTS"));
    }

    #[test]
    fn test_rejects_zero_rollouts() {
        assert!(Config::from_lookup(lookup_from(&[("MAX_CONCURRENT_ROLLOUTS", "0")])).is_err());
    }

    #[test]
    fn test_rejects_inverted_backoff() {
        assert!(Config::from_lookup(lookup_from(&[
            ("ROLLOUT_BACKOFF_BASE_SECS", "120"),
            ("ROLLOUT_BACKOFF_MAX_SECS", "60"),
        ]))
        .is_err());
    }
}
