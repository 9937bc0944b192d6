//! Configuration for the Mend remediation engine.
//!
//! Every knob is read from an environment variable with a sane default, so a
//! ConfigMap or deployment manifest can tune behavior without a rebuild.
//! Malformed values fall back to the default with a warning rather than
//! aborting startup.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Errors raised when a configuration value cannot be used at all.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required value is missing and has no default.
    #[error("missing required configuration: {0}")]
    Missing(&'static str),

    /// A value is present but unusable.
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Per-kind enable flags for remediation strategies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureFlags {
    pub pod_restart: bool,
    pub memory_increase: bool,
    pub security_fix: bool,
    /// Probe injection is off by default: injecting probes into a workload
    /// that was never designed for them can take it down.
    pub probe_injection: bool,
    pub cert_alerts: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            pod_restart: true,
            memory_increase: true,
            security_fix: true,
            probe_injection: false,
            cert_alerts: true,
        }
    }
}

/// Which action kinds must be signed off by a human before executing, and how
/// long the engine waits for that sign-off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalPolicy {
    pub security_fix: bool,
    pub probe_injection: bool,
    /// Seconds an action may sit in `AwaitingApproval` before it is
    /// automatically rejected.
    pub expiry_secs: u64,
}

impl Default for ApprovalPolicy {
    fn default() -> Self {
        Self {
            security_fix: true,
            probe_injection: true,
            expiry_secs: 900,
        }
    }
}

/// Bounded retry parameters for retryable action kinds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Backoff before the second attempt; doubles for each attempt after.
    pub base_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff_ms: 500,
        }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Cluster identity, attached to reports for humans triaging alerts.
    pub cluster_name: String,
    pub cluster_region: String,

    pub enable: FeatureFlags,
    pub approval: ApprovalPolicy,
    pub retry: RetryPolicy,

    /// How much to raise a memory request by, in percent of the current value.
    pub memory_increment_percent: u32,

    /// Wall-clock bound on a single remediation attempt.
    pub execution_timeout_secs: u64,

    pub log_level: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cluster_name: "unknown".to_string(),
            cluster_region: "us-east-1".to_string(),
            enable: FeatureFlags::default(),
            approval: ApprovalPolicy::default(),
            retry: RetryPolicy::default(),
            memory_increment_percent: 50,
            execution_timeout_secs: 120,
            log_level: "info".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from process environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// `from_env` is a thin wrapper over this; tests inject a map instead of
    /// mutating the process environment.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            cluster_name: get_str(&lookup, "CLUSTER_NAME", &defaults.cluster_name),
            cluster_region: get_str(&lookup, "CLUSTER_REGION", &defaults.cluster_region),
            enable: FeatureFlags {
                pod_restart: get_bool(&lookup, "ENABLE_POD_RESTART", defaults.enable.pod_restart),
                memory_increase: get_bool(
                    &lookup,
                    "ENABLE_MEMORY_INCREASE",
                    defaults.enable.memory_increase,
                ),
                security_fix: get_bool(
                    &lookup,
                    "ENABLE_SECURITY_FIX",
                    defaults.enable.security_fix,
                ),
                probe_injection: get_bool(
                    &lookup,
                    "ENABLE_PROBE_INJECTION",
                    defaults.enable.probe_injection,
                ),
                cert_alerts: get_bool(&lookup, "ENABLE_CERT_ALERTS", defaults.enable.cert_alerts),
            },
            approval: ApprovalPolicy {
                security_fix: get_bool(
                    &lookup,
                    "APPROVAL_REQUIRED_SECURITY_FIX",
                    defaults.approval.security_fix,
                ),
                probe_injection: get_bool(
                    &lookup,
                    "APPROVAL_REQUIRED_PROBE_INJECTION",
                    defaults.approval.probe_injection,
                ),
                expiry_secs: get_u64(
                    &lookup,
                    "APPROVAL_EXPIRY_SECS",
                    defaults.approval.expiry_secs,
                ),
            },
            retry: RetryPolicy {
                max_attempts: get_u32(
                    &lookup,
                    "RETRY_MAX_ATTEMPTS",
                    defaults.retry.max_attempts,
                ),
                base_backoff_ms: get_u64(
                    &lookup,
                    "RETRY_BASE_BACKOFF_MS",
                    defaults.retry.base_backoff_ms,
                ),
            },
            memory_increment_percent: get_u32(
                &lookup,
                "MEMORY_INCREMENT_PERCENT",
                defaults.memory_increment_percent,
            ),
            execution_timeout_secs: get_u64(
                &lookup,
                "EXECUTION_TIMEOUT_SECS",
                defaults.execution_timeout_secs,
            ),
            log_level: get_str(&lookup, "LOG_LEVEL", &defaults.log_level),
        }
    }
}

fn get_str<F>(lookup: &F, key: &str, default: &str) -> String
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(v) if !v.is_empty() => v,
        _ => default.to_string(),
    }
}

fn get_bool<F>(lookup: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(v) if !v.is_empty() => match v.to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => true,
            "false" | "0" | "no" => false,
            _ => {
                warn!(key, value = %v, "unparseable boolean, using default");
                default
            }
        },
        _ => default,
    }
}

fn get_u32<F>(lookup: &F, key: &str, default: u32) -> u32
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(v) if !v.is_empty() => v.parse().unwrap_or_else(|_| {
            warn!(key, value = %v, "unparseable integer, using default");
            default
        }),
        _ => default,
    }
}

fn get_u64<F>(lookup: &F, key: &str, default: u64) -> u64
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(v) if !v.is_empty() => v.parse().unwrap_or_else(|_| {
            warn!(key, value = %v, "unparseable integer, using default");
            default
        }),
        _ => default,
    }
}
