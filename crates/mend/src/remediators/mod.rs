//! Remediation strategies and the capability registry that selects them.
//!
//! Every strategy implements [`Remediator`] and declares which finding kinds
//! it can resolve. The registry holds strategies in a fixed priority order and
//! returns the first one whose `can_handle` accepts the (target, finding kind)
//! pair.

pub mod memory;
pub mod pod_restart;
pub mod stubs;

use async_trait::async_trait;
use mend_config::EngineConfig;
use std::sync::Arc;

use crate::error::EngineError;
use crate::models::{ActionKind, FindingKind, Remediation, Target};

pub use memory::MemoryIncreaser;
pub use pod_restart::PodRestarter;
pub use stubs::{CertRenewalAlerter, ProbeInjector, SecurityFixer};

/// A strategy capable of resolving one or more finding kinds.
#[async_trait]
pub trait Remediator: Send + Sync {
    /// The action kind this strategy produces.
    fn kind(&self) -> ActionKind;

    /// Whether this strategy can resolve the given finding on the given target.
    fn can_handle(&self, target: &Target, finding: FindingKind) -> bool;

    /// Produce the corrective change for the target.
    ///
    /// May involve a blocking external call; the orchestrator bounds it with a
    /// timeout. Applying the change to infrastructure is external.
    async fn remediate(&self, target: &Target) -> Result<Remediation, EngineError>;
}

/// Ordered set of remediation strategies.
pub struct Registry {
    strategies: Vec<Arc<dyn Remediator>>,
}

impl Registry {
    /// Build the standard registry, honoring per-kind enable flags.
    ///
    /// Priority order is fixed: restart beats memory tuning beats the
    /// advisory strategies.
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        let mut strategies: Vec<Arc<dyn Remediator>> = Vec::new();

        if config.enable.pod_restart {
            strategies.push(Arc::new(PodRestarter::new()));
        }
        if config.enable.memory_increase {
            strategies.push(Arc::new(MemoryIncreaser::new(
                config.memory_increment_percent,
            )));
        }
        if config.enable.security_fix {
            strategies.push(Arc::new(SecurityFixer::new()));
        }
        if config.enable.probe_injection {
            strategies.push(Arc::new(ProbeInjector::new()));
        }
        if config.enable.cert_alerts {
            strategies.push(Arc::new(CertRenewalAlerter::new()));
        }

        Self { strategies }
    }

    /// Build a registry from explicit strategies, in the given priority order.
    #[must_use]
    pub fn with_strategies(strategies: Vec<Arc<dyn Remediator>>) -> Self {
        Self { strategies }
    }

    /// Return the first strategy that accepts the (target, finding kind) pair.
    #[must_use]
    pub fn select(&self, target: &Target, finding: FindingKind) -> Option<Arc<dyn Remediator>> {
        self.strategies
            .iter()
            .find(|s| s.can_handle(target, finding))
            .cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ResourceRequests, TargetStatus};
    use chrono::Utc;
    use std::collections::HashMap;

    fn target(status: TargetStatus, restarts: u32) -> Target {
        Target {
            name: "app".to_string(),
            namespace: "production".to_string(),
            node_name: None,
            status,
            restarts,
            resources: ResourceRequests {
                cpu: "500m".to_string(),
                memory: "512Mi".to_string(),
            },
            labels: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_select_matches_finding_kind() {
        let registry = Registry::from_config(&EngineConfig::default());

        let crash = target(TargetStatus::CrashLoopBackOff, 8);
        let selected = registry.select(&crash, FindingKind::CrashLoop).unwrap();
        assert_eq!(selected.kind(), ActionKind::PodRestart);

        let oom = target(TargetStatus::OomKilled, 0);
        let selected = registry.select(&oom, FindingKind::OomKill).unwrap();
        assert_eq!(selected.kind(), ActionKind::MemoryIncrease);
    }

    #[test]
    fn test_select_respects_enable_flags() {
        let mut config = EngineConfig::default();
        config.enable.pod_restart = false;
        let registry = Registry::from_config(&config);

        let crash = target(TargetStatus::CrashLoopBackOff, 8);
        assert!(registry.select(&crash, FindingKind::CrashLoop).is_none());
    }

    #[test]
    fn test_probe_injection_disabled_by_default() {
        let registry = Registry::from_config(&EngineConfig::default());
        let t = target(TargetStatus::Running, 0);
        assert!(registry.select(&t, FindingKind::MissingProbe).is_none());
    }

    #[test]
    fn test_no_strategy_for_mismatched_kind() {
        let registry = Registry::from_config(&EngineConfig::default());
        // A running pod produces no crash-loop capability match.
        let t = target(TargetStatus::Running, 0);
        assert!(registry.select(&t, FindingKind::CrashLoop).is_none());
    }
}
