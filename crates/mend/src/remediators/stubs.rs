//! Advisory strategies for finding kinds whose detection rules are reserved.
//!
//! These keep the registry total over the action kind set: each accepts its
//! finding kind and produces a deterministic advisory remediation. When the
//! corresponding detector rules gain real predicates, these grow real
//! mutations without the orchestrator changing.

use async_trait::async_trait;
use tracing::info;

use crate::error::EngineError;
use crate::models::{ActionKind, FindingKind, Remediation, Target};

use super::Remediator;

/// Applies hardening changes for detected security issues.
#[derive(Debug, Default)]
pub struct SecurityFixer;

impl SecurityFixer {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Remediator for SecurityFixer {
    fn kind(&self) -> ActionKind {
        ActionKind::SecurityFix
    }

    fn can_handle(&self, _target: &Target, finding: FindingKind) -> bool {
        finding == FindingKind::SecurityIssue
    }

    async fn remediate(&self, target: &Target) -> Result<Remediation, EngineError> {
        info!(target = %target.id(), "Preparing security context fix");

        Ok(Remediation {
            reason: "security issue detected".to_string(),
            message: format!("security context hardening prepared for {}", target.id()),
            mutation_ref: Some(format!(
                "patch/{}/{}/security-context",
                target.namespace, target.name
            )),
        })
    }
}

/// Injects missing liveness/readiness probes.
#[derive(Debug, Default)]
pub struct ProbeInjector;

impl ProbeInjector {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Remediator for ProbeInjector {
    fn kind(&self) -> ActionKind {
        ActionKind::ProbeInjection
    }

    fn can_handle(&self, _target: &Target, finding: FindingKind) -> bool {
        finding == FindingKind::MissingProbe
    }

    async fn remediate(&self, target: &Target) -> Result<Remediation, EngineError> {
        info!(target = %target.id(), "Preparing probe injection");

        Ok(Remediation {
            reason: "workload has no health probes".to_string(),
            message: format!("liveness/readiness probes prepared for {}", target.id()),
            mutation_ref: Some(format!("patch/{}/{}/probes", target.namespace, target.name)),
        })
    }
}

/// Raises an early-warning alert for expiring certificates. Renewal itself is
/// a human decision; the action only carries the warning.
#[derive(Debug, Default)]
pub struct CertRenewalAlerter;

impl CertRenewalAlerter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Remediator for CertRenewalAlerter {
    fn kind(&self) -> ActionKind {
        ActionKind::CertRenewalAlert
    }

    fn can_handle(&self, _target: &Target, finding: FindingKind) -> bool {
        finding == FindingKind::CertExpiring
    }

    async fn remediate(&self, target: &Target) -> Result<Remediation, EngineError> {
        info!(target = %target.id(), "Raising certificate renewal alert");

        Ok(Remediation {
            reason: "certificate nearing expiry".to_string(),
            message: format!("renewal alert raised for {}", target.id()),
            mutation_ref: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ResourceRequests, TargetStatus};
    use chrono::Utc;
    use std::collections::HashMap;

    fn target() -> Target {
        Target {
            name: "svc".to_string(),
            namespace: "staging".to_string(),
            node_name: None,
            status: TargetStatus::Running,
            restarts: 0,
            resources: ResourceRequests::default(),
            labels: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_each_stub_accepts_only_its_kind() {
        let t = target();
        assert!(SecurityFixer::new().can_handle(&t, FindingKind::SecurityIssue));
        assert!(!SecurityFixer::new().can_handle(&t, FindingKind::CrashLoop));
        assert!(ProbeInjector::new().can_handle(&t, FindingKind::MissingProbe));
        assert!(!ProbeInjector::new().can_handle(&t, FindingKind::OomKill));
        assert!(CertRenewalAlerter::new().can_handle(&t, FindingKind::CertExpiring));
        assert!(!CertRenewalAlerter::new().can_handle(&t, FindingKind::MissingProbe));
    }

    #[tokio::test]
    async fn test_stubs_produce_deterministic_remediations() {
        let t = target();
        let a = SecurityFixer::new().remediate(&t).await.unwrap();
        let b = SecurityFixer::new().remediate(&t).await.unwrap();
        assert_eq!(a.message, b.message);
        assert_eq!(a.mutation_ref, b.mutation_ref);

        let cert = CertRenewalAlerter::new().remediate(&t).await.unwrap();
        assert!(cert.mutation_ref.is_none());
    }
}
