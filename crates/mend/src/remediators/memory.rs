//! Memory-request tuning for OOM-killed workloads.

use async_trait::async_trait;
use tracing::info;

use crate::error::EngineError;
use crate::models::{
    scale_quantity, ActionKind, FindingKind, Remediation, Target, TargetStatus,
};

use super::Remediator;

/// Raises the memory request of an OOM-killed workload so the next scheduling
/// round gives it headroom instead of another kill.
#[derive(Debug)]
pub struct MemoryIncreaser {
    increment_percent: u32,
}

impl MemoryIncreaser {
    #[must_use]
    pub fn new(increment_percent: u32) -> Self {
        Self { increment_percent }
    }
}

#[async_trait]
impl Remediator for MemoryIncreaser {
    fn kind(&self) -> ActionKind {
        ActionKind::MemoryIncrease
    }

    fn can_handle(&self, target: &Target, finding: FindingKind) -> bool {
        finding == FindingKind::OomKill && target.status == TargetStatus::OomKilled
    }

    async fn remediate(&self, target: &Target) -> Result<Remediation, EngineError> {
        let current = &target.resources.memory;
        let raised = scale_quantity(current, self.increment_percent)
            .map_err(|e| EngineError::Execution(format!("cannot raise memory request: {e}")))?;

        info!(
            target = %target.id(),
            from = %current,
            to = %raised,
            "Raising memory request"
        );

        Ok(Remediation {
            reason: format!("workload was OOM-killed at a request of {current}"),
            message: format!(
                "memory request raised from {current} to {raised} (+{}%)",
                self.increment_percent
            ),
            mutation_ref: Some(format!(
                "patch/{}/{}/memory/{raised}",
                target.namespace, target.name
            )),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResourceRequests;
    use chrono::Utc;
    use std::collections::HashMap;

    fn target(memory: &str, status: TargetStatus) -> Target {
        Target {
            name: "memory-hog".to_string(),
            namespace: "production".to_string(),
            node_name: None,
            status,
            restarts: 3,
            resources: ResourceRequests {
                cpu: "1000m".to_string(),
                memory: memory.to_string(),
            },
            labels: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_can_handle_only_oom() {
        let r = MemoryIncreaser::new(50);
        assert!(r.can_handle(&target("512Mi", TargetStatus::OomKilled), FindingKind::OomKill));
        assert!(!r.can_handle(&target("512Mi", TargetStatus::Running), FindingKind::OomKill));
        assert!(!r.can_handle(
            &target("512Mi", TargetStatus::OomKilled),
            FindingKind::CrashLoop
        ));
    }

    #[tokio::test]
    async fn test_default_increment_512mi_becomes_768mi() {
        let r = MemoryIncreaser::new(50);
        let remediation = r
            .remediate(&target("512Mi", TargetStatus::OomKilled))
            .await
            .unwrap();
        assert!(remediation.message.contains("512Mi to 768Mi"));
        assert_eq!(
            remediation.mutation_ref.as_deref(),
            Some("patch/production/memory-hog/memory/768Mi")
        );
    }

    #[tokio::test]
    async fn test_custom_increment() {
        let r = MemoryIncreaser::new(100);
        let remediation = r
            .remediate(&target("1Gi", TargetStatus::OomKilled))
            .await
            .unwrap();
        assert!(remediation.message.contains("1Gi to 2Gi"));
    }

    #[tokio::test]
    async fn test_unparseable_request_fails_execution() {
        let r = MemoryIncreaser::new(50);
        let err = r
            .remediate(&target("lots", TargetStatus::OomKilled))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Execution(_)));
        assert!(err.to_string().contains("cannot raise memory request"));
    }
}
