//! Restart strategy for crash-looping workloads.

use async_trait::async_trait;
use tracing::info;

use crate::detector::CRASH_RESTART_THRESHOLD;
use crate::error::EngineError;
use crate::models::{ActionKind, FindingKind, Remediation, Target, TargetStatus};

use super::Remediator;

/// Restarts workloads stuck in a crash loop. A fresh start breaks the
/// backoff cycle when the underlying cause was transient.
#[derive(Debug, Default)]
pub struct PodRestarter;

impl PodRestarter {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Remediator for PodRestarter {
    fn kind(&self) -> ActionKind {
        ActionKind::PodRestart
    }

    fn can_handle(&self, target: &Target, finding: FindingKind) -> bool {
        finding == FindingKind::CrashLoop
            && (target.status == TargetStatus::CrashLoopBackOff
                || target.restarts > CRASH_RESTART_THRESHOLD)
    }

    async fn remediate(&self, target: &Target) -> Result<Remediation, EngineError> {
        info!(target = %target.id(), "Issuing restart");

        Ok(Remediation {
            reason: format!(
                "workload is crash-looping ({} restarts)",
                target.restarts
            ),
            message: format!("restart issued for {}", target.id()),
            mutation_ref: None,
        })
    }
}
