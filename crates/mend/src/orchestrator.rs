//! The dispatch orchestrator: findings in, finalized actions out.
//!
//! For each finding in a batch the orchestrator selects a strategy, asks the
//! ledger to admit the action, optionally waits on the approval gate, executes
//! under a timeout with bounded retries, and hands the terminal action to the
//! notifier. All findings in a batch are dispatched as parallel tasks; the
//! ledger's admission lock is the only serialization point.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use mend_config::EngineConfig;
use notify::{ActionReport, Notifier};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::approval::{ApprovalGate, Verdict};
use crate::error::EngineError;
use crate::ledger::{ActionLedger, Admission};
use crate::models::{ActionKind, ActionStatus, Finding, RemediationAction};
use crate::remediators::{Registry, Remediator};

/// Whether a kind gets bounded re-attempts after an execution failure.
///
/// Restart and memory tuning are safe to re-issue; the approval-gated and
/// advisory kinds are not retried.
const fn retryable(kind: ActionKind) -> bool {
    matches!(kind, ActionKind::PodRestart | ActionKind::MemoryIncrease)
}

/// Flatten a terminal action into the channel-neutral report shape.
#[must_use]
pub fn action_report(action: &RemediationAction, cluster: &str) -> ActionReport {
    ActionReport {
        action_id: action.id,
        kind: action.kind.as_str().to_string(),
        target: action.target.name.clone(),
        namespace: action.target.namespace.clone(),
        status: action.status.as_str().to_string(),
        reason: action.reason.clone(),
        message: action.message.clone(),
        mutation_ref: action.mutation_ref.clone(),
        approved_by: action.approved_by.clone(),
        cluster: cluster.to_string(),
        timestamp: action.completed_at.unwrap_or(action.created_at),
    }
}

/// Per-cycle summary of what a dispatch batch did.
#[derive(Debug, Default, Clone, Serialize)]
pub struct DispatchReport {
    pub findings: usize,
    pub completed: usize,
    pub failed: usize,
    pub rejected: usize,
    pub conflicts: usize,
    pub unmatched: usize,
    pub errors: Vec<String>,
}

/// Terminal disposition of one finding within a batch.
#[derive(Debug)]
enum Disposition {
    Completed,
    Failed,
    Rejected,
    Conflict,
    Unmatched,
    Error(String),
}

/// Drives the detection-to-notification cycle.
pub struct Orchestrator {
    registry: Registry,
    ledger: ActionLedger,
    gate: ApprovalGate,
    notifier: Arc<Notifier>,
    config: EngineConfig,
}

impl Orchestrator {
    #[must_use]
    pub fn new(
        registry: Registry,
        ledger: ActionLedger,
        gate: ApprovalGate,
        notifier: Arc<Notifier>,
        config: EngineConfig,
    ) -> Self {
        Self {
            registry,
            ledger,
            gate,
            notifier,
            config,
        }
    }

    /// The ledger handle, shared with the operator surface.
    #[must_use]
    pub fn ledger(&self) -> ActionLedger {
        self.ledger.clone()
    }

    /// The approval gate handle, shared with the operator surface.
    #[must_use]
    pub fn gate(&self) -> ApprovalGate {
        self.gate.clone()
    }

    /// Dispatch one batch of findings, in parallel tasks, and summarize.
    ///
    /// Local conditions (no matching strategy, admission conflict, malformed
    /// input) never abort the batch; remaining findings proceed.
    pub async fn dispatch(self: &Arc<Self>, findings: Vec<Finding>) -> DispatchReport {
        let mut report = DispatchReport {
            findings: findings.len(),
            ..DispatchReport::default()
        };

        let tasks: Vec<_> = findings
            .into_iter()
            .map(|finding| {
                let orchestrator = Arc::clone(self);
                tokio::spawn(async move { orchestrator.dispatch_one(finding).await })
            })
            .collect();

        for outcome in join_all(tasks).await {
            match outcome {
                Ok(Disposition::Completed) => report.completed += 1,
                Ok(Disposition::Failed) => report.failed += 1,
                Ok(Disposition::Rejected) => report.rejected += 1,
                Ok(Disposition::Conflict) => report.conflicts += 1,
                Ok(Disposition::Unmatched) => report.unmatched += 1,
                Ok(Disposition::Error(e)) => report.errors.push(e),
                Err(join_err) => report.errors.push(format!("dispatch task panicked: {join_err}")),
            }
        }

        info!(
            findings = report.findings,
            completed = report.completed,
            failed = report.failed,
            rejected = report.rejected,
            conflicts = report.conflicts,
            unmatched = report.unmatched,
            "Dispatch cycle finished"
        );
        report
    }

    /// Map one finding's outcome to a disposition.
    ///
    /// Dispatch misses and admission conflicts surface as [`EngineError`]
    /// variants from `try_dispatch` and are recovered here; anything else is
    /// reported in the cycle summary.
    async fn dispatch_one(&self, finding: Finding) -> Disposition {
        match self.try_dispatch(finding).await {
            Ok(disposition) => disposition,
            Err(e @ EngineError::Dispatch { .. }) => {
                warn!(error = %e, "No remediator can handle finding");
                Disposition::Unmatched
            }
            Err(e @ EngineError::Conflict { .. }) => {
                debug!(error = %e, "Existing action is authoritative, skipping");
                Disposition::Conflict
            }
            Err(e) => {
                warn!(error = %e, "Dispatch error");
                Disposition::Error(e.to_string())
            }
        }
    }

    async fn try_dispatch(&self, finding: Finding) -> Result<Disposition, EngineError> {
        if !finding.target.is_valid() {
            return Err(EngineError::Validation(
                "malformed target in finding".to_string(),
            ));
        }

        let target = finding.target.clone();
        let strategy = self
            .registry
            .select(&target, finding.kind)
            .ok_or_else(|| EngineError::Dispatch {
                kind: finding.kind,
                target: target.id(),
            })?;

        let kind = strategy.kind();
        let requires_approval = self.requires_approval(kind);

        let action = match self
            .ledger
            .admit(target.id(), kind, requires_approval, &finding.evidence)
            .await
        {
            Admission::Admitted(action) => action,
            Admission::Conflict(_) => {
                return Err(EngineError::Conflict {
                    kind,
                    target: target.id(),
                });
            }
        };

        self.run_action(action, strategy, &finding).await
    }

    /// Take one admitted action through approval, execution and handoff.
    async fn run_action(
        &self,
        action: RemediationAction,
        strategy: Arc<dyn Remediator>,
        finding: &Finding,
    ) -> Result<Disposition, EngineError> {
        let id = action.id;

        if action.requires_approval {
            // Register before the status flips so an operator watching the
            // pending list can never approve an id the gate does not know.
            let pending = self.gate.register(id).await;
            self.ledger
                .transition(id, ActionStatus::AwaitingApproval)
                .await?;
            info!(action_id = %id, kind = %action.kind, "Awaiting operator approval");

            let expiry = Duration::from_secs(self.config.approval.expiry_secs);
            match pending.verdict(expiry).await {
                Verdict::Approved { approver } => {
                    self.ledger.attach_approval(id, &approver).await?;
                }
                Verdict::Rejected => {
                    let rejected = self.ledger.reject(id, "rejected by operator").await?;
                    self.hand_off(&rejected).await;
                    return Ok(Disposition::Rejected);
                }
                Verdict::Expired => {
                    let expired = EngineError::ApprovalTimeout(id);
                    let rejected = self.ledger.reject(id, &expired.to_string()).await?;
                    self.hand_off(&rejected).await;
                    return Ok(Disposition::Rejected);
                }
            }
        }

        self.ledger.transition(id, ActionStatus::Executing).await?;

        let max_attempts = if retryable(strategy.kind()) {
            self.config.retry.max_attempts.max(1)
        } else {
            1
        };
        let exec_timeout = Duration::from_secs(self.config.execution_timeout_secs);

        let mut last_error = EngineError::Execution("no attempts made".to_string());
        for attempt in 1..=max_attempts {
            self.ledger.record_attempt(id).await?;

            match tokio::time::timeout(exec_timeout, strategy.remediate(&finding.target)).await {
                Ok(Ok(remediation)) => {
                    let completed = self.ledger.complete(id, &remediation).await?;
                    self.hand_off(&completed).await;
                    return Ok(Disposition::Completed);
                }
                Ok(Err(e)) => last_error = e,
                Err(_) => {
                    last_error = EngineError::Execution(format!(
                        "execution timed out after {exec_timeout:?}"
                    ));
                }
            }

            if attempt < max_attempts {
                // Exponential: base, 2x base, 4x base, ... capped well below
                // overflow even with absurd attempt counts.
                let backoff = self
                    .config
                    .retry
                    .base_backoff_ms
                    .saturating_mul(1u64 << (attempt - 1).min(16));
                warn!(
                    action_id = %id,
                    attempt,
                    error = %last_error,
                    backoff_ms = backoff,
                    "Execution attempt failed, backing off"
                );
                tokio::time::sleep(Duration::from_millis(backoff)).await;
            }
        }

        let failed = self.ledger.fail(id, &last_error.to_string()).await?;
        self.hand_off(&failed).await;
        Ok(Disposition::Failed)
    }

    /// Approval policy, keyed by action kind.
    fn requires_approval(&self, kind: ActionKind) -> bool {
        match kind {
            ActionKind::SecurityFix => self.config.approval.security_fix,
            ActionKind::ProbeInjection => self.config.approval.probe_injection,
            ActionKind::PodRestart | ActionKind::MemoryIncrease | ActionKind::CertRenewalAlert => {
                false
            }
        }
    }

    /// Best-effort handoff of a terminal action to the notifier.
    ///
    /// Delivery failures are logged and never roll back the recorded status.
    async fn hand_off(&self, action: &RemediationAction) {
        let report = action_report(action, &self.config.cluster_name);
        for (channel, result) in self.notifier.notify_and_wait(&report).await {
            if let Err(e) = result {
                warn!(
                    channel = %channel,
                    action_id = %action.id,
                    error = %e,
                    "Report delivery failed"
                );
            }
        }
    }
}
