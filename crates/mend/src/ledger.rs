//! The action ledger: admission control and lifecycle tracking.
//!
//! The ledger is the single source of truth for two invariants:
//!
//! - at most one non-terminal action exists per (target identity, kind), so a
//!   finding re-detected every cycle cannot start a remediation storm;
//! - status transitions only move forward along the lifecycle state machine.
//!
//! Admission and transitions take the same write lock, so concurrent dispatch
//! tasks serialize here and nowhere else. Terminal actions stay in the ledger,
//! immutable, as the audit record.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::{ActionKind, ActionStatus, Remediation, RemediationAction, TargetId};

/// Result of asking the ledger to admit a new action.
#[derive(Debug)]
pub enum Admission {
    /// A new action was created in `Pending`.
    Admitted(RemediationAction),
    /// An in-flight action already covers this key; it is authoritative.
    Conflict(RemediationAction),
}

#[derive(Default)]
struct LedgerInner {
    /// Every action ever admitted, by id.
    actions: HashMap<Uuid, RemediationAction>,
    /// Id of the single non-terminal action per key, if any.
    active: HashMap<(TargetId, ActionKind), Uuid>,
}

/// In-memory action ledger. Cheap to clone a handle via `Arc`.
#[derive(Default)]
pub struct ActionLedger {
    inner: Arc<RwLock<LedgerInner>>,
}

impl ActionLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit a new action for (target, kind), or report the existing one.
    ///
    /// Atomic with respect to concurrent callers: exactly one caller per key
    /// gets `Admitted` while an action is in flight; everyone else must treat
    /// the returned conflict action as authoritative and do nothing.
    pub async fn admit(
        &self,
        target: TargetId,
        kind: ActionKind,
        requires_approval: bool,
        reason: &str,
    ) -> Admission {
        let mut inner = self.inner.write().await;
        let key = (target.clone(), kind);

        if let Some(existing_id) = inner.active.get(&key) {
            // The active index never holds terminal ids (transition() removes
            // them), so any hit is a live conflict.
            let existing = inner.actions[existing_id].clone();
            debug!(
                action_id = %existing.id,
                target = %target,
                kind = %kind,
                "Admission conflict: action already in flight"
            );
            return Admission::Conflict(existing);
        }

        let action = RemediationAction::new(kind, target.clone(), requires_approval, reason);
        info!(
            action_id = %action.id,
            target = %target,
            kind = %kind,
            requires_approval,
            "Action admitted"
        );
        inner.active.insert(key, action.id);
        inner.actions.insert(action.id, action.clone());
        Admission::Admitted(action)
    }

    /// Move an action forward along the lifecycle state machine.
    ///
    /// Rejects regressions and skips with `InvalidTransition`, and refuses to
    /// enter `Executing` without an approval record when one is required.
    pub async fn transition(
        &self,
        id: Uuid,
        next: ActionStatus,
    ) -> Result<RemediationAction, EngineError> {
        let mut inner = self.inner.write().await;
        let action = inner.actions.get_mut(&id).ok_or(EngineError::NotFound(id))?;

        if !action.status.can_transition(next) {
            return Err(EngineError::InvalidTransition {
                from: action.status,
                to: next,
            });
        }
        if next == ActionStatus::Executing && action.requires_approval && action.approved_by.is_none()
        {
            return Err(EngineError::ApprovalRequired(id));
        }

        debug!(action_id = %id, from = %action.status, to = %next, "Status transition");
        action.status = next;
        if next.is_terminal() {
            action.completed_at = Some(chrono::Utc::now());
            let key = (action.target.clone(), action.kind);
            let action = action.clone();
            inner.active.remove(&key);
            return Ok(action);
        }
        Ok(action.clone())
    }

    /// Attach an approval record to an action awaiting one.
    pub async fn attach_approval(
        &self,
        id: Uuid,
        approver: &str,
    ) -> Result<RemediationAction, EngineError> {
        let mut inner = self.inner.write().await;
        let action = inner.actions.get_mut(&id).ok_or(EngineError::NotFound(id))?;

        if action.status != ActionStatus::AwaitingApproval {
            return Err(EngineError::InvalidTransition {
                from: action.status,
                to: ActionStatus::Executing,
            });
        }

        info!(action_id = %id, approver, "Approval attached");
        action.approved_by = Some(approver.to_string());
        Ok(action.clone())
    }

    /// Record the start of one execution attempt.
    pub async fn record_attempt(&self, id: Uuid) -> Result<u32, EngineError> {
        let mut inner = self.inner.write().await;
        let action = inner.actions.get_mut(&id).ok_or(EngineError::NotFound(id))?;
        action.attempts += 1;
        Ok(action.attempts)
    }

    /// Finalize a successful execution: store the outcome, move to `Completed`.
    pub async fn complete(
        &self,
        id: Uuid,
        remediation: &Remediation,
    ) -> Result<RemediationAction, EngineError> {
        {
            let mut inner = self.inner.write().await;
            let action = inner.actions.get_mut(&id).ok_or(EngineError::NotFound(id))?;
            action.reason = remediation.reason.clone();
            action.message = remediation.message.clone();
            action.mutation_ref = remediation.mutation_ref.clone();
        }
        self.transition(id, ActionStatus::Completed).await
    }

    /// Finalize an unapproved action: store the note, move to `Rejected`.
    pub async fn reject(&self, id: Uuid, note: &str) -> Result<RemediationAction, EngineError> {
        {
            let mut inner = self.inner.write().await;
            let action = inner.actions.get_mut(&id).ok_or(EngineError::NotFound(id))?;
            action.message = note.to_string();
        }
        self.transition(id, ActionStatus::Rejected).await
    }

    /// Finalize a failed execution: store the failure reason, move to `Failed`.
    pub async fn fail(&self, id: Uuid, reason: &str) -> Result<RemediationAction, EngineError> {
        {
            let mut inner = self.inner.write().await;
            let action = inner.actions.get_mut(&id).ok_or(EngineError::NotFound(id))?;
            action.message = reason.to_string();
        }
        self.transition(id, ActionStatus::Failed).await
    }

    /// The in-flight action for a key, if any.
    pub async fn lookup(&self, target: &TargetId, kind: ActionKind) -> Option<RemediationAction> {
        let inner = self.inner.read().await;
        inner
            .active
            .get(&(target.clone(), kind))
            .map(|id| inner.actions[id].clone())
    }

    /// One action by id.
    pub async fn get(&self, id: Uuid) -> Option<RemediationAction> {
        let inner = self.inner.read().await;
        inner.actions.get(&id).cloned()
    }

    /// Full action history, oldest first. The audit trail.
    pub async fn history(&self) -> Vec<RemediationAction> {
        let inner = self.inner.read().await;
        let mut all: Vec<_> = inner.actions.values().cloned().collect();
        all.sort_by_key(|a| a.created_at);
        all
    }

    /// Actions currently awaiting approval, oldest first.
    pub async fn pending_approval(&self) -> Vec<RemediationAction> {
        let inner = self.inner.read().await;
        let mut pending: Vec<_> = inner
            .actions
            .values()
            .filter(|a| a.status == ActionStatus::AwaitingApproval)
            .cloned()
            .collect();
        pending.sort_by_key(|a| a.created_at);
        pending
    }
}

impl Clone for ActionLedger {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
