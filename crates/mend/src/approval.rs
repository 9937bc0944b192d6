//! The approval gate: suspends sensitive actions until a human decides.
//!
//! A dispatch task registers interest in an action id, then awaits a verdict.
//! The wait is a genuine suspension point (a oneshot receiver raced against an
//! expiry timer); it consumes nothing while parked and resolves exactly once,
//! by whichever of approve, reject or expiry happens first.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::EngineError;

/// Outcome of an approval wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// An operator signed off.
    Approved { approver: String },
    /// An operator explicitly rejected.
    Rejected,
    /// Nobody decided within the expiry window.
    Expired,
}

/// Pending approval waits, keyed by action id.
#[derive(Default)]
pub struct ApprovalGate {
    waiters: Arc<Mutex<HashMap<Uuid, oneshot::Sender<Verdict>>>>,
}

impl ApprovalGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in an action's approval before publishing its id.
    ///
    /// Registering first closes the window where an operator could approve an
    /// id the gate does not know yet.
    pub async fn register(&self, action_id: Uuid) -> PendingApproval {
        let (tx, rx) = oneshot::channel();
        self.waiters.lock().await.insert(action_id, tx);
        debug!(action_id = %action_id, "Approval wait registered");

        PendingApproval {
            action_id,
            rx,
            waiters: Arc::clone(&self.waiters),
        }
    }

    /// Resolve a pending wait with an approval.
    pub async fn approve(&self, action_id: Uuid, approver: &str) -> Result<(), EngineError> {
        let tx = self
            .waiters
            .lock()
            .await
            .remove(&action_id)
            .ok_or(EngineError::NotFound(action_id))?;

        info!(action_id = %action_id, approver, "Approval received");
        // The waiter may have expired between the map lookup and this send;
        // expiry already resolved the action, so the late approval is moot.
        if tx
            .send(Verdict::Approved {
                approver: approver.to_string(),
            })
            .is_err()
        {
            warn!(action_id = %action_id, "Approval arrived after the wait resolved");
        }
        Ok(())
    }

    /// Resolve a pending wait with a rejection.
    pub async fn reject(&self, action_id: Uuid) -> Result<(), EngineError> {
        let tx = self
            .waiters
            .lock()
            .await
            .remove(&action_id)
            .ok_or(EngineError::NotFound(action_id))?;

        info!(action_id = %action_id, "Rejection received");
        let _ = tx.send(Verdict::Rejected);
        Ok(())
    }

    /// Tear down a pending wait without resolving it (cycle shutdown).
    pub async fn cancel(&self, action_id: Uuid) {
        if self.waiters.lock().await.remove(&action_id).is_some() {
            debug!(action_id = %action_id, "Approval wait cancelled");
        }
    }

    /// Number of waits currently pending.
    pub async fn pending(&self) -> usize {
        self.waiters.lock().await.len()
    }
}

impl Clone for ApprovalGate {
    fn clone(&self) -> Self {
        Self {
            waiters: Arc::clone(&self.waiters),
        }
    }
}

/// A registered approval wait. Await [`PendingApproval::verdict`] to suspend.
pub struct PendingApproval {
    action_id: Uuid,
    rx: oneshot::Receiver<Verdict>,
    waiters: Arc<Mutex<HashMap<Uuid, oneshot::Sender<Verdict>>>>,
}

impl PendingApproval {
    /// Suspend until approve, reject or expiry, whichever comes first.
    pub async fn verdict(self, expiry: Duration) -> Verdict {
        tokio::select! {
            received = self.rx => {
                // A dropped sender (cancel) counts as a rejection: the cycle
                // that owned the wait is gone and must not execute.
                received.unwrap_or(Verdict::Rejected)
            }
            () = tokio::time::sleep(expiry) => {
                self.waiters.lock().await.remove(&self.action_id);
                warn!(action_id = %self.action_id, "Approval expired unresolved");
                Verdict::Expired
            }
        }
    }
}
