//! Error taxonomy for the remediation engine.

use thiserror::Error;
use uuid::Uuid;

use crate::models::{ActionKind, ActionStatus, FindingKind, TargetId};

/// Errors produced by the engine.
///
/// Validation, dispatch and conflict conditions are recovered locally within a
/// dispatch cycle; execution and approval-timeout conditions are terminal for
/// the action they belong to.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed target or finding; the finding is dropped, the cycle continues.
    #[error("validation failed: {0}")]
    Validation(String),

    /// No remediator matched a finding; logged, no action created.
    #[error("no remediator can handle {kind:?} for {target}")]
    Dispatch { kind: FindingKind, target: TargetId },

    /// An in-flight action already covers this (target, kind); a no-op.
    #[error("action {kind} already in flight for {target}")]
    Conflict { kind: ActionKind, target: TargetId },

    /// The remediator's mutation failed or timed out.
    #[error("execution failed: {0}")]
    Execution(String),

    /// Approval was not obtained within the expiry window.
    #[error("approval expired for action {0}")]
    ApprovalTimeout(Uuid),

    /// A status transition that the lifecycle state machine forbids.
    #[error("invalid transition {from} -> {to}")]
    InvalidTransition { from: ActionStatus, to: ActionStatus },

    /// An action requiring approval tried to execute without one attached.
    #[error("action {0} requires approval before executing")]
    ApprovalRequired(Uuid),

    /// Unknown action id.
    #[error("no such action: {0}")]
    NotFound(Uuid),
}
