//! Core data model: targets, findings and remediation actions.

use chrono::{DateTime, Utc};
use notify::Severity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use crate::error::EngineError;

/// Label used to exclude a target from detection entirely.
pub const EXCLUDE_LABEL: &str = "mend.io/exclude";

/// Observed status of a managed workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetStatus {
    Running,
    Pending,
    Failed,
    CrashLoopBackOff,
    #[serde(rename = "OOMKilled")]
    OomKilled,
}

/// CPU and memory requests, as Kubernetes-style quantity strings
/// (`"500m"`, `"512Mi"`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRequests {
    pub cpu: String,
    pub memory: String,
}

/// Identity of a target: unique per (name, namespace).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetId {
    pub name: String,
    pub namespace: String,
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Immutable snapshot of one managed workload for a detection cycle.
///
/// Owned by the external collector; the engine never mutates a target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub node_name: Option<String>,
    pub status: TargetStatus,
    #[serde(default)]
    pub restarts: u32,
    #[serde(default)]
    pub resources: ResourceRequests,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Target {
    /// Identity for ledger keying and logs.
    #[must_use]
    pub fn id(&self) -> TargetId {
        TargetId {
            name: self.name.clone(),
            namespace: self.namespace.clone(),
        }
    }

    /// A target without a name or namespace cannot be keyed or remediated.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.name.is_empty() && !self.namespace.is_empty()
    }

    /// Check the exclusion label.
    #[must_use]
    pub fn is_excluded(&self) -> bool {
        self.labels.get(EXCLUDE_LABEL).is_some_and(|v| v == "true")
    }
}

/// The closed set of anomaly kinds the detector can classify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    CrashLoop,
    OomKill,
    SecurityIssue,
    MissingProbe,
    CertExpiring,
}

/// A classified anomaly for one target. Ephemeral: consumed within one
/// dispatch cycle, never persisted.
#[derive(Debug, Clone)]
pub struct Finding {
    pub kind: FindingKind,
    pub target: Target,
    pub severity: Severity,
    /// Free-form explanation of what triggered the rule.
    pub evidence: String,
}

/// Remediation action kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    PodRestart,
    MemoryIncrease,
    SecurityFix,
    ProbeInjection,
    CertRenewalAlert,
}

impl ActionKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PodRestart => "pod_restart",
            Self::MemoryIncrease => "memory_increase",
            Self::SecurityFix => "security_fix",
            Self::ProbeInjection => "probe_injection",
            Self::CertRenewalAlert => "cert_renewal_alert",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle state of a remediation action.
///
/// Transitions only move forward; see [`ActionStatus::can_transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    Pending,
    AwaitingApproval,
    Executing,
    Completed,
    Failed,
    Rejected,
}

impl ActionStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::AwaitingApproval => "awaiting_approval",
            Self::Executing => "executing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Rejected => "rejected",
        }
    }

    /// Terminal states are immutable and retained for audit.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Rejected)
    }

    /// The allowed forward transitions of the action state machine.
    #[must_use]
    pub const fn can_transition(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::AwaitingApproval | Self::Executing)
                | (Self::AwaitingApproval, Self::Executing | Self::Rejected)
                | (Self::Executing, Self::Completed | Self::Failed)
        )
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a remediator produced: the description of the corrective change.
///
/// Applying the change to infrastructure is an external concern; the engine
/// records the intent and hands the reference outward.
#[derive(Debug, Clone)]
pub struct Remediation {
    pub reason: String,
    pub message: String,
    pub mutation_ref: Option<String>,
}

/// The record of one remediation attempt and its lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationAction {
    pub id: Uuid,
    pub kind: ActionKind,
    pub target: TargetId,
    pub status: ActionStatus,
    pub reason: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mutation_ref: Option<String>,
    pub requires_approval: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    /// Execution attempts made so far (retries included).
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl RemediationAction {
    /// Create a freshly admitted action in `Pending`.
    #[must_use]
    pub fn new(kind: ActionKind, target: TargetId, requires_approval: bool, reason: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            target,
            status: ActionStatus::Pending,
            reason: reason.to_string(),
            message: String::new(),
            mutation_ref: None,
            requires_approval,
            approved_by: None,
            attempts: 0,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

/// Scale a Kubernetes-style quantity string by a percentage, preserving the
/// unit suffix. `scale_quantity("512Mi", 50)` is `"768Mi"`.
///
/// Rounds to the nearest whole unit.
pub fn scale_quantity(quantity: &str, percent: u32) -> Result<String, EngineError> {
    let digits_end = quantity
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(quantity.len());
    let (value, suffix) = quantity.split_at(digits_end);

    let value: u64 = value.parse().map_err(|_| {
        EngineError::Validation(format!("unparseable quantity: {quantity:?}"))
    })?;

    if !suffix.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(EngineError::Validation(format!(
            "unparseable quantity suffix: {quantity:?}"
        )));
    }

    let scaled = (value * u64::from(100 + percent) + 50) / 100;
    Ok(format!("{scaled}{suffix}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(status: TargetStatus) -> Target {
        Target {
            name: "web-app".to_string(),
            namespace: "production".to_string(),
            node_name: None,
            status,
            restarts: 0,
            resources: ResourceRequests {
                cpu: "500m".to_string(),
                memory: "512Mi".to_string(),
            },
            labels: HashMap::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_target_id_display() {
        assert_eq!(
            target(TargetStatus::Running).id().to_string(),
            "production/web-app"
        );
    }

    #[test]
    fn test_target_exclusion() {
        let mut t = target(TargetStatus::Running);
        assert!(!t.is_excluded());
        t.labels.insert(EXCLUDE_LABEL.to_string(), "false".to_string());
        assert!(!t.is_excluded());
        t.labels.insert(EXCLUDE_LABEL.to_string(), "true".to_string());
        assert!(t.is_excluded());
    }

    #[test]
    fn test_target_validity() {
        let mut t = target(TargetStatus::Running);
        assert!(t.is_valid());
        t.name.clear();
        assert!(!t.is_valid());
    }

    #[test]
    fn test_status_transitions_forward_only() {
        use ActionStatus::{
            AwaitingApproval, Completed, Executing, Failed, Pending, Rejected,
        };

        assert!(Pending.can_transition(AwaitingApproval));
        assert!(Pending.can_transition(Executing));
        assert!(AwaitingApproval.can_transition(Executing));
        assert!(AwaitingApproval.can_transition(Rejected));
        assert!(Executing.can_transition(Completed));
        assert!(Executing.can_transition(Failed));

        // No regressions or skips.
        assert!(!Executing.can_transition(Pending));
        assert!(!Pending.can_transition(Completed));
        assert!(!Pending.can_transition(Rejected));
        assert!(!AwaitingApproval.can_transition(Completed));
        assert!(!Completed.can_transition(Failed));
        assert!(!Rejected.can_transition(Executing));
        assert!(!Failed.can_transition(Executing));
    }

    #[test]
    fn test_terminal_states() {
        assert!(ActionStatus::Completed.is_terminal());
        assert!(ActionStatus::Failed.is_terminal());
        assert!(ActionStatus::Rejected.is_terminal());
        assert!(!ActionStatus::Pending.is_terminal());
        assert!(!ActionStatus::AwaitingApproval.is_terminal());
        assert!(!ActionStatus::Executing.is_terminal());
    }

    #[test]
    fn test_scale_quantity() {
        assert_eq!(scale_quantity("512Mi", 50).unwrap(), "768Mi");
        assert_eq!(scale_quantity("1024Mi", 50).unwrap(), "1536Mi");
        assert_eq!(scale_quantity("2Gi", 50).unwrap(), "3Gi");
        assert_eq!(scale_quantity("500m", 20).unwrap(), "600m");
        // Plain byte counts keep no suffix.
        assert_eq!(scale_quantity("100", 50).unwrap(), "150");
        // Rounds to nearest: 3 * 1.5 = 4.5 -> 5
        assert_eq!(scale_quantity("3Gi", 50).unwrap(), "5Gi");
    }

    #[test]
    fn test_scale_quantity_rejects_garbage() {
        assert!(scale_quantity("", 50).is_err());
        assert!(scale_quantity("Mi", 50).is_err());
        assert!(scale_quantity("12.5Mi", 50).is_err());
        assert!(scale_quantity("512M i", 50).is_err());
    }

    #[test]
    fn test_oom_status_serializes_like_kubernetes() {
        let s = serde_json::to_string(&TargetStatus::OomKilled).unwrap();
        assert_eq!(s, "\"OOMKilled\"");
        let s = serde_json::to_string(&TargetStatus::CrashLoopBackOff).unwrap();
        assert_eq!(s, "\"CrashLoopBackOff\"");
    }
}
