//! Report payloads built from finalized remediation actions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Severity levels for outbound reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational - normal operations
    Info,
    /// Warning - something needs attention
    Warning,
    /// Critical - immediate action required
    Critical,
}

impl Severity {
    /// Get the embed/card color for this severity.
    #[must_use]
    pub const fn color(&self) -> u32 {
        match self {
            Self::Info => 0x0034_98db,     // Blue
            Self::Warning => 0x00f3_9c12,  // Orange
            Self::Critical => 0x00e7_4c3c, // Red
        }
    }

    /// Get display name for this severity.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "Info",
            Self::Warning => "Warning",
            Self::Critical => "Critical",
        }
    }
}

/// A finalized remediation action, flattened into a channel-neutral report.
///
/// The engine owns the action record; this is the shape that leaves the
/// process. It round-trips through JSON so receivers (and tests) can parse it
/// back without depending on the engine's types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ActionReport {
    /// Action id, stable across retries of the same admission.
    pub action_id: Uuid,
    /// Action kind, e.g. `pod_restart`.
    pub kind: String,
    /// Target workload name.
    pub target: String,
    /// Target namespace.
    pub namespace: String,
    /// Terminal status: `completed`, `failed` or `rejected`.
    pub status: String,
    /// Why the action was taken.
    pub reason: String,
    /// Human-readable outcome description.
    pub message: String,
    /// External mutation reference (commit id, patch ref) if one was produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mutation_ref: Option<String>,
    /// Operator who approved the action, when approval was required.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approved_by: Option<String>,
    /// Cluster the action ran against.
    pub cluster: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl ActionReport {
    /// Short title for channel headers.
    #[must_use]
    pub fn title(&self) -> String {
        let verb = match self.status.as_str() {
            "completed" => "Remediated",
            "failed" => "Remediation failed",
            "rejected" => "Remediation rejected",
            _ => "Remediation update",
        };
        format!("{verb}: {} on {}/{}", self.kind, self.namespace, self.target)
    }

    /// Severity for this report, derived from the terminal status.
    #[must_use]
    pub fn severity(&self) -> Severity {
        match self.status.as_str() {
            "completed" => Severity::Info,
            "rejected" => Severity::Warning,
            _ => Severity::Critical,
        }
    }
}
