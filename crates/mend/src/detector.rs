//! Pure, rule-based classification of workload snapshots into findings.
//!
//! Each rule is a predicate over one target plus an evidence extractor. Rules
//! run in a fixed order over targets in snapshot order, so identical snapshots
//! always yield identical finding sequences. That determinism is what makes
//! the ledger's dedup behavior testable.

use notify::Severity;
use tracing::{debug, warn};

use crate::models::{Finding, FindingKind, Target, TargetStatus};

/// Restart count above which a target is treated as crash-looping even if its
/// reported status has not flipped yet.
pub const CRASH_RESTART_THRESHOLD: u32 = 5;

type Rule = fn(&Target) -> Option<Finding>;

/// The fixed rule set, in evaluation order.
const RULES: &[Rule] = &[
    crash_loop,
    oom_kill,
    security_issue,
    missing_probe,
    cert_expiring,
];

/// Stateless detector over immutable snapshots.
#[derive(Debug, Default)]
pub struct Detector;

impl Detector {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Classify a snapshot into findings.
    ///
    /// Pure over the input: no mutation, no external calls. Invalid targets
    /// are dropped with a warning; excluded targets are skipped silently.
    #[must_use]
    pub fn detect(&self, snapshot: &[Target]) -> Vec<Finding> {
        let mut findings = Vec::new();

        for target in snapshot {
            if !target.is_valid() {
                warn!(
                    name = %target.name,
                    namespace = %target.namespace,
                    "Dropping malformed target from snapshot"
                );
                continue;
            }
            if target.is_excluded() {
                debug!(target = %target.id(), "Target excluded from detection");
                continue;
            }

            for rule in RULES {
                if let Some(finding) = rule(target) {
                    findings.push(finding);
                }
            }
        }

        findings
    }
}

fn crash_loop(target: &Target) -> Option<Finding> {
    let looping = target.status == TargetStatus::CrashLoopBackOff;
    let churning = target.restarts > CRASH_RESTART_THRESHOLD;
    if !looping && !churning {
        return None;
    }

    let evidence = if looping {
        format!("status is CrashLoopBackOff after {} restarts", target.restarts)
    } else {
        format!(
            "{} restarts exceeds threshold of {}",
            target.restarts, CRASH_RESTART_THRESHOLD
        )
    };

    Some(Finding {
        kind: FindingKind::CrashLoop,
        target: target.clone(),
        severity: Severity::Critical,
        evidence,
    })
}

fn oom_kill(target: &Target) -> Option<Finding> {
    if target.status != TargetStatus::OomKilled {
        return None;
    }

    Some(Finding {
        kind: FindingKind::OomKill,
        target: target.clone(),
        severity: Severity::Warning,
        evidence: format!(
            "killed for exceeding its memory request of {}",
            target.resources.memory
        ),
    })
}

// The three rules below are reserved: their predicates need data the collector
// does not supply yet (security context, probe specs, certificate inventory).
// They hold the detector contract so the orchestrator never has to
// special-case an unimplemented kind.

fn security_issue(_target: &Target) -> Option<Finding> {
    None
}

fn missing_probe(_target: &Target) -> Option<Finding> {
    None
}

fn cert_expiring(_target: &Target) -> Option<Finding> {
    None
}
