//! Mend: an auto-remediation engine for managed workloads.
//!
//! A cycle runs detection over a fleet snapshot, matches each finding to a
//! remediation strategy, records the action in a concurrency-safe ledger,
//! suspends sensitive actions on an approval gate, executes with bounded
//! retries, and reports every terminal action through the notifier.
//!
//! The pipeline, in module order:
//!
//! - [`collector`]: fleet snapshot sources
//! - [`detector`]: rule-based anomaly classification
//! - [`remediators`]: the strategy registry
//! - [`ledger`]: the action ledger (dedup, lifecycle, audit)
//! - [`approval`]: the human-in-the-loop gate
//! - [`orchestrator`]: ties the cycle together
//! - [`server`]: the operator HTTP surface

pub mod approval;
pub mod collector;
pub mod detector;
pub mod error;
pub mod ledger;
pub mod models;
pub mod orchestrator;
pub mod remediators;
pub mod server;

pub use approval::{ApprovalGate, Verdict};
pub use collector::{Collector, StaticCollector};
pub use detector::Detector;
pub use error::EngineError;
pub use ledger::{ActionLedger, Admission};
pub use models::{
    ActionKind, ActionStatus, Finding, FindingKind, RemediationAction, Target, TargetId,
    TargetStatus,
};
pub use orchestrator::{DispatchReport, Orchestrator};
pub use remediators::{Registry, Remediator};
pub use server::{build_operator_router, OperatorState};
