//! End-to-end cycles through the engine: detection, dispatch, approval,
//! ledger audit.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use mend::models::Remediation;
use mend::{
    ActionKind, ActionStatus, ApprovalGate, Detector, EngineError, Finding, FindingKind,
    Orchestrator, Registry, Remediator, StaticCollector, Target, TargetStatus,
};
use mend_config::EngineConfig;
use notify::{ActionReport, ChannelError, Notifier, NotifyChannel, Severity};

fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.cluster_name = "test-cluster".to_string();
    config.retry.base_backoff_ms = 10;
    config
}

fn orchestrator(config: EngineConfig) -> Arc<Orchestrator> {
    orchestrator_with(Registry::from_config(&config), Notifier::disabled(), config)
}

fn orchestrator_with(
    registry: Registry,
    notifier: Notifier,
    config: EngineConfig,
) -> Arc<Orchestrator> {
    Arc::new(Orchestrator::new(
        registry,
        mend::ActionLedger::new(),
        ApprovalGate::new(),
        Arc::new(notifier),
        config,
    ))
}

/// Keeps every report it is handed, for asserting on the handoff.
#[derive(Default)]
struct RecordingChannel {
    reports: Mutex<Vec<ActionReport>>,
}

#[async_trait]
impl NotifyChannel for RecordingChannel {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn enabled(&self) -> bool {
        true
    }

    async fn send(&self, report: &ActionReport) -> Result<(), ChannelError> {
        self.reports.lock().unwrap().push(report.clone());
        Ok(())
    }
}

/// Never finishes within any sane execution timeout.
struct StallingStrategy;

#[async_trait]
impl Remediator for StallingStrategy {
    fn kind(&self) -> ActionKind {
        ActionKind::PodRestart
    }

    fn can_handle(&self, _target: &Target, finding: FindingKind) -> bool {
        finding == FindingKind::CrashLoop
    }

    async fn remediate(&self, target: &Target) -> Result<Remediation, EngineError> {
        tokio::time::sleep(Duration::from_secs(600)).await;
        Ok(Remediation {
            reason: "unreachable".to_string(),
            message: format!("restart issued for {}", target.id()),
            mutation_ref: None,
        })
    }
}

fn target(name: &str, status: TargetStatus, restarts: u32, memory: &str) -> Target {
    Target {
        name: name.to_string(),
        namespace: "production".to_string(),
        node_name: None,
        status,
        restarts,
        resources: mend::models::ResourceRequests {
            cpu: "500m".to_string(),
            memory: memory.to_string(),
        },
        labels: HashMap::new(),
        created_at: Utc::now(),
    }
}

fn finding(kind: FindingKind, target: Target) -> Finding {
    Finding {
        kind,
        severity: Severity::Warning,
        evidence: "synthetic finding".to_string(),
        target,
    }
}

/// Poll the ledger until an action awaiting approval appears.
async fn wait_for_pending(ledger: &mend::ActionLedger) -> mend::RemediationAction {
    for _ in 0..500 {
        if let Some(action) = ledger.pending_approval().await.into_iter().next() {
            return action;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("no action reached awaiting_approval in time");
}

#[tokio::test]
async fn test_crash_loop_detected_and_restarted() {
    let orchestrator = orchestrator(test_config());
    let fleet = StaticCollector::sample_fleet();
    let snapshot = mend::Collector::snapshot(&fleet).await.unwrap();

    let findings = Detector::new().detect(&snapshot);
    assert!(findings
        .iter()
        .any(|f| f.kind == FindingKind::CrashLoop && f.target.name == "crashed-app"));

    let report = orchestrator.dispatch(findings).await;
    assert_eq!(report.completed, 2); // restart + memory increase
    assert_eq!(report.failed, 0);
    assert!(report.errors.is_empty());

    let history = orchestrator.ledger().history().await;
    let restart = history
        .iter()
        .find(|a| a.kind == ActionKind::PodRestart)
        .unwrap();
    assert_eq!(restart.status, ActionStatus::Completed);
    assert_eq!(restart.target.name, "crashed-app");
}

#[tokio::test]
async fn test_oom_kill_raises_memory_request() {
    let orchestrator = orchestrator(test_config());
    let findings = vec![finding(
        FindingKind::OomKill,
        target("memory-hog", TargetStatus::OomKilled, 3, "512Mi"),
    )];

    let report = orchestrator.dispatch(findings).await;
    assert_eq!(report.completed, 1);

    let history = orchestrator.ledger().history().await;
    let action = &history[0];
    assert_eq!(action.kind, ActionKind::MemoryIncrease);
    assert_eq!(action.status, ActionStatus::Completed);
    assert!(action.message.contains("768Mi"), "message: {}", action.message);
    assert!(action
        .mutation_ref
        .as_deref()
        .unwrap()
        .ends_with("memory/768Mi"));
}

#[tokio::test]
async fn test_duplicate_findings_dedupe_within_batch() {
    let orchestrator = orchestrator(test_config());
    let t = target("crashed-app", TargetStatus::CrashLoopBackOff, 7, "256Mi");
    let findings = vec![
        finding(FindingKind::CrashLoop, t.clone()),
        finding(FindingKind::CrashLoop, t),
    ];

    let report = orchestrator.dispatch(findings).await;
    assert_eq!(report.completed + report.conflicts, 2);
    assert_eq!(report.conflicts, 1);

    // Exactly one action was recorded for the pair.
    assert_eq!(orchestrator.ledger().history().await.len(), 1);
}

#[tokio::test]
async fn test_redetection_while_in_flight_creates_no_second_action() {
    let orchestrator = orchestrator(test_config());
    let ledger = orchestrator.ledger();

    // First cycle parks the security fix on the approval gate.
    let first = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            orchestrator
                .dispatch(vec![finding(
                    FindingKind::SecurityIssue,
                    target("exposed-app", TargetStatus::Running, 0, "512Mi"),
                )])
                .await
        })
    };
    let pending = wait_for_pending(&ledger).await;

    // Second cycle re-detects the same issue while the first is non-terminal.
    let second = orchestrator
        .dispatch(vec![finding(
            FindingKind::SecurityIssue,
            target("exposed-app", TargetStatus::Running, 0, "512Mi"),
        )])
        .await;
    assert_eq!(second.conflicts, 1);
    assert_eq!(ledger.history().await.len(), 1);

    orchestrator.gate().approve(pending.id, "alice").await.unwrap();
    assert_eq!(first.await.unwrap().completed, 1);
}

#[tokio::test]
async fn test_terminal_action_frees_key_for_next_cycle() {
    let orchestrator = orchestrator(test_config());
    let t = target("crashed-app", TargetStatus::CrashLoopBackOff, 7, "256Mi");

    let first = orchestrator
        .dispatch(vec![finding(FindingKind::CrashLoop, t.clone())])
        .await;
    assert_eq!(first.completed, 1);

    // The previous action is terminal, so a later cycle may act again.
    let second = orchestrator
        .dispatch(vec![finding(FindingKind::CrashLoop, t)])
        .await;
    assert_eq!(second.completed, 1);
    assert_eq!(second.conflicts, 0);
    assert_eq!(orchestrator.ledger().history().await.len(), 2);
}

#[tokio::test]
async fn test_approved_action_executes_with_approver_recorded() {
    let orchestrator = orchestrator(test_config());
    let gate = orchestrator.gate();
    let ledger = orchestrator.ledger();

    let dispatch = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            orchestrator
                .dispatch(vec![finding(
                    FindingKind::SecurityIssue,
                    target("exposed-app", TargetStatus::Running, 0, "512Mi"),
                )])
                .await
        })
    };

    let pending = wait_for_pending(&ledger).await;
    assert_eq!(pending.kind, ActionKind::SecurityFix);
    gate.approve(pending.id, "alice").await.unwrap();

    let report = dispatch.await.unwrap();
    assert_eq!(report.completed, 1);

    let action = ledger.get(pending.id).await.unwrap();
    assert_eq!(action.status, ActionStatus::Completed);
    assert_eq!(action.approved_by.as_deref(), Some("alice"));
}

#[tokio::test]
async fn test_rejected_action_never_executes() {
    let orchestrator = orchestrator(test_config());
    let gate = orchestrator.gate();
    let ledger = orchestrator.ledger();

    let dispatch = {
        let orchestrator = Arc::clone(&orchestrator);
        tokio::spawn(async move {
            orchestrator
                .dispatch(vec![finding(
                    FindingKind::SecurityIssue,
                    target("exposed-app", TargetStatus::Running, 0, "512Mi"),
                )])
                .await
        })
    };

    let pending = wait_for_pending(&ledger).await;
    gate.reject(pending.id).await.unwrap();

    let report = dispatch.await.unwrap();
    assert_eq!(report.rejected, 1);
    assert_eq!(report.completed, 0);

    let action = ledger.get(pending.id).await.unwrap();
    assert_eq!(action.status, ActionStatus::Rejected);
    assert!(action.mutation_ref.is_none());
    assert_eq!(action.attempts, 0);
}

#[tokio::test]
async fn test_unapproved_action_expires_into_rejection() {
    let mut config = test_config();
    config.approval.expiry_secs = 1;
    let orchestrator = orchestrator(config);

    let report = orchestrator
        .dispatch(vec![finding(
            FindingKind::SecurityIssue,
            target("exposed-app", TargetStatus::Running, 0, "512Mi"),
        )])
        .await;

    assert_eq!(report.rejected, 1);
    let history = orchestrator.ledger().history().await;
    assert_eq!(history[0].status, ActionStatus::Rejected);
    assert!(history[0].message.contains("expired"));
}

#[tokio::test]
async fn test_unremediable_request_fails_after_retry_budget() {
    let config = test_config();
    let sink = Arc::new(RecordingChannel::default());
    let orchestrator = orchestrator_with(
        Registry::from_config(&config),
        Notifier::with_channels(vec![Arc::clone(&sink) as _]),
        config,
    );

    // "lots" never parses, so every attempt fails the same way.
    let report = orchestrator
        .dispatch(vec![finding(
            FindingKind::OomKill,
            target("memory-hog", TargetStatus::OomKilled, 3, "lots"),
        )])
        .await;
    assert_eq!(report.failed, 1);
    assert_eq!(report.completed, 0);

    let history = orchestrator.ledger().history().await;
    let action = &history[0];
    assert_eq!(action.status, ActionStatus::Failed);
    assert_eq!(action.attempts, 3);
    assert!(
        action.message.contains("cannot raise memory request"),
        "message: {}",
        action.message
    );

    // The failure was handed to the notifier like any other terminal outcome.
    let delivered = sink.reports.lock().unwrap();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].status, "failed");
    assert_eq!(delivered[0].kind, "memory_increase");
}

#[tokio::test]
async fn test_execution_timeout_fails_the_action() {
    let mut config = test_config();
    config.execution_timeout_secs = 1;
    config.retry.max_attempts = 1;
    let orchestrator = orchestrator_with(
        Registry::with_strategies(vec![Arc::new(StallingStrategy)]),
        Notifier::disabled(),
        config,
    );

    let report = orchestrator
        .dispatch(vec![finding(
            FindingKind::CrashLoop,
            target("crashed-app", TargetStatus::CrashLoopBackOff, 7, "256Mi"),
        )])
        .await;
    assert_eq!(report.failed, 1);

    let history = orchestrator.ledger().history().await;
    let action = &history[0];
    assert_eq!(action.status, ActionStatus::Failed);
    assert_eq!(action.attempts, 1);
    assert!(action.message.contains("timed out"), "message: {}", action.message);
}

#[tokio::test]
async fn test_disabled_strategy_leaves_finding_unmatched() {
    let mut config = test_config();
    config.enable.memory_increase = false;
    let orchestrator = orchestrator(config);

    let report = orchestrator
        .dispatch(vec![finding(
            FindingKind::OomKill,
            target("memory-hog", TargetStatus::OomKilled, 3, "512Mi"),
        )])
        .await;

    assert_eq!(report.unmatched, 1);
    assert!(orchestrator.ledger().history().await.is_empty());
}

#[tokio::test]
async fn test_excluded_target_produces_no_findings() {
    let mut t = target("crashed-app", TargetStatus::CrashLoopBackOff, 7, "256Mi");
    t.labels
        .insert(mend::models::EXCLUDE_LABEL.to_string(), "true".to_string());

    let findings = Detector::new().detect(&[t]);
    assert!(findings.is_empty());
}

#[tokio::test]
async fn test_history_serializes_for_the_operator_api() {
    let orchestrator = orchestrator(test_config());
    orchestrator
        .dispatch(vec![finding(
            FindingKind::CrashLoop,
            target("crashed-app", TargetStatus::CrashLoopBackOff, 7, "256Mi"),
        )])
        .await;

    let history = orchestrator.ledger().history().await;
    let json = serde_json::to_value(&history).unwrap();
    let entry = &json[0];
    assert_eq!(entry["kind"], "pod_restart");
    assert_eq!(entry["status"], "completed");
    assert_eq!(entry["target"]["namespace"], "production");
}
