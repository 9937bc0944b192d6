//! Mend engine binary: remediation cycles plus the operator API.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use mend::{
    build_operator_router, ApprovalGate, Collector, Detector, Orchestrator, Registry,
    StaticCollector,
};
use mend_config::EngineConfig;
use notify::Notifier;

#[derive(Parser)]
#[command(name = "mend", version, about = "Auto-remediation engine for managed workloads")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run remediation cycles and serve the operator API
    Run {
        /// Address for the operator API
        #[arg(long, default_value = "0.0.0.0:8080")]
        listen: String,

        /// Seconds between remediation cycles
        #[arg(long, default_value_t = 60)]
        interval: u64,

        /// Run a single cycle and exit
        #[arg(long)]
        once: bool,
    },

    /// Print the effective configuration and exit
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = EngineConfig::from_env();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    match cli.command {
        Command::Run {
            listen,
            interval,
            once,
        } => run(config, &listen, interval, once).await,
        Command::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

async fn run(config: EngineConfig, listen: &str, interval: u64, once: bool) -> Result<()> {
    println!("{}", "Mend auto-remediation engine".bold().cyan());
    println!(
        "  cluster: {} ({})",
        config.cluster_name.green(),
        config.cluster_region
    );

    let notifier = Arc::new(Notifier::from_env());
    if notifier.has_channels() {
        println!("  notifications: {}", "enabled".green());
    } else {
        println!("  notifications: {}", "disabled".yellow());
    }

    let registry = Registry::from_config(&config);
    info!(strategies = registry.len(), "Remediator registry built");

    let orchestrator = Arc::new(Orchestrator::new(
        registry,
        mend::ActionLedger::new(),
        ApprovalGate::new(),
        notifier,
        config.clone(),
    ));

    let router = build_operator_router(Arc::new(mend::OperatorState {
        ledger: orchestrator.ledger(),
        gate: orchestrator.gate(),
    }));
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("failed to bind operator API on {listen}"))?;
    info!(addr = %listen, "Operator API listening");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            error!(error = %e, "Operator API server exited");
        }
    });

    // TODO: swap in a cluster-backed collector once the read path to the
    // fleet inventory service lands.
    let collector = StaticCollector::sample_fleet();
    let detector = Detector::new();

    loop {
        cycle(&orchestrator, &collector, &detector).await;

        if once {
            info!("Single cycle requested, exiting");
            return Ok(());
        }

        tokio::select! {
            () = tokio::time::sleep(Duration::from_secs(interval)) => {}
            result = tokio::signal::ctrl_c() => {
                result.context("failed to listen for shutdown signal")?;
                info!("Shutdown signal received");
                return Ok(());
            }
        }
    }
}

async fn cycle(
    orchestrator: &Arc<Orchestrator>,
    collector: &StaticCollector,
    detector: &Detector,
) {
    let snapshot = match collector.snapshot().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            error!(error = %e, "Fleet snapshot failed, skipping cycle");
            return;
        }
    };

    let findings = detector.detect(&snapshot);
    if findings.is_empty() {
        info!(targets = snapshot.len(), "Cycle clean, nothing to remediate");
        return;
    }

    info!(
        targets = snapshot.len(),
        findings = findings.len(),
        "Dispatching findings"
    );
    let report = orchestrator.dispatch(findings).await;
    for e in &report.errors {
        error!(error = %e, "Dispatch error");
    }
}
