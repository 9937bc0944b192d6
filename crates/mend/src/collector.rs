//! Fleet snapshot sources.
//!
//! The engine is deliberately agnostic about where targets come from: a cycle
//! asks a [`Collector`] for the current fleet and hands the snapshot to the
//! detector. The static collector carries a fixed fleet for demos and tests;
//! a cluster-backed collector plugs in behind the same trait.

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;

use crate::error::EngineError;
use crate::models::{ResourceRequests, Target, TargetStatus};

/// A source of fleet snapshots.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Name for logs.
    fn name(&self) -> &str;

    /// Capture the current state of every managed workload.
    async fn snapshot(&self) -> Result<Vec<Target>, EngineError>;
}

/// Serves a fixed fleet, unchanged on every call.
pub struct StaticCollector {
    targets: Vec<Target>,
}

impl StaticCollector {
    #[must_use]
    pub fn new(targets: Vec<Target>) -> Self {
        Self { targets }
    }

    /// A small mixed-health fleet: one healthy workload, one crash-looping,
    /// one OOM-killed.
    #[must_use]
    pub fn sample_fleet() -> Self {
        let now = chrono::Utc::now();
        Self::new(vec![
            Target {
                name: "web-app-1".to_string(),
                namespace: "production".to_string(),
                node_name: Some("node-1".to_string()),
                status: TargetStatus::Running,
                restarts: 0,
                resources: ResourceRequests {
                    cpu: "500m".to_string(),
                    memory: "512Mi".to_string(),
                },
                labels: HashMap::new(),
                created_at: now,
            },
            Target {
                name: "crashed-app".to_string(),
                namespace: "production".to_string(),
                node_name: Some("node-2".to_string()),
                status: TargetStatus::CrashLoopBackOff,
                restarts: 7,
                resources: ResourceRequests {
                    cpu: "250m".to_string(),
                    memory: "256Mi".to_string(),
                },
                labels: HashMap::new(),
                created_at: now,
            },
            Target {
                name: "memory-hog".to_string(),
                namespace: "production".to_string(),
                node_name: Some("node-1".to_string()),
                status: TargetStatus::OomKilled,
                restarts: 3,
                resources: ResourceRequests {
                    cpu: "1000m".to_string(),
                    memory: "1024Mi".to_string(),
                },
                labels: HashMap::new(),
                created_at: now,
            },
        ])
    }
}

#[async_trait]
impl Collector for StaticCollector {
    fn name(&self) -> &str {
        "static"
    }

    async fn snapshot(&self) -> Result<Vec<Target>, EngineError> {
        debug!(targets = self.targets.len(), "Serving static fleet snapshot");
        Ok(self.targets.clone())
    }
}
