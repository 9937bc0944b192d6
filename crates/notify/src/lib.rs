//! Notification delivery for finalized remediation actions.
//!
//! The engine hands every terminal action (completed, failed or rejected) to a
//! [`Notifier`], which fans the report out to all configured channels. Delivery
//! is best-effort: a channel failure is logged and never alters the action
//! record that produced the report.
//!
//! # Usage
//!
//! ```no_run
//! use notify::Notifier;
//!
//! // Create notifier from environment variables
//! let notifier = Notifier::from_env();
//! # let report: notify::ActionReport = todo!();
//!
//! // Send a report (fire-and-forget)
//! notifier.notify(report);
//! ```
//!
//! # Configuration
//!
//! - `MEND_WEBHOOK_URL`: incoming-webhook URL (enables the webhook channel)
//! - `NOTIFY_DISABLED`: set to "true" to disable all notifications

pub mod channels;
pub mod error;
pub mod events;

pub use channels::webhook::WebhookChannel;
pub use channels::NotifyChannel;
pub use error::ChannelError;
pub use events::{ActionReport, Severity};

use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Environment variable to disable all notifications.
const ENV_NOTIFY_DISABLED: &str = "NOTIFY_DISABLED";

/// Central notification dispatcher.
pub struct Notifier {
    channels: Vec<Arc<dyn NotifyChannel>>,
    disabled: bool,
}

impl Notifier {
    /// Create a new notifier from environment variables, auto-detecting which
    /// channels are configured.
    #[must_use]
    pub fn from_env() -> Self {
        let disabled = std::env::var(ENV_NOTIFY_DISABLED)
            .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
            .unwrap_or(false);

        if disabled {
            info!("Notifications disabled via NOTIFY_DISABLED");
            return Self {
                channels: vec![],
                disabled: true,
            };
        }

        let mut channels: Vec<Arc<dyn NotifyChannel>> = vec![];

        let webhook = WebhookChannel::from_env();
        if webhook.enabled() {
            info!("Webhook notifications enabled");
            channels.push(Arc::new(webhook));
        }

        if channels.is_empty() {
            warn!("No notification channels configured");
        } else {
            info!(
                channel_count = channels.len(),
                "Notification system initialized"
            );
        }

        Self {
            channels,
            disabled: false,
        }
    }

    /// Create a notifier with specific channels.
    #[must_use]
    pub fn with_channels(channels: Vec<Arc<dyn NotifyChannel>>) -> Self {
        Self {
            channels,
            disabled: false,
        }
    }

    /// Create a disabled notifier (for testing or when notifications are off).
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            channels: vec![],
            disabled: true,
        }
    }

    /// Check if any notification channels are enabled.
    #[must_use]
    pub fn has_channels(&self) -> bool {
        !self.disabled && !self.channels.is_empty()
    }

    /// Send a report to all enabled channels (fire-and-forget).
    ///
    /// Spawns one task per channel and returns immediately. Errors are logged,
    /// never propagated.
    pub fn notify(&self, report: ActionReport) {
        if self.disabled || self.channels.is_empty() {
            debug!("No channels configured, skipping report");
            return;
        }

        let report = Arc::new(report);

        for channel in &self.channels {
            let channel = Arc::clone(channel);
            let report = Arc::clone(&report);

            tokio::spawn(async move {
                let channel_name = channel.name();

                match channel.send(&report).await {
                    Ok(()) => {
                        debug!(channel = channel_name, "Report delivered");
                    }
                    Err(e) => {
                        error!(
                            channel = channel_name,
                            error = %e,
                            "Failed to deliver report"
                        );
                    }
                }
            });
        }
    }

    /// Send a report and wait for every channel to finish, collecting results.
    ///
    /// Used by the orchestrator's handoff so terminal outcomes are logged with
    /// delivery results, and by tests that need confirmation.
    pub async fn notify_and_wait(
        &self,
        report: &ActionReport,
    ) -> Vec<(String, Result<(), ChannelError>)> {
        if self.disabled || self.channels.is_empty() {
            return vec![];
        }

        let mut results = vec![];

        for channel in &self.channels {
            let channel_name = channel.name().to_string();
            let result = channel.send(report).await;
            results.push((channel_name, result));
        }

        results
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Self::from_env()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use uuid::Uuid;

    struct CountingChannel {
        sent: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl NotifyChannel for CountingChannel {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn enabled(&self) -> bool {
            true
        }

        async fn send(&self, _report: &ActionReport) -> Result<(), ChannelError> {
            self.sent.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ChannelError::Other("boom".to_string()))
            } else {
                Ok(())
            }
        }
    }

    fn report() -> ActionReport {
        ActionReport {
            action_id: Uuid::new_v4(),
            kind: "pod_restart".to_string(),
            target: "crashed-app".to_string(),
            namespace: "production".to_string(),
            status: "completed".to_string(),
            reason: "crash loop".to_string(),
            message: "restart issued".to_string(),
            mutation_ref: None,
            approved_by: None,
            cluster: "test".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_disabled_notifier() {
        let notifier = Notifier::disabled();
        assert!(!notifier.has_channels());
    }

    #[tokio::test]
    async fn test_notify_and_wait_collects_results() {
        let ok = Arc::new(CountingChannel {
            sent: AtomicUsize::new(0),
            fail: false,
        });
        let failing = Arc::new(CountingChannel {
            sent: AtomicUsize::new(0),
            fail: true,
        });
        let notifier =
            Notifier::with_channels(vec![Arc::clone(&ok) as _, Arc::clone(&failing) as _]);

        let results = notifier.notify_and_wait(&report()).await;
        assert_eq!(results.len(), 2);
        assert!(results[0].1.is_ok());
        assert!(results[1].1.is_err());
        assert_eq!(ok.sent.load(Ordering::SeqCst), 1);
        assert_eq!(failing.sent.load(Ordering::SeqCst), 1);
    }
}
