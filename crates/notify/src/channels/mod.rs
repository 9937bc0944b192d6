//! Notification channel implementations.

pub mod webhook;

use async_trait::async_trait;

use crate::error::ChannelError;
use crate::events::ActionReport;

/// Trait for notification channels (Teams, Slack, generic webhooks).
#[async_trait]
pub trait NotifyChannel: Send + Sync {
    /// Get the name of this channel.
    fn name(&self) -> &'static str;

    /// Check if this channel is enabled/configured.
    fn enabled(&self) -> bool;

    /// Deliver a report to this channel.
    async fn send(&self, report: &ActionReport) -> Result<(), ChannelError>;
}
