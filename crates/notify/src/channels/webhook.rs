//! Incoming-webhook notification channel.
//!
//! Posts a MessageCard-style payload, which Teams and most card-rendering
//! webhook receivers accept.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::ChannelError;
use crate::events::ActionReport;
use crate::NotifyChannel;

/// Environment variable for the webhook URL.
const ENV_WEBHOOK_URL: &str = "MEND_WEBHOOK_URL";

/// Incoming-webhook notification channel.
pub struct WebhookChannel {
    webhook_url: Option<String>,
    client: reqwest::Client,
}

impl WebhookChannel {
    /// Create a new webhook channel from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let webhook_url = std::env::var(ENV_WEBHOOK_URL).ok();

        if webhook_url.is_some() {
            debug!("Webhook notifications enabled");
        } else {
            debug!("Webhook notifications disabled (MEND_WEBHOOK_URL not set)");
        }

        Self {
            webhook_url,
            client: reqwest::Client::new(),
        }
    }

    /// Create a webhook channel with a specific URL.
    #[must_use]
    pub fn new(webhook_url: String) -> Self {
        Self {
            webhook_url: Some(webhook_url),
            client: reqwest::Client::new(),
        }
    }

    /// Format a report as a MessageCard payload.
    fn format_payload(report: &ActionReport) -> CardPayload {
        let mut facts = vec![
            CardFact {
                name: "Action".to_string(),
                value: report.kind.clone(),
            },
            CardFact {
                name: "Target".to_string(),
                value: format!("{}/{}", report.namespace, report.target),
            },
            CardFact {
                name: "Status".to_string(),
                value: report.status.clone(),
            },
            CardFact {
                name: "Reason".to_string(),
                value: report.reason.clone(),
            },
            CardFact {
                name: "Cluster".to_string(),
                value: report.cluster.clone(),
            },
        ];

        if let Some(approver) = &report.approved_by {
            facts.push(CardFact {
                name: "Approved by".to_string(),
                value: approver.clone(),
            });
        }
        if let Some(mutation) = &report.mutation_ref {
            facts.push(CardFact {
                name: "Mutation".to_string(),
                value: mutation.clone(),
            });
        }

        CardPayload {
            card_type: "MessageCard",
            context: "http://schema.org/extensions",
            theme_color: format!("{:06x}", report.severity().color()),
            summary: report.title(),
            sections: vec![CardSection {
                activity_title: report.title(),
                activity_subtitle: format!(
                    "{} | {}",
                    report.severity().as_str(),
                    report.timestamp.format("%Y-%m-%d %H:%M:%S UTC")
                ),
                text: report.message.clone(),
                facts,
            }],
        }
    }
}

#[async_trait]
impl NotifyChannel for WebhookChannel {
    fn name(&self) -> &'static str {
        "webhook"
    }

    fn enabled(&self) -> bool {
        self.webhook_url.is_some()
    }

    async fn send(&self, report: &ActionReport) -> Result<(), ChannelError> {
        let webhook_url = self
            .webhook_url
            .as_ref()
            .ok_or_else(|| ChannelError::NotConfigured(ENV_WEBHOOK_URL.to_string()))?;

        let payload = Self::format_payload(report);

        debug!(channel = "webhook", title = %report.title(), "Sending report");

        let response = self.client.post(webhook_url).json(&payload).send().await?;

        if response.status().is_success() {
            debug!(channel = "webhook", "Report delivered");
            Ok(())
        } else {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();

            warn!(
                channel = "webhook",
                status,
                body = %body,
                "Webhook request failed"
            );

            Err(ChannelError::Rejected { status, body })
        }
    }
}

// =============================================================================
// MessageCard types
// =============================================================================

#[derive(Debug, Serialize)]
struct CardPayload {
    #[serde(rename = "@type")]
    card_type: &'static str,
    #[serde(rename = "@context")]
    context: &'static str,
    #[serde(rename = "themeColor")]
    theme_color: String,
    summary: String,
    sections: Vec<CardSection>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CardSection {
    activity_title: String,
    activity_subtitle: String,
    text: String,
    facts: Vec<CardFact>,
}

#[derive(Debug, Serialize)]
struct CardFact {
    name: String,
    value: String,
}
