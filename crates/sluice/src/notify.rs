//! Operator notification collaborator.
//!
//! Invoked exactly once per failure terminal with the file's display name
//! and a human-readable reason. Never invoked on success, and never
//! handed secret field content; rejection reasons are built from
//! [`crate::schema::FieldViolation`]s, which carry constraints only.

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use snafu::prelude::*;
use tracing::{debug, info};

use crate::config::NotificationConfig;
use crate::error::{NotifyError, NotifyRequestSnafu, NotifyStatusSnafu};

/// Failure-notification seam. The transport behind it is external; only
/// the invocation contract is owned here.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_failure(&self, file_name: &str, reason: &str) -> Result<(), NotifyError>;
}

#[derive(Serialize)]
struct FailurePayload<'a> {
    file: &'a str,
    error: &'a str,
    timestamp: String,
}

/// Posts failure notifications to an operator webhook.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    credential: String,
}

impl WebhookNotifier {
    pub fn new(config: &NotificationConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: config.webhook_url.clone(),
            credential: config.credential.clone(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify_failure(&self, file_name: &str, reason: &str) -> Result<(), NotifyError> {
        info!(file = %file_name, "Sending failure notification");
        debug!(reason = %reason, "Notification details");

        let payload = FailurePayload {
            file: file_name,
            error: reason,
            timestamp: Utc::now().to_rfc3339(),
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.credential)
            .json(&payload)
            .send()
            .await
            .context(NotifyRequestSnafu)?;

        let status = response.status();
        ensure!(
            status.is_success(),
            NotifyStatusSnafu {
                status: status.as_u16()
            }
        );

        info!(file = %file_name, "Failure notification delivered");
        Ok(())
    }
}
