//! Downstream forwarding collaborator with the in-core retry policy.
//!
//! The transmission itself is external; what is owned here is when it is
//! attempted and how failures are retried. Forwarding failure never
//! reclassifies a file that already reached the validated folder.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use snafu::prelude::*;
use tracing::{debug, error};

use crate::config::ForwardingConfig;
use crate::error::{ForwardError, ForwardReadSnafu, ForwardRequestSnafu, ForwardStatusSnafu};

/// Base delay for the exponential backoff between attempts.
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Downstream transmission seam.
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(&self, path: &Path) -> Result<(), ForwardError>;
}

/// Transmits validated files to the downstream endpoint over HTTP.
pub struct HttpForwarder {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpForwarder {
    pub fn new(config: &ForwardingConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: config.endpoint.clone(),
        }
    }
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(&self, path: &Path) -> Result<(), ForwardError> {
        debug!(path = %path.display(), "Attempting to transmit file");

        let body = tokio::fs::read(path).await.context(ForwardReadSnafu {
            path: path.display().to_string(),
        })?;

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .context(ForwardRequestSnafu)?;

        let status = response.status();
        ensure!(
            status.is_success(),
            ForwardStatusSnafu {
                status: status.as_u16()
            }
        );

        debug!("Successfully sent file downstream");
        Ok(())
    }
}

/// Retry `forwarder.forward(path)` with exponential backoff.
///
/// The wait doubles after each failed attempt, starting from
/// `base_delay`. Returns false once `max_retries` attempts are spent; the
/// caller logs that as a standing failure and does nothing else.
pub async fn forward_with_retry(
    forwarder: &dyn Forwarder,
    path: &Path,
    max_retries: u32,
    base_delay: Duration,
) -> bool {
    for attempt in 1..=max_retries {
        match forwarder.forward(path).await {
            Ok(()) => return true,
            Err(e) => {
                error!(attempt, max_retries, error = %e, "Forwarding attempt failed");
            }
        }

        if attempt < max_retries {
            let backoff = base_delay * 2u32.pow(attempt - 1);
            tokio::time::sleep(backoff).await;
        }
    }
    false
}
