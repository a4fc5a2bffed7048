//! Per-file processing pipeline: stage, parse, validate, route, notify.
//!
//! The orchestrator drives one file at a time from detection to a
//! terminal folder. Failures are contained per file; nothing that happens
//! while processing one file can take down the watch loop.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use sluice_core::polling::{IterationResult, PollingProcessor};

use crate::config::{AccessConfig, Config, FoldersConfig, RoutingConfig};
use crate::error::IntakeError;
use crate::forward::{DEFAULT_BACKOFF_BASE, Forwarder, forward_with_retry};
use crate::notify::Notifier;
use crate::recovery;
use crate::route;
use crate::sanitize::sanitize;
use crate::schema::{self, IngestRecord, describe_violations};
use crate::stage::{self, StagedFile};
use crate::tracker::InFlightTracker;

/// Folder layout, retry policy, and in-flight state owned by one
/// pipeline instance.
///
/// Everything mutable lives here rather than in process-wide state, so
/// independent pipelines (one per test, typically) never interfere.
pub struct PipelineContext {
    pub folders: FoldersConfig,
    pub access: AccessConfig,
    pub routing: RoutingConfig,
    pub tracker: InFlightTracker,
}

impl PipelineContext {
    pub fn new(folders: FoldersConfig, access: AccessConfig, routing: RoutingConfig) -> Self {
        Self {
            folders,
            access,
            routing,
            tracker: InFlightTracker::new(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.folders.clone(), config.access, config.routing)
    }
}

/// Why a staged file was sent to the returns folder.
enum Rejection {
    Read(std::io::Error),
    Json(serde_json::Error),
    Schema(Vec<schema::FieldViolation>),
}

impl Rejection {
    fn describe(&self) -> String {
        match self {
            Rejection::Read(e) => format!("Error reading file: {e}"),
            Rejection::Json(e) => format!("Invalid JSON format: {e}"),
            Rejection::Schema(violations) => {
                format!("Invalid record structure: {}", describe_violations(violations))
            }
        }
    }
}

/// Drives a single file through the intake state machine.
pub struct Orchestrator {
    ctx: PipelineContext,
    notifier: Arc<dyn Notifier>,
    forwarder: Arc<dyn Forwarder>,
    forward_max_retries: u32,
    forward_backoff: Duration,
}

impl Orchestrator {
    pub fn new(
        ctx: PipelineContext,
        notifier: Arc<dyn Notifier>,
        forwarder: Arc<dyn Forwarder>,
        forward_max_retries: u32,
    ) -> Self {
        Self {
            ctx,
            notifier,
            forwarder,
            forward_max_retries,
            forward_backoff: DEFAULT_BACKOFF_BASE,
        }
    }

    /// Override the forwarding backoff base (tests run with zero delay).
    pub fn with_forward_backoff(mut self, backoff: Duration) -> Self {
        self.forward_backoff = backoff;
        self
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    /// Drive one file from detection to its terminal state.
    ///
    /// Returns true only when the file reached the validated folder and
    /// was forwarded. The in-flight entry is held for the whole attempt
    /// and released on every exit path.
    pub async fn process_file(&self, path: &Path) -> bool {
        if !self.ctx.tracker.acquire(path) {
            debug!(path = %path.display(), "Already processing, skipping duplicate event");
            return false;
        }

        let outcome = self.run_stages(path).await;
        self.ctx.tracker.release(path);
        outcome
    }

    async fn run_stages(&self, path: &Path) -> bool {
        if !stage::wait_for_access(path, self.ctx.access.max_attempts, self.ctx.access.delay())
            .await
        {
            error!(path = %path.display(), "Cannot access file after multiple attempts");
            return false;
        }

        let staged = StagedFile::for_original(path, &self.ctx.folders.processing);
        if let Err(e) = stage::stage(path, &staged.path).await {
            error!(path = %path.display(), error = %e, "Failed to stage file");
            return false;
        }

        // From here on the staged copy exists; it is cleaned up exactly
        // once, whatever the outcome below.
        let outcome = match self.parse_and_validate(&staged.path).await {
            Ok(record) => self.finish_valid(&staged, &record).await,
            Err(rejection) => {
                self.finish_rejected(&staged, &rejection.describe()).await;
                false
            }
        };
        stage::cleanup(&staged.path).await;
        outcome
    }

    async fn parse_and_validate(&self, staged_path: &Path) -> Result<IngestRecord, Rejection> {
        debug!(path = %staged_path.display(), "Reading file content");
        let bytes = tokio::fs::read(staged_path).await.map_err(Rejection::Read)?;
        let raw: Value = serde_json::from_slice(&bytes).map_err(Rejection::Json)?;

        debug!(data = %sanitize(&raw), "Processing data");
        schema::validate(&raw).map_err(Rejection::Schema)
    }

    async fn finish_valid(&self, staged: &StagedFile, record: &IngestRecord) -> bool {
        let validated_path = match route::route(
            &staged.path,
            &self.ctx.folders.validated,
            &staged.name,
            self.ctx.routing.max_attempts,
        )
        .await
        {
            Ok(path) => path,
            Err(e) => {
                error!(file = %staged.name, error = %e, "Failed to move file to validated folder");
                return false;
            }
        };

        info!(
            file = %staged.name,
            structure = %record.structure_type(),
            "Validated record"
        );

        let sent = forward_with_retry(
            self.forwarder.as_ref(),
            &validated_path,
            self.forward_max_retries,
            self.forward_backoff,
        )
        .await;
        if !sent {
            // The file stays validated; transmission is a standing failure.
            error!(
                file = %staged.name,
                attempts = self.forward_max_retries,
                "Failed to send file downstream"
            );
        }
        sent
    }

    async fn finish_rejected(&self, staged: &StagedFile, reason: &str) {
        if let Err(e) = route::route(
            &staged.path,
            &self.ctx.folders.returns,
            &staged.name,
            self.ctx.routing.max_attempts,
        )
        .await
        {
            error!(file = %staged.name, error = %e, "Failed to move file to returns folder");
        }

        warn!(file = %staged.name, reason = %reason, "Rejected file");

        if let Err(e) = self.notifier.notify_failure(&staged.name, reason).await {
            error!(file = %staged.name, error = %e, "Failed to send failure notification");
        }
    }
}

/// Polling processor that drains the watched folder each iteration.
pub struct IntakeProcessor {
    orchestrator: Orchestrator,
    watched: PathBuf,
    shutdown: CancellationToken,
}

impl IntakeProcessor {
    pub fn new(
        config: &Config,
        notifier: Arc<dyn Notifier>,
        forwarder: Arc<dyn Forwarder>,
        shutdown: CancellationToken,
    ) -> Self {
        let ctx = PipelineContext::from_config(config);
        Self {
            orchestrator: Orchestrator::new(
                ctx,
                notifier,
                forwarder,
                config.forwarding.max_retries,
            ),
            watched: config.folders.watched.clone(),
            shutdown,
        }
    }

    /// List the `.json` regular files currently in the watched folder.
    ///
    /// A failed scan is not fatal: it is logged and the next poll tries
    /// again, so a transiently unavailable watched folder cannot take
    /// down the process.
    async fn scan_watched(&self) -> Vec<PathBuf> {
        let mut entries = match tokio::fs::read_dir(&self.watched).await {
            Ok(entries) => entries,
            Err(e) => {
                error!(path = %self.watched.display(), error = %e, "Failed to scan watched folder");
                return Vec::new();
            }
        };

        let mut pending = Vec::new();
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(e) => {
                    error!(path = %self.watched.display(), error = %e, "Error reading watched folder");
                    break;
                }
            };

            let path = entry.path();
            let is_file = entry
                .file_type()
                .await
                .map(|kind| kind.is_file())
                .unwrap_or(false);
            if is_file && path.extension().is_some_and(|ext| ext == "json") {
                pending.push(path);
            }
        }

        pending.sort();
        pending
    }
}

#[async_trait]
impl PollingProcessor for IntakeProcessor {
    type State = Vec<PathBuf>;
    type Error = IntakeError;

    async fn prepare(&mut self, cold_start: bool) -> Result<Option<Self::State>, Self::Error> {
        if cold_start {
            let moved = recovery::sweep_processing_area(
                &self.orchestrator.ctx.folders.processing,
                &self.orchestrator.ctx.folders.returns,
                self.orchestrator.ctx.routing.max_attempts,
            )
            .await;
            if moved > 0 {
                info!(count = moved, "Recovered interrupted files from previous run");
            }
        }

        let pending = self.scan_watched().await;
        if pending.is_empty() {
            return Ok(None);
        }

        info!(files = pending.len(), "Found files to process");
        Ok(Some(pending))
    }

    async fn process(&mut self, state: Self::State) -> Result<IterationResult, Self::Error> {
        for path in state {
            if self.shutdown.is_cancelled() {
                return Ok(IterationResult::Shutdown);
            }
            self.orchestrator.process_file(&path).await;
        }
        Ok(IterationResult::ProcessedItems)
    }
}
