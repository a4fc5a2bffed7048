//! Generic polling loop trait and runner.
//!
//! The intake gate discovers work by scanning a folder on an interval.
//! The loop shape (prepare state, process it, wait or shut down) is kept
//! separate from the domain so it can be exercised with stub processors.

use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Result of a single processing iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IterationResult {
    /// Items were processed.
    ProcessedItems,
    /// Nothing was available to process.
    NoItems,
    /// Shutdown was requested mid-iteration.
    Shutdown,
}

/// Trait for a polling-based processor.
#[async_trait]
pub trait PollingProcessor {
    /// State prepared for one iteration.
    type State: Send;
    /// Error type for loop-fatal failures. Per-item failures must be
    /// contained inside `process`.
    type Error: std::error::Error + Send;

    /// Set up state for an iteration. Returns `None` when there is no
    /// work to do. `cold_start` is true only on the first iteration,
    /// for recovery logic that must run before any watching begins.
    async fn prepare(&mut self, cold_start: bool) -> Result<Option<Self::State>, Self::Error>;

    /// Process the prepared state.
    async fn process(&mut self, state: Self::State) -> Result<IterationResult, Self::Error>;
}

/// Drive a processor until shutdown is requested.
///
/// Each turn: `prepare()` (racing the shutdown token), `process()` when
/// work exists, then sleep for the poll interval or exit on shutdown.
pub async fn run_polling_loop<P: PollingProcessor>(
    processor: &mut P,
    poll_interval: Duration,
    shutdown: CancellationToken,
) -> Result<(), P::Error> {
    let mut cold_start = true;

    loop {
        let state = tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!("Shutdown requested, stopping watch loop");
                return Ok(());
            }

            result = processor.prepare(cold_start) => result?,
        };
        cold_start = false;

        let outcome = match state {
            Some(state) => processor.process(state).await?,
            None => IterationResult::NoItems,
        };

        match outcome {
            IterationResult::Shutdown => break,
            IterationResult::NoItems => {
                debug!(
                    "No new files, waiting {}s before next scan",
                    poll_interval.as_secs()
                );
            }
            IterationResult::ProcessedItems => {
                debug!(
                    "Iteration complete, waiting {}s before next scan",
                    poll_interval.as_secs()
                );
            }
        }

        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("Shutdown requested during poll wait");
                break;
            }
            _ = tokio::time::sleep(poll_interval) => {}
        }
    }

    Ok(())
}
