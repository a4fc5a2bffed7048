//! Sluice CLI: unattended intake gate for dropped JSON record files.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use sluice::forward::HttpForwarder;
use sluice::notify::WebhookNotifier;
use sluice::{CliArgs, Config, IntakeProcessor, init_tracing, run_polling_loop, shutdown_signal};

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();

    let config = match Config::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = config.ensure_folders() {
        eprintln!("Failed to prepare required folders: {e}");
        return ExitCode::FAILURE;
    }

    // Folders exist now, so the rolling log file has somewhere to live.
    let _guard = init_tracing(Some(&config.folders.logs));

    info!("Starting sluice intake gate");

    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            shutdown.cancel();
        });
    }

    let notifier = Arc::new(WebhookNotifier::new(&config.notification));
    let forwarder = Arc::new(HttpForwarder::new(&config.forwarding));
    let mut processor = IntakeProcessor::new(&config, notifier, forwarder, shutdown.clone());

    info!(folder = %config.folders.watched.display(), "Watching folder");

    match run_polling_loop(&mut processor, config.poll_interval(), shutdown).await {
        Ok(()) => {
            info!("Application shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Intake loop failed");
            ExitCode::FAILURE
        }
    }
}
