//! Tracing initialization for the intake binaries.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Initialize tracing with console output and, when a logs directory is
/// given, a daily-rolling file appender inside it.
///
/// Uses the `RUST_LOG` environment variable for filtering, defaulting to
/// `info`. The returned guard must be held for the lifetime of the
/// process; dropping it stops the background log writer.
pub fn init_tracing(logs_dir: Option<&Path>) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console_layer = tracing_subscriber::fmt::layer().with_target(true);

    match logs_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "sluice.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer)
                .with(file_layer)
                .init();

            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(console_layer)
                .init();

            None
        }
    }
}
