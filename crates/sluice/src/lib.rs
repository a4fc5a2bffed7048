//! Sluice: validated-intake gate for dropped JSON record files.
//!
//! This crate handles:
//! - Scanning an intake folder for newly dropped `.json` files
//! - Staging each file into a processing area before anything reads it
//! - Validating records against the flat-or-nested customer contract
//! - Routing files to the validated/returns terminal folders, never
//!   overwriting on name collision
//! - Notifying operators about rejected files and forwarding validated
//!   files downstream with bounded retries
//! - Sweeping files orphaned by a crash into the returns folder at startup

pub mod config;
pub mod error;
pub mod forward;
pub mod notify;
pub mod pipeline;
pub mod recovery;
pub mod route;
pub mod sanitize;
pub mod schema;
pub mod stage;
pub mod tracker;

pub use config::{CliArgs, Config};
pub use error::IntakeError;
pub use pipeline::{IntakeProcessor, Orchestrator, PipelineContext};

// Re-export from sluice-core
pub use sluice_core::polling::run_polling_loop;
pub use sluice_core::{init_tracing, shutdown_signal};
