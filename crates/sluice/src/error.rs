//! Error types for the sluice intake pipeline.

use snafu::prelude::*;

// Re-export the shared config error
pub use sluice_core::error::ConfigError;

/// Errors that can occur while staging a file into the processing area.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum StageError {
    /// Failed to create the processing directory.
    #[snafu(display("Failed to create processing directory {path}: {source}"))]
    StageCreateDir {
        path: String,
        source: std::io::Error,
    },

    /// Failed to copy the source file into the processing area.
    #[snafu(display("Failed to copy {path} into the processing area: {source}"))]
    StageCopy {
        path: String,
        source: std::io::Error,
    },
}

/// Errors that can occur while routing a staged file to a terminal folder.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RouteError {
    /// Every attempt to place the file in its destination failed.
    #[snafu(display("Failed to move file into {folder} after {attempts} attempts"))]
    RouteExhausted { folder: String, attempts: u32 },
}

/// Errors raised by the notification collaborator.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum NotifyError {
    /// The notification request could not be sent.
    #[snafu(display("Notification request failed: {source}"))]
    NotifyRequest { source: reqwest::Error },

    /// The notification endpoint rejected the request.
    #[snafu(display("Notification endpoint returned HTTP {status}"))]
    NotifyStatus { status: u16 },
}

/// Errors raised by the forwarding collaborator.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ForwardError {
    /// The validated file could not be read for transmission.
    #[snafu(display("Failed to read {path} for forwarding: {source}"))]
    ForwardRead {
        path: String,
        source: std::io::Error,
    },

    /// The forwarding request could not be sent.
    #[snafu(display("Forwarding request failed: {source}"))]
    ForwardRequest { source: reqwest::Error },

    /// The downstream endpoint rejected the file.
    #[snafu(display("Downstream endpoint returned HTTP {status}"))]
    ForwardStatus { status: u16 },
}

/// Top-level intake errors.
///
/// Only startup-time conditions surface here; every per-file failure is
/// contained by the orchestrator and ends in the returns folder instead.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum IntakeError {
    /// Configuration error.
    #[snafu(display("Configuration error: {source}"))]
    Config { source: ConfigError },
}

impl From<ConfigError> for IntakeError {
    fn from(source: ConfigError) -> Self {
        IntakeError::Config { source }
    }
}
