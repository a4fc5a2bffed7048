//! Configuration error types shared across the workspace.

use snafu::prelude::*;
use std::path::PathBuf;

/// Errors that can occur while loading and validating configuration.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[snafu(display("Failed to read configuration file: {source}"))]
    ReadFile { source: std::io::Error },

    /// Environment variable interpolation failed.
    #[snafu(display("Environment variable interpolation failed:\n{message}"))]
    EnvInterpolation { message: String },

    /// Failed to parse YAML configuration.
    #[snafu(display("Failed to parse YAML: {source}"))]
    YamlParse { source: serde_yaml::Error },

    /// A required configuration value is absent or empty.
    #[snafu(display("Missing required configuration value: {field}"))]
    MissingValue { field: &'static str },

    /// A required folder could not be created.
    #[snafu(display("Failed to create folder {}: {source}", path.display()))]
    CreateFolder {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A required folder exists but cannot be written to.
    #[snafu(display("Insufficient permissions for folder {}: need read/write access", path.display()))]
    FolderNotWritable { path: PathBuf },
}
