//! Configuration for the sluice intake gate.

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use snafu::prelude::*;

use crate::error::ConfigError;
use sluice_core::config::read_interpolated;
use sluice_core::error::{CreateFolderSnafu, FolderNotWritableSnafu};

/// Command-line arguments.
#[derive(Debug, Parser)]
#[command(
    name = "sluice",
    about = "Validated-intake gate for dropped JSON record files"
)]
pub struct CliArgs {
    /// Path to the YAML configuration file.
    #[arg(short, long)]
    pub config: PathBuf,
}

/// Folder layout for the intake gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoldersConfig {
    /// Folder watched for newly dropped files.
    #[serde(default = "default_watched")]
    pub watched: PathBuf,
    /// Working area files are staged into while being validated.
    #[serde(default = "default_processing")]
    pub processing: PathBuf,
    /// Terminal folder for files that passed validation.
    #[serde(default = "default_validated")]
    pub validated: PathBuf,
    /// Terminal folder for rejected or malformed files.
    #[serde(default = "default_returns")]
    pub returns: PathBuf,
    /// Folder receiving the rolling log file.
    #[serde(default = "default_logs")]
    pub logs: PathBuf,
}

impl Default for FoldersConfig {
    fn default() -> Self {
        Self {
            watched: default_watched(),
            processing: default_processing(),
            validated: default_validated(),
            returns: default_returns(),
            logs: default_logs(),
        }
    }
}

fn default_watched() -> PathBuf {
    PathBuf::from("data")
}

fn default_processing() -> PathBuf {
    PathBuf::from("processing")
}

fn default_validated() -> PathBuf {
    PathBuf::from("validated")
}

fn default_returns() -> PathBuf {
    PathBuf::from("returns")
}

fn default_logs() -> PathBuf {
    PathBuf::from("logs")
}

/// Retry policy for waiting on a file that is still being written.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Attempts before giving up on reading the source file.
    #[serde(default = "default_access_attempts")]
    pub max_attempts: u32,
    /// Delay between attempts, in seconds.
    #[serde(default = "default_access_delay")]
    pub delay_secs: u64,
}

impl AccessConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_access_attempts(),
            delay_secs: default_access_delay(),
        }
    }
}

fn default_access_attempts() -> u32 {
    10
}

fn default_access_delay() -> u64 {
    1
}

/// Retry policy for moving files into terminal folders.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Attempts before a terminal-folder move is abandoned.
    #[serde(default = "default_route_attempts")]
    pub max_attempts: u32,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_route_attempts(),
        }
    }
}

fn default_route_attempts() -> u32 {
    3
}

/// Operator notification settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Webhook URL receiving failure notifications.
    pub webhook_url: String,
    /// Bearer credential for the webhook. Usually supplied through
    /// environment interpolation rather than written into the file.
    pub credential: String,
}

/// Downstream forwarding settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardingConfig {
    /// Endpoint validated files are transmitted to.
    pub endpoint: String,
    /// Transmission attempts before the failure is logged as standing.
    #[serde(default = "default_forward_retries")]
    pub max_retries: u32,
}

fn default_forward_retries() -> u32 {
    3
}

/// Main configuration for the intake gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub folders: FoldersConfig,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub routing: RoutingConfig,
    pub notification: NotificationConfig,
    pub forwarding: ForwardingConfig,
    /// Seconds between scans of the watched folder.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_poll_interval() -> u64 {
    1
}

impl Config {
    /// Load configuration from a file, interpolating environment variables.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = read_interpolated(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let config: Config =
            serde_yaml::from_str(contents).map_err(|source| ConfigError::YamlParse { source })?;
        config.validate()?;
        Ok(config)
    }

    /// Validate mandatory values.
    ///
    /// The notification credential is a hard startup requirement: the
    /// pipeline must not start accepting files it cannot report on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.notification.webhook_url.is_empty() {
            return Err(ConfigError::MissingValue {
                field: "notification.webhook_url",
            });
        }
        if self.notification.credential.is_empty() {
            return Err(ConfigError::MissingValue {
                field: "notification.credential",
            });
        }
        if self.forwarding.endpoint.is_empty() {
            return Err(ConfigError::MissingValue {
                field: "forwarding.endpoint",
            });
        }
        Ok(())
    }

    /// Create every required folder and verify it is writable.
    pub fn ensure_folders(&self) -> Result<(), ConfigError> {
        for folder in [
            &self.folders.watched,
            &self.folders.processing,
            &self.folders.validated,
            &self.folders.returns,
            &self.folders.logs,
        ] {
            std::fs::create_dir_all(folder).context(CreateFolderSnafu {
                path: folder.clone(),
            })?;

            let writable = std::fs::metadata(folder)
                .map(|meta| !meta.permissions().readonly())
                .unwrap_or(false);
            ensure!(
                writable,
                FolderNotWritableSnafu {
                    path: folder.clone(),
                }
            );
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}
