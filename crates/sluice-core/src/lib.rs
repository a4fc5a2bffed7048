//! Shared foundation for the sluice intake workspace.
//!
//! This crate carries the ambient concerns the intake binary builds on:
//! - Tracing initialization (console plus rolling log file)
//! - Environment-variable interpolation for YAML configuration
//! - Unix signal handling for graceful shutdown
//! - The generic polling-loop runner

pub mod config;
pub mod error;
pub mod polling;
pub mod signal;
pub mod tracing;

pub use config::interpolate;
pub use crate::tracing::init_tracing;
pub use error::ConfigError;
pub use signal::shutdown_signal;
