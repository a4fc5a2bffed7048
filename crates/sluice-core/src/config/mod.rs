//! Configuration loading support.
//!
//! The binary crate defines its own config surface; this module provides
//! the shared plumbing: reading a file and interpolating environment
//! variables into it before the YAML parser sees the text.

mod vars;

pub use vars::{InterpolationResult, interpolate};

use std::path::Path;

use crate::error::{ConfigError, ReadFileSnafu};
use snafu::prelude::*;

/// Read a configuration file and interpolate environment variables.
///
/// Returns the interpolated text ready for YAML parsing. Interpolation
/// errors are accumulated so the user sees every missing variable at once.
pub fn read_interpolated(path: &Path) -> Result<String, ConfigError> {
    let contents = std::fs::read_to_string(path).context(ReadFileSnafu)?;
    let result = interpolate(&contents);
    if !result.is_ok() {
        return Err(ConfigError::EnvInterpolation {
            message: result.errors.join("\n"),
        });
    }
    Ok(result.text)
}
