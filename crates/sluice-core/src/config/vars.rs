//! Environment variable interpolation for config files.
//!
//! Supported syntax:
//! - `$VAR` or `${VAR}` - substitute with the variable's value, error if unset
//! - `${VAR:-default}` - use the default if VAR is unset OR empty
//! - `${VAR-default}` - use the default only if VAR is unset
//! - `$$` - escape sequence for a literal `$`

use regex::Regex;
use std::env;
use std::sync::LazyLock;

static VAR_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?x)
        \$\$                           # escape sequence
        |
        \$\{
            ([A-Za-z_][A-Za-z0-9_]*)   # braced variable name
            (?:
                (:?-)                  # :- or - separator
                ([^}]*)                # default value
            )?
        \}
        |
        \$([A-Za-z_][A-Za-z0-9_]*)     # unbraced variable name
        ",
    )
    .expect("invalid interpolation pattern")
});

/// Result of environment variable interpolation.
#[derive(Debug)]
pub struct InterpolationResult {
    /// The interpolated text.
    pub text: String,
    /// Errors encountered, one per unresolvable variable.
    pub errors: Vec<String>,
}

impl InterpolationResult {
    /// Returns true if there were no errors.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Interpolate environment variables in the given text.
///
/// Errors are accumulated rather than returned on first failure so every
/// missing variable is reported in one pass.
pub fn interpolate(input: &str) -> InterpolationResult {
    let mut errors = Vec::new();

    let text = VAR_PATTERN
        .replace_all(input, |caps: &regex::Captures| {
            if &caps[0] == "$$" {
                return "$".to_string();
            }

            let name = caps
                .get(1)
                .or_else(|| caps.get(4))
                .map(|m| m.as_str())
                .unwrap_or_default();
            let separator = caps.get(2).map(|m| m.as_str());
            let default = caps.get(3).map(|m| m.as_str());

            match env::var(name) {
                Ok(value) if value.is_empty() && separator == Some(":-") => {
                    default.unwrap_or_default().to_string()
                }
                Ok(value) => value,
                Err(_) => match default {
                    Some(fallback) => fallback.to_string(),
                    None => {
                        errors.push(format!("environment variable '{name}' is not set"));
                        caps[0].to_string()
                    }
                },
            }
        })
        .into_owned();

    InterpolationResult { text, errors }
}
