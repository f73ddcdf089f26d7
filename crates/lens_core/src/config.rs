//! Loading [`HookedConfig`] from JSON.
//!
//! ```json
//! { "device": { "cuda": 0 } }
//! ```
//!
//! Missing fields take their defaults, so `{}` is a valid configuration.

use std::fs;
use std::path::{Path, PathBuf};

use lens_graph::config::HookedConfig;

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The contents are not a valid configuration.
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Parses a configuration from a JSON string.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] for malformed JSON or unknown device tags.
pub fn parse_config(json: &str) -> Result<HookedConfig, ConfigError> {
    Ok(serde_json::from_str(json)?)
}

/// Reads and parses a JSON configuration file.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read and
/// [`ConfigError::Parse`] if it is not a valid configuration.
pub fn load_config(path: impl AsRef<Path>) -> Result<HookedConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config(&contents)?;
    tracing::debug!(path = %path.display(), ?config, "config loaded");
    Ok(config)
}
