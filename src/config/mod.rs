//! Configuration module for authsock-pin
//!
//! This module handles loading and parsing of configuration files,
//! including environment variable expansion and path resolution.

mod file;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use file::{
    ConfigFile, config_search_paths, find_config_file, load_config, load_config_or_default,
};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Path to the upstream SSH agent socket
    /// Supports environment variable expansion (e.g., $SSH_AUTH_SOCK)
    #[serde(default = "default_upstream")]
    pub upstream: String,

    /// Directory where the per-identity sockets are created
    /// Supports environment variable and tilde expansion
    #[serde(default)]
    pub socket_dir: Option<String>,

    /// Path to the JSONL event log file
    /// Supports environment variable and tilde expansion
    #[serde(default)]
    pub log_path: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            upstream: default_upstream(),
            socket_dir: None,
            log_path: None,
        }
    }
}

fn default_upstream() -> String {
    "$SSH_AUTH_SOCK".to_string()
}

impl Config {
    /// Expand environment variables and tilde in all paths
    pub fn expand_paths(&self) -> crate::Result<ExpandedConfig> {
        let upstream = expand_path(&self.upstream)?;
        let socket_dir = self
            .socket_dir
            .as_ref()
            .map(|p| expand_path(p))
            .transpose()?;
        let log_path = self.log_path.as_ref().map(|p| expand_path(p)).transpose()?;

        Ok(ExpandedConfig {
            upstream: PathBuf::from(upstream),
            socket_dir: socket_dir.map(PathBuf::from),
            log_path: log_path.map(PathBuf::from),
        })
    }
}

/// Configuration with all paths expanded
#[derive(Debug, Clone)]
pub struct ExpandedConfig {
    /// Resolved path to the upstream SSH agent socket
    pub upstream: PathBuf,

    /// Resolved directory for generated sockets
    pub socket_dir: Option<PathBuf>,

    /// Resolved path to the JSONL event log
    pub log_path: Option<PathBuf>,
}

/// Default directory for generated sockets when none is configured:
/// `$XDG_RUNTIME_DIR/authsock-pin`, falling back to the temp dir.
pub fn default_socket_dir() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("authsock-pin")
}

/// Expand environment variables and tilde in a path string
pub fn expand_path(path: &str) -> crate::Result<String> {
    // Use shellexpand for both env vars and tilde expansion
    shellexpand::full(path)
        .map(|s| s.into_owned())
        .map_err(|e| crate::Error::Config(format!("Failed to expand path '{}': {}", path, e)))
}
