//! Argument structures for CLI commands

use clap::Args;
use std::path::PathBuf;

/// Arguments for the `run` command
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Upstream SSH agent socket path
    ///
    /// Defaults to the value of SSH_AUTH_SOCK environment variable
    #[arg(short, long, env = "SSH_AUTH_SOCK")]
    pub upstream: Option<PathBuf>,

    /// Directory for the generated per-key sockets
    ///
    /// Defaults to $XDG_RUNTIME_DIR/authsock-pin
    #[arg(short = 'd', long = "dir", env = "AUTHSOCK_PIN_DIR")]
    pub socket_dir: Option<PathBuf>,

    /// Path to JSONL event log file
    #[arg(long)]
    pub log: Option<PathBuf>,
}

/// Arguments for the `config` command
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Validate configuration only
    #[arg(long)]
    pub validate: bool,

    /// Show config file search paths
    #[arg(long)]
    pub paths: bool,

    /// Show default configuration
    #[arg(long)]
    pub show_default: bool,
}
