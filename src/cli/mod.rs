//! CLI module for authsock-pin
//!
//! This module provides the command-line interface using clap derive macros.

pub mod args;
pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use args::{ConfigArgs, RunArgs};

/// SSH agent proxy that exposes one socket per key, with that key pinned first
#[derive(Parser, Debug)]
#[command(name = "authsock-pin")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file path
    #[arg(long, global = true, env = "AUTHSOCK_PIN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the proxy in the foreground
    Run(RunArgs),

    /// Show or validate configuration
    Config(ConfigArgs),

    /// Show version information
    Version,
}
