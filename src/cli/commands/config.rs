//! Config command - show or validate configuration

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::cli::args::ConfigArgs;
use crate::config::{Config, config_search_paths, load_config_or_default};

/// Example configuration content
fn example_config() -> &'static str {
    r#"# authsock-pin configuration file

# Upstream SSH agent socket
# Default: $SSH_AUTH_SOCK
# upstream = "/run/user/1000/ssh-agent.sock"

# Directory where one socket per upstream key is created, each named by
# the lowercase hex MD5 of the raw key blob.
# Default: $XDG_RUNTIME_DIR/authsock-pin
# socket_dir = "/run/user/1000/authsock-pin"

# Optional JSONL event log
# log_path = "~/.local/state/authsock-pin/events.jsonl"
"#
}

/// Execute the config command
pub async fn execute(args: ConfigArgs, config_path: Option<PathBuf>) -> Result<()> {
    if args.paths {
        println!("Config search paths (in priority order):");
        for (i, path) in config_search_paths().iter().enumerate() {
            let exists = if path.exists() { " [exists]" } else { "" };
            println!("  {}. {}{}", i + 1, path.display(), exists);
        }
        return Ok(());
    }

    if args.show_default {
        print!("{}", example_config());
        return Ok(());
    }

    let config_file =
        load_config_or_default(config_path.as_deref()).context("Failed to load configuration")?;

    if args.validate {
        // Expansion catches unset variables and malformed paths
        config_file
            .config
            .expand_paths()
            .context("Configuration is invalid")?;
        println!("Configuration OK");
        return Ok(());
    }

    if config_file.path.as_os_str().is_empty() {
        println!("# No configuration file found; showing defaults");
        print!("{}", toml::to_string_pretty(&Config::default())?);
    } else {
        println!("# {}", config_file.path.display());
        print!("{}", toml::to_string_pretty(&config_file.config)?);
    }

    Ok(())
}
