//! Run command - execute the proxy in the foreground

use anyhow::{Context, Result, bail};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

use crate::agent::{ProxyServer, SocketCleanupGuard, Upstream};
use crate::cli::args::RunArgs;
use crate::config::{default_socket_dir, expand_path, load_config_or_default};
use crate::logging::{JsonlWriter, LogEvent};

/// Execute the run command
pub async fn execute(args: RunArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config_or_default(config_path.as_deref())
        .context("Failed to load configuration")?
        .config;

    // CLI/env beats the config file, which beats built-in defaults.
    // Expansion is per-field so an unset $SSH_AUTH_SOCK in the config
    // default cannot fail a run that passed --upstream explicitly.
    let upstream_path = match args.upstream {
        Some(path) => path,
        None => PathBuf::from(
            expand_path(&config.upstream)
                .context("Upstream socket path is required. Set SSH_AUTH_SOCK or use --upstream")?,
        ),
    };

    if !upstream_path.exists() {
        bail!(
            "Upstream socket does not exist: {}",
            upstream_path.display()
        );
    }

    let socket_dir = match args.socket_dir {
        Some(path) => path,
        None => match &config.socket_dir {
            Some(raw) => PathBuf::from(expand_path(raw)?),
            None => default_socket_dir(),
        },
    };

    let log_path = match args.log {
        Some(path) => Some(path),
        None => config
            .log_path
            .as_deref()
            .map(expand_path)
            .transpose()?
            .map(PathBuf::from),
    };
    let event_log = match log_path {
        Some(path) => {
            info!(log = %path.display(), "JSONL event logging enabled");
            Some(Arc::new(JsonlWriter::new(&path).with_context(|| {
                format!("Failed to open event log at {}", path.display())
            })?))
        }
        None => None,
    };

    info!(
        upstream = %upstream_path.display(),
        socket_dir = %socket_dir.display(),
        "Starting authsock-pin"
    );

    // One-shot snapshot of the upstream key set. Keys added to or removed
    // from the agent later are not reflected until restart.
    let upstream = Upstream::new(&upstream_path);
    let identities = upstream
        .fetch_identities()
        .await
        .context("Failed to fetch identities from upstream agent")?;

    if identities.is_empty() {
        warn!("Upstream agent holds no identities; no sockets will be created");
    }

    let server = ProxyServer::bind(upstream, &socket_dir, identities, event_log.clone())
        .context("Failed to bind per-identity sockets")?;

    let socket_paths = server.socket_paths();
    let _cleanup: Vec<SocketCleanupGuard> = socket_paths
        .iter()
        .map(SocketCleanupGuard::new)
        .collect();

    info!(
        sockets = server.listener_count(),
        "Proxy serving. Press Ctrl+C to stop."
    );

    tokio::select! {
        result = server.serve() => {
            result.context("Proxy server terminated")?;
        }
        result = signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            info!("Received shutdown signal, stopping");
        }
    }

    if let Some(log) = &event_log {
        for path in &socket_paths {
            log.log(&LogEvent::server_stop(path.display().to_string()));
        }
    }

    Ok(())
}
