//! Per-identity listener multiplexing
//!
//! The proxy server binds one unix socket per upstream identity, named by
//! the identity's fingerprint, then accepts connections on all of them
//! concurrently. Each accepted connection gets its own fresh upstream
//! connection and its own `Forwarder`.

use crate::agent::{Forwarder, Upstream};
use crate::error::{Error, Result};
use crate::logging::{JsonlWriter, LogEvent};
use crate::protocol::Identity;
use crate::utils::socket::{ensure_socket_dir, remove_existing_socket, set_socket_permissions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::net::UnixListener;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// One bound per-identity socket
struct IdentityListener {
    identity: Identity,
    path: PathBuf,
    listener: UnixListener,
}

/// Accepts clients on one socket per identity and forwards their traffic
pub struct ProxyServer {
    upstream: Arc<Upstream>,
    listeners: Vec<IdentityListener>,
    event_log: Option<Arc<JsonlWriter>>,
    connection_counter: Arc<AtomicU64>,
}

impl ProxyServer {
    /// Bind one socket per identity inside `socket_dir`.
    ///
    /// The directory is created if absent. Every bind is attempted; a
    /// failed bind is logged and skipped rather than aborting the ones
    /// that already succeeded. Binding fails as a whole only when there
    /// were identities but not a single socket could be bound.
    pub fn bind(
        upstream: Upstream,
        socket_dir: &Path,
        identities: Vec<Identity>,
        event_log: Option<Arc<JsonlWriter>>,
    ) -> Result<Self> {
        ensure_socket_dir(socket_dir).map_err(|e| Error::Socket(e.to_string()))?;

        let mut listeners = Vec::with_capacity(identities.len());
        let mut failed = 0usize;

        for identity in identities {
            let path = socket_dir.join(identity.fingerprint());
            match bind_socket(&path) {
                Ok(listener) => {
                    info!(
                        socket = %path.display(),
                        comment = %identity.comment_lossy(),
                        key_type = identity.key_type().as_deref().unwrap_or("unknown"),
                        "Listening for identity"
                    );
                    if let Some(log) = &event_log {
                        log.log(
                            &LogEvent::server_start(path.display().to_string())
                                .with_fingerprint(identity.fingerprint())
                                .with_comment(identity.comment_lossy()),
                        );
                    }
                    listeners.push(IdentityListener {
                        identity,
                        path,
                        listener,
                    });
                }
                Err(e) => {
                    warn!(
                        socket = %path.display(),
                        comment = %identity.comment_lossy(),
                        error = %e,
                        "Failed to bind per-identity socket, skipping"
                    );
                    failed += 1;
                }
            }
        }

        if listeners.is_empty() && failed > 0 {
            return Err(Error::Socket(
                "no per-identity socket could be bound".to_string(),
            ));
        }

        Ok(Self {
            upstream: Arc::new(upstream),
            listeners,
            event_log,
            connection_counter: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Paths of all sockets that were successfully bound
    pub fn socket_paths(&self) -> Vec<PathBuf> {
        self.listeners.iter().map(|l| l.path.clone()).collect()
    }

    /// Number of listening sockets
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Accept connections on every listener until externally terminated.
    ///
    /// Each accepted connection is served by a spawned `Forwarder` with
    /// its own fresh upstream connection, so a slow or failing connection
    /// never blocks the accept loops or other connections.
    pub async fn serve(self) -> Result<()> {
        let mut accept_loops = JoinSet::new();

        for il in self.listeners {
            let upstream = Arc::clone(&self.upstream);
            let counter = Arc::clone(&self.connection_counter);
            let event_log = self.event_log.clone();
            accept_loops.spawn(accept_loop(il, upstream, counter, event_log));
        }

        // Accept loops only return if their listener breaks.
        while let Some(joined) = accept_loops.join_next().await {
            if let Err(e) = joined {
                if !e.is_cancelled() {
                    error!(error = %e, "Accept loop terminated unexpectedly");
                }
            }
        }

        Ok(())
    }
}

fn bind_socket(path: &Path) -> Result<UnixListener> {
    remove_existing_socket(path).map_err(|e| Error::Socket(e.to_string()))?;
    let listener = UnixListener::bind(path).map_err(|e| {
        Error::Socket(format!("Failed to bind to socket at {}: {}", path.display(), e))
    })?;
    set_socket_permissions(path).map_err(|e| Error::Socket(e.to_string()))?;
    Ok(listener)
}

async fn accept_loop(
    il: IdentityListener,
    upstream: Arc<Upstream>,
    counter: Arc<AtomicU64>,
    event_log: Option<Arc<JsonlWriter>>,
) {
    let socket_name = il.path.display().to_string();

    loop {
        let (client, _addr) = match il.listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                error!(socket = %socket_name, error = %e, "Failed to accept connection");
                continue;
            }
        };

        let conn_id = counter.fetch_add(1, Ordering::Relaxed);
        debug!(socket = %socket_name, conn_id = conn_id, "Client connected");
        if let Some(log) = &event_log {
            log.log(&LogEvent::client_connect(&socket_name, conn_id.to_string()));
        }

        // Every client gets its own upstream connection; nothing is
        // multiplexed or shared between connections.
        let agent = match upstream.connect().await {
            Ok(stream) => stream,
            Err(e) => {
                warn!(
                    socket = %socket_name,
                    conn_id = conn_id,
                    error = %e,
                    "Dropping client: upstream connection failed"
                );
                continue;
            }
        };

        let forwarder = Forwarder::new(
            il.identity.clone(),
            socket_name.clone(),
            conn_id,
            event_log.clone(),
        );
        let socket_name_for_task = socket_name.clone();
        let event_log_for_task = event_log.clone();
        tokio::spawn(async move {
            if let Err(e) = forwarder.run(client, agent).await {
                // Connection errors are expected (client disconnect, etc.)
                debug!(
                    socket = %socket_name_for_task,
                    conn_id = conn_id,
                    error = %e,
                    "Connection handler error"
                );
            }
            debug!(socket = %socket_name_for_task, conn_id = conn_id, "Client disconnected");
            if let Some(log) = &event_log_for_task {
                log.log(&LogEvent::client_disconnect(
                    &socket_name_for_task,
                    conn_id.to_string(),
                ));
            }
        });
    }
}

/// Guard that cleans up a socket path when dropped
pub struct SocketCleanupGuard {
    path: PathBuf,
}

impl SocketCleanupGuard {
    /// Create a new cleanup guard for the given socket path
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl Drop for SocketCleanupGuard {
    fn drop(&mut self) {
        if self.path.exists() {
            if let Err(e) = std::fs::remove_file(&self.path) {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to remove socket file during cleanup"
                );
            } else {
                debug!(path = %self.path.display(), "Removed socket file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tempfile::tempdir;

    fn identity(key: &[u8], comment: &[u8]) -> Identity {
        Identity::new(Bytes::copy_from_slice(key), Bytes::copy_from_slice(comment))
    }

    #[tokio::test]
    async fn test_bind_creates_one_socket_per_identity() {
        let dir = tempdir().unwrap();
        let socket_dir = dir.path().join("sockets");

        let ids = vec![identity(b"key-a", b"work"), identity(b"key-b", b"personal")];
        let fingerprints: Vec<String> = ids.iter().map(|id| id.fingerprint()).collect();

        let upstream = Upstream::new("/tmp/unused-upstream.sock");
        let server = ProxyServer::bind(upstream, &socket_dir, ids, None).unwrap();

        assert_eq!(server.listener_count(), 2);
        for fp in fingerprints {
            assert!(socket_dir.join(fp).exists());
        }
    }

    #[tokio::test]
    async fn test_bind_no_identities_is_ok() {
        let dir = tempdir().unwrap();
        let upstream = Upstream::new("/tmp/unused-upstream.sock");
        let server = ProxyServer::bind(upstream, dir.path(), Vec::new(), None).unwrap();
        assert_eq!(server.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_bind_replaces_stale_socket_file() {
        let dir = tempdir().unwrap();
        let socket_dir = dir.path().join("sockets");
        std::fs::create_dir_all(&socket_dir).unwrap();

        let id = identity(b"key-a", b"work");
        let stale = socket_dir.join(id.fingerprint());
        std::fs::write(&stale, b"stale").unwrap();

        let upstream = Upstream::new("/tmp/unused-upstream.sock");
        let server = ProxyServer::bind(upstream, &socket_dir, vec![id], None).unwrap();
        assert_eq!(server.listener_count(), 1);
    }

    #[test]
    fn test_socket_cleanup_guard() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("guard_test.sock");

        std::fs::write(&socket_path, b"test").unwrap();
        assert!(socket_path.exists());

        {
            let _guard = SocketCleanupGuard::new(&socket_path);
        }

        assert!(!socket_path.exists());
    }
}
