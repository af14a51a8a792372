//! Upstream SSH agent connection
//!
//! This module handles the connection to the upstream SSH agent,
//! typically accessed via the SSH_AUTH_SOCK environment variable.

use crate::error::{Error, Result};
use crate::protocol::{AgentCodec, AgentMessage, Identity, MessageType};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::net::UnixStream;
use tracing::{debug, trace};

/// Default connection timeout for upstream agent
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection factory for an upstream SSH agent
pub struct Upstream {
    /// Path to the upstream agent socket
    socket_path: PathBuf,
}

impl Upstream {
    /// Create a new upstream connection factory
    ///
    /// # Arguments
    /// * `socket_path` - Path to the upstream agent socket
    pub fn new<P: AsRef<Path>>(socket_path: P) -> Self {
        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
        }
    }

    /// Get the socket path
    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Connect to the upstream agent with timeout
    pub async fn connect(&self) -> Result<UnixStream> {
        let stream = tokio::time::timeout(
            DEFAULT_CONNECT_TIMEOUT,
            UnixStream::connect(&self.socket_path),
        )
        .await
        .map_err(|_| {
            Error::UpstreamNotAvailable(format!(
                "Connection to upstream agent at {} timed out after {:?}",
                self.socket_path.display(),
                DEFAULT_CONNECT_TIMEOUT
            ))
        })?
        .map_err(|e| {
            Error::UpstreamNotAvailable(format!(
                "Failed to connect to upstream agent at {}: {}",
                self.socket_path.display(),
                e
            ))
        })?;

        trace!(socket_path = %self.socket_path.display(), "Connected to upstream agent");
        Ok(stream)
    }

    /// Fetch the upstream agent's identity list.
    ///
    /// Opens a fresh connection, performs the single REQUEST_IDENTITIES
    /// round trip, and closes the connection. Called exactly once, at
    /// startup; the returned list is the process-wide snapshot.
    pub async fn fetch_identities(&self) -> Result<Vec<Identity>> {
        let mut stream = self.connect().await?;
        let (mut reader, mut writer) = stream.split();

        AgentCodec::write(&mut writer, &AgentMessage::request_identities()).await?;

        let response = AgentCodec::read(&mut reader).await?.ok_or_else(|| {
            Error::Protocol("Upstream agent closed connection unexpectedly".to_string())
        })?;

        if response.msg_type != MessageType::IdentitiesAnswer {
            return Err(Error::UnexpectedResponse(format!(
                "expected IDENTITIES_ANSWER, got {}",
                response.msg_type.as_str()
            )));
        }

        let identities = response.parse_identities()?;
        debug!(
            socket_path = %self.socket_path.display(),
            count = identities.len(),
            "Fetched identities from upstream agent"
        );
        Ok(identities)
    }
}
