//! Per-connection bidirectional forwarding
//!
//! Each accepted client connection gets its own `Forwarder`, bound to one
//! target identity and one fresh upstream connection. Frames flow raw in
//! both directions; the single exception is IDENTITIES_ANSWER on the
//! agent-to-client path, which is re-ordered so the target key comes first.

use crate::error::{Error, Result};
use crate::logging::{JsonlWriter, LogEvent};
use crate::pin::pin_first;
use crate::protocol::{AgentCodec, AgentMessage, Identity, MessageType};
use bytes::Bytes;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixStream;
use tokio::task::JoinError;
use tracing::{debug, trace};

/// Which way frames are flowing within one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    ClientToAgent,
    AgentToClient,
}

impl Direction {
    fn as_str(&self) -> &'static str {
        match self {
            Direction::ClientToAgent => "client->agent",
            Direction::AgentToClient => "agent->client",
        }
    }
}

/// Relays frames between one client and one upstream agent connection
pub struct Forwarder {
    /// The identity pinned to the socket this client connected to
    target: Identity,
    /// Socket path, for log fields
    socket_name: String,
    /// Connection ID, for log fields
    conn_id: u64,
    /// Optional JSONL event log
    event_log: Option<Arc<JsonlWriter>>,
}

/// Per-direction relay parameters
struct RelaySide {
    dir: Direction,
    socket_name: String,
    conn_id: u64,
    /// Present only on the agent->client side: the key blob to pin first
    /// and its fingerprint for event logging.
    pin: Option<(Bytes, String)>,
    event_log: Option<Arc<JsonlWriter>>,
}

impl Forwarder {
    /// Create a forwarder for one accepted connection
    pub fn new(
        target: Identity,
        socket_name: impl Into<String>,
        conn_id: u64,
        event_log: Option<Arc<JsonlWriter>>,
    ) -> Self {
        Self {
            target,
            socket_name: socket_name.into(),
            conn_id,
            event_log,
        }
    }

    /// Run both directional loops to completion.
    ///
    /// The loops run concurrently; whichever terminates first (peer close,
    /// error) aborts its sibling, and both endpoints close when the stream
    /// halves drop. Close errors are swallowed. Returns the first relay
    /// error, if any; a peer simply going away is not an error.
    pub async fn run(self, client: UnixStream, agent: UnixStream) -> Result<()> {
        let (client_read, client_write) = client.into_split();
        let (agent_read, agent_write) = agent.into_split();

        let c2a_side = RelaySide {
            dir: Direction::ClientToAgent,
            socket_name: self.socket_name.clone(),
            conn_id: self.conn_id,
            pin: None,
            event_log: None,
        };
        let a2c_side = RelaySide {
            dir: Direction::AgentToClient,
            socket_name: self.socket_name.clone(),
            conn_id: self.conn_id,
            pin: Some((self.target.key_blob.clone(), self.target.fingerprint())),
            event_log: self.event_log.clone(),
        };

        let mut c2a = tokio::spawn(relay(client_read, agent_write, c2a_side));
        let mut a2c = tokio::spawn(relay(agent_read, client_write, a2c_side));

        let (first, second) = tokio::select! {
            r = &mut c2a => {
                a2c.abort();
                (r, a2c.await)
            }
            r = &mut a2c => {
                c2a.abort();
                (r, c2a.await)
            }
        };

        debug!(
            socket = %self.socket_name,
            conn_id = self.conn_id,
            "Connection finished"
        );

        flatten(first)?;
        flatten(second)?;
        Ok(())
    }
}

/// Unwrap a joined relay task; cancellation is not an error
fn flatten(res: std::result::Result<Result<()>, JoinError>) -> Result<()> {
    match res {
        Ok(r) => r,
        Err(e) if e.is_cancelled() => Ok(()),
        Err(e) => Err(Error::Protocol(format!("Forwarding task failed: {}", e))),
    }
}

/// One directional frame loop: read, dispatch, write, repeat.
///
/// Terminates on clean peer close or mid-frame EOF (both treated as the
/// connection ending, not failures). All frames except a pinned
/// IDENTITIES_ANSWER are written back as exact byte copies.
async fn relay<R, W>(mut reader: R, mut writer: W, side: RelaySide) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    loop {
        let msg = match AgentCodec::read(&mut reader).await {
            Ok(Some(msg)) => msg,
            Ok(None) => break,
            Err(Error::IncompleteFrame) => break,
            Err(e) => return Err(e),
        };

        trace!(
            socket = %side.socket_name,
            conn_id = side.conn_id,
            direction = side.dir.as_str(),
            msg_type = msg.msg_type.as_str(),
            "Forwarding frame"
        );

        let out = match (&side.pin, msg.msg_type) {
            (Some((key, fingerprint)), MessageType::IdentitiesAnswer) => {
                let identities = msg.parse_identities()?;
                let count = identities.len();
                let pinned = pin_first(identities, key);

                debug!(
                    socket = %side.socket_name,
                    conn_id = side.conn_id,
                    count = count,
                    pinned = pinned
                        .first()
                        .is_some_and(|id| id.key_blob.as_ref() == key.as_ref()),
                    "Rewrote identity list"
                );
                if let Some(log) = &side.event_log {
                    log.log(
                        &LogEvent::identities_pinned(&side.socket_name, fingerprint)
                            .with_client_id(side.conn_id.to_string())
                            .with_key_count(count as u32),
                    );
                }

                AgentMessage::build_identities_answer(&pinned)
            }
            _ => msg,
        };

        AgentCodec::write(&mut writer, &out).await?;
    }

    Ok(())
}
