//! SSH Agent Protocol message types and parsing

use crate::error::{Error, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use md5::{Digest, Md5};
use ssh_key::PublicKey;

/// Maximum number of identities allowed in a single message.
/// This prevents malicious agents from causing excessive memory allocation.
const MAX_IDENTITIES: u32 = 10000;

/// Maximum size for a single key blob or comment (16 MB).
/// Prevents memory exhaustion from malicious length fields.
const MAX_BLOB_SIZE: u32 = 16 * 1024 * 1024;

/// SSH Agent message types
///
/// Only the tags this proxy actually looks at are named. Everything else
/// is carried as `Unknown` with the original tag byte, so unrecognized
/// messages survive a decode/encode round trip untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    // Requests from client
    RequestIdentities,
    SignRequest,
    Extension,

    // Responses from agent
    Failure,
    Success,
    IdentitiesAnswer,
    SignResponse,

    // Any other tag, preserved verbatim
    Unknown(u8),
}

impl From<u8> for MessageType {
    fn from(value: u8) -> Self {
        match value {
            5 => MessageType::Failure,
            6 => MessageType::Success,
            11 => MessageType::RequestIdentities,
            12 => MessageType::IdentitiesAnswer,
            13 => MessageType::SignRequest,
            14 => MessageType::SignResponse,
            27 => MessageType::Extension,
            other => MessageType::Unknown(other),
        }
    }
}

impl From<MessageType> for u8 {
    fn from(value: MessageType) -> Self {
        match value {
            MessageType::Failure => 5,
            MessageType::Success => 6,
            MessageType::RequestIdentities => 11,
            MessageType::IdentitiesAnswer => 12,
            MessageType::SignRequest => 13,
            MessageType::SignResponse => 14,
            MessageType::Extension => 27,
            MessageType::Unknown(other) => other,
        }
    }
}

impl MessageType {
    /// Get the message type name as a string (diagnostics only)
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::RequestIdentities => "SSH_AGENTC_REQUEST_IDENTITIES",
            MessageType::SignRequest => "SSH_AGENTC_SIGN_REQUEST",
            MessageType::Extension => "SSH_AGENTC_EXTENSION",
            MessageType::Failure => "SSH_AGENT_FAILURE",
            MessageType::Success => "SSH_AGENT_SUCCESS",
            MessageType::IdentitiesAnswer => "SSH_AGENT_IDENTITIES_ANSWER",
            MessageType::SignResponse => "SSH_AGENT_SIGN_RESPONSE",
            MessageType::Unknown(_) => "UNKNOWN",
        }
    }
}

/// An SSH key identity from the agent
#[derive(Debug, Clone)]
pub struct Identity {
    /// Raw public key blob
    pub key_blob: Bytes,
    /// Comment associated with the key. Opaque bytes on the wire; not
    /// assumed to be valid UTF-8.
    pub comment: Bytes,
    /// Parsed public key (if parsing succeeded)
    pub public_key: Option<PublicKey>,
}

impl Identity {
    /// Create an identity from key blob and comment
    pub fn new(key_blob: Bytes, comment: Bytes) -> Self {
        let public_key = PublicKey::from_bytes(&key_blob).ok();
        Self {
            key_blob,
            comment,
            public_key,
        }
    }

    /// Lowercase hex MD5 of the raw key blob.
    ///
    /// This is the proxy's internal socket-naming key. It hashes the raw
    /// wire blob and carries no `MD5:` prefix or colon grouping, so it is
    /// not interchangeable with externally published SSH fingerprints.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Md5::new();
        hasher.update(&self.key_blob);
        hex::encode(hasher.finalize())
    }

    /// Comment as a string, with invalid UTF-8 replaced (diagnostics only)
    pub fn comment_lossy(&self) -> String {
        String::from_utf8_lossy(&self.comment).into_owned()
    }

    /// Get the key type as a string
    pub fn key_type(&self) -> Option<String> {
        self.public_key
            .as_ref()
            .map(|k| k.algorithm().as_str().to_string())
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.key_blob == other.key_blob && self.comment == other.comment
    }
}

impl Eq for Identity {}

/// SSH Agent protocol message
#[derive(Debug, Clone)]
pub struct AgentMessage {
    /// Message type
    pub msg_type: MessageType,
    /// Raw message payload (excluding type byte)
    pub payload: Bytes,
}

impl AgentMessage {
    /// Create a new message
    pub fn new(msg_type: MessageType, payload: Bytes) -> Self {
        Self { msg_type, payload }
    }

    /// Create a REQUEST_IDENTITIES request (empty payload)
    pub fn request_identities() -> Self {
        Self {
            msg_type: MessageType::RequestIdentities,
            payload: Bytes::new(),
        }
    }

    /// Parse identities from an IdentitiesAnswer message
    pub fn parse_identities(&self) -> Result<Vec<Identity>> {
        if self.msg_type != MessageType::IdentitiesAnswer {
            return Err(Error::InvalidMessage(format!(
                "Expected IdentitiesAnswer, got {:?}",
                self.msg_type
            )));
        }

        let mut buf = &self.payload[..];
        if buf.remaining() < 4 {
            return Err(Error::Truncated("Message too short".to_string()));
        }

        let count = buf.get_u32();

        // Validate count to prevent excessive memory allocation
        if count > MAX_IDENTITIES {
            return Err(Error::InvalidMessage(format!(
                "Identity count {} exceeds maximum allowed {}",
                count, MAX_IDENTITIES
            )));
        }

        let mut identities = Vec::with_capacity(count as usize);

        for _ in 0..count {
            let key_blob = read_string(&mut buf, "key blob")?;
            let comment = read_string(&mut buf, "comment")?;
            identities.push(Identity::new(key_blob, comment));
        }

        Ok(identities)
    }

    /// Build an IdentitiesAnswer message from a list of identities
    ///
    /// Lengths are always recomputed from the actual byte slices, never
    /// taken from a stored field.
    ///
    /// # Panics
    /// Panics if the number of identities exceeds u32::MAX (practically impossible).
    pub fn build_identities_answer(identities: &[Identity]) -> Self {
        let mut payload = BytesMut::new();
        let count = u32::try_from(identities.len()).expect("identity count exceeds u32::MAX");
        payload.put_u32(count);

        for identity in identities {
            payload.put_u32(identity.key_blob.len() as u32);
            payload.put_slice(&identity.key_blob);
            payload.put_u32(identity.comment.len() as u32);
            payload.put_slice(&identity.comment);
        }

        Self {
            msg_type: MessageType::IdentitiesAnswer,
            payload: payload.freeze(),
        }
    }

    /// Encode the message to bytes (including length prefix)
    ///
    /// The 4-byte prefix is computed from the payload's exact size.
    pub fn encode(&self) -> Bytes {
        let total_len = 1 + self.payload.len();
        let mut buf = BytesMut::with_capacity(4 + total_len);
        buf.put_u32(total_len as u32);
        buf.put_u8(self.msg_type.into());
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Decode a message from bytes (excluding length prefix)
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::InvalidMessage("Empty message".to_string()));
        }

        let msg_type = MessageType::from(data[0]);
        let payload = Bytes::copy_from_slice(&data[1..]);

        Ok(Self { msg_type, payload })
    }
}

/// Read one length-prefixed string (4-byte BE length + bytes) from the buffer
fn read_string(buf: &mut &[u8], what: &str) -> Result<Bytes> {
    if buf.remaining() < 4 {
        return Err(Error::Truncated(format!("{} length missing", what)));
    }
    let len_u32 = buf.get_u32();
    if len_u32 > MAX_BLOB_SIZE {
        return Err(Error::InvalidMessage(format!(
            "{} size {} exceeds maximum allowed {}",
            what, len_u32, MAX_BLOB_SIZE
        )));
    }
    let len = len_u32 as usize;
    if buf.remaining() < len {
        return Err(Error::Truncated(format!("{} truncated", what)));
    }
    let bytes = Bytes::copy_from_slice(&buf[..len]);
    buf.advance(len);
    Ok(bytes)
}
