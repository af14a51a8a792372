//! SSH Agent protocol codec for tokio

use crate::error::{Error, Result};
use crate::protocol::message::AgentMessage;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum message size (16MB, same as OpenSSH)
const MAX_MESSAGE_SIZE: u32 = 16 * 1024 * 1024;

/// Codec for reading and writing SSH agent messages
pub struct AgentCodec;

impl AgentCodec {
    /// Read a message from an async reader.
    ///
    /// Returns `Ok(None)` on a clean close, i.e. EOF before the first byte
    /// of the length prefix. EOF in the middle of the prefix or the body
    /// yields `Error::IncompleteFrame`; callers treat that as an ordinary
    /// connection close rather than a reportable failure.
    pub async fn read<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<AgentMessage>> {
        let mut len_buf = [0u8; 4];

        // A clean close only counts at the frame boundary: the first byte
        // of the prefix. Anything after that is an interrupted frame.
        let n = reader.read(&mut len_buf[..1]).await?;
        if n == 0 {
            return Ok(None);
        }
        reader
            .read_exact(&mut len_buf[1..])
            .await
            .map_err(eof_as_incomplete)?;

        let len = u32::from_be_bytes(len_buf);
        if len == 0 {
            return Err(Error::InvalidMessage("Zero-length message".to_string()));
        }
        if len > MAX_MESSAGE_SIZE {
            return Err(Error::InvalidMessage(format!(
                "Message too large: {} bytes",
                len
            )));
        }

        // Read message body
        let mut buf = vec![0u8; len as usize];
        reader
            .read_exact(&mut buf)
            .await
            .map_err(eof_as_incomplete)?;

        let msg = AgentMessage::decode(&buf)?;
        Ok(Some(msg))
    }

    /// Write a message to an async writer
    pub async fn write<W: AsyncWrite + Unpin>(writer: &mut W, msg: &AgentMessage) -> Result<()> {
        let encoded = msg.encode();
        writer.write_all(&encoded).await?;
        writer.flush().await?;
        Ok(())
    }
}

fn eof_as_incomplete(e: std::io::Error) -> Error {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        Error::IncompleteFrame
    } else {
        Error::Io(e)
    }
}
