//! Wire protocol (version 1)
//!
//! Every frame is a 4-byte big-endian length followed by that many bytes of
//! UTF-8 JSON. The JSON object always carries a `version` field so that
//! clients and servers built independently can detect incompatible peers.
//!
//! ```text
//! +----------------+-------------------------------------------------------+
//! | len: u32 (BE)  | {"version":1,"body":"hi","client_timestamp":1700...}  |
//! +----------------+-------------------------------------------------------+
//! ```

use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::domain::ValueObjectError;

/// Protocol version spoken by this build
pub const PROTOCOL_VERSION: u16 = 1;

/// Default upper bound for a single frame payload
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024;

/// A message as it travels on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageFrame {
    pub version: u16,
    pub body: String,
    pub client_timestamp: i64,
    /// Set by the server on outbound frames; ignored when sent by a client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_timestamp: Option<i64>,
    /// Originating connection, set by the server on outbound frames
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<u64>,
}

impl MessageFrame {
    /// Build a client-to-server frame
    pub fn outgoing(body: impl Into<String>, client_timestamp: i64) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            body: body.into(),
            client_timestamp,
            server_timestamp: None,
            sender: None,
        }
    }
}

/// Only the version is looked at before the full decode
#[derive(Deserialize)]
struct VersionProbe {
    version: u16,
}

/// A frame that arrived intact but cannot be turned into a message.
///
/// The connection stays usable; only this frame is dropped.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unsupported protocol version {found} (expected {expected})")]
    UnsupportedVersion { found: u16, expected: u16 },

    #[error("invalid message: {0}")]
    InvalidMessage(#[from] ValueObjectError),
}

/// Errors while reading or writing frames
#[derive(Debug, Error)]
pub enum WireError {
    /// I/O failure on the underlying stream (peer reset, EOF inside a frame, ...)
    #[error("connection lost: {0}")]
    ConnectionLost(#[from] io::Error),

    /// Declared length is above the limit; the stream cannot be resynchronized
    #[error("frame of {len} bytes exceeds the limit of {max} bytes")]
    FrameTooLarge { len: usize, max: usize },

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

impl WireError {
    /// Whether the connection must be torn down after this error
    pub fn is_fatal(&self) -> bool {
        !matches!(self, WireError::Decode(_))
    }
}

/// Read one frame.
///
/// Returns `Ok(None)` when the peer closes the stream cleanly at a frame
/// boundary.
pub async fn read_frame<R>(reader: &mut R, max_len: usize) -> Result<Option<MessageFrame>, WireError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; 4];
    let mut filled = 0;
    while filled < header.len() {
        let n = reader.read(&mut header[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(WireError::ConnectionLost(io::ErrorKind::UnexpectedEof.into()));
        }
        filled += n;
    }

    let len = u32::from_be_bytes(header) as usize;
    if len > max_len {
        return Err(WireError::FrameTooLarge { len, max: max_len });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;

    decode_frame(&payload).map(Some).map_err(WireError::from)
}

/// Decode a frame payload, checking the protocol version first
pub fn decode_frame(payload: &[u8]) -> Result<MessageFrame, DecodeError> {
    let probe: VersionProbe = serde_json::from_slice(payload)?;
    if probe.version != PROTOCOL_VERSION {
        return Err(DecodeError::UnsupportedVersion {
            found: probe.version,
            expected: PROTOCOL_VERSION,
        });
    }
    Ok(serde_json::from_slice(payload)?)
}

/// Encode a frame including its length prefix
pub fn encode_frame(frame: &MessageFrame) -> Result<Vec<u8>, WireError> {
    let payload = serde_json::to_vec(frame).map_err(DecodeError::from)?;
    let len = u32::try_from(payload.len()).map_err(|_| WireError::FrameTooLarge {
        len: payload.len(),
        max: u32::MAX as usize,
    })?;

    let mut encoded = Vec::with_capacity(4 + payload.len());
    encoded.extend_from_slice(&len.to_be_bytes());
    encoded.extend_from_slice(&payload);
    Ok(encoded)
}

/// Write one frame and flush
pub async fn write_frame<W>(writer: &mut W, frame: &MessageFrame) -> Result<(), WireError>
where
    W: AsyncWrite + Unpin,
{
    let encoded = encode_frame(frame)?;
    writer.write_all(&encoded).await?;
    writer.flush().await?;
    Ok(())
}
