//! Length-prefixed framing over byte streams.
//!
//! A frame is an `i32` little-endian payload length followed by exactly that
//! many payload bytes. Declared lengths outside `1..=MAX_FRAME_LEN` are
//! rejected before any payload buffer is allocated.

use crate::protocol::{decode, encode, FormatError, Message};
use crate::MAX_FRAME_LEN;
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const LEN_PREFIX: usize = 4;

/// Failure while reading a frame from a stream.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("protocol violation: {0}")]
    Format(#[from] FormatError),
    #[error("transport error: {0}")]
    Io(#[from] io::Error),
}

fn check_len(declared: i32) -> Result<usize, FormatError> {
    if declared <= 0 || declared as usize > MAX_FRAME_LEN {
        return Err(FormatError::InvalidFrameLength(i64::from(declared)));
    }
    Ok(declared as usize)
}

/// Encodes `message` and prepends the length prefix.
pub fn encode_frame(message: &Message) -> Result<Vec<u8>, FormatError> {
    let payload = encode(message);
    if payload.len() > MAX_FRAME_LEN {
        return Err(FormatError::InvalidFrameLength(payload.len() as i64));
    }

    let mut frame = Vec::with_capacity(LEN_PREFIX + payload.len());
    frame.extend_from_slice(&(payload.len() as i32).to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decodes one complete frame held in memory.
pub fn decode_frame(frame: &[u8]) -> Result<Message, FormatError> {
    if frame.len() < LEN_PREFIX {
        return Err(FormatError::Truncated("frame length"));
    }
    let mut prefix = [0u8; LEN_PREFIX];
    prefix.copy_from_slice(&frame[..LEN_PREFIX]);
    let len = check_len(i32::from_le_bytes(prefix))?;

    let payload = &frame[LEN_PREFIX..];
    if payload.len() < len {
        return Err(FormatError::Truncated("frame payload"));
    }
    if payload.len() > len {
        return Err(FormatError::TrailingBytes(payload.len() - len));
    }
    decode(payload)
}

/// Reads the next frame payload from `reader`.
///
/// Returns `Ok(None)` when the peer closes the stream, whether between
/// frames or part way through one.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; LEN_PREFIX];
    match reader.read_exact(&mut prefix).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = check_len(i32::from_le_bytes(prefix))?;
    let mut payload = vec![0u8; len];
    match reader.read_exact(&mut payload).await {
        Ok(_) => Ok(Some(payload)),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Reads and decodes the next message. `Ok(None)` means end of stream.
pub async fn read_message<R>(reader: &mut R) -> Result<Option<Message>, FrameError>
where
    R: AsyncRead + Unpin,
{
    match read_frame(reader).await? {
        Some(payload) => Ok(Some(decode(&payload)?)),
        None => Ok(None),
    }
}

/// Writes an already-encoded frame.
pub async fn write_frame<W>(writer: &mut W, frame: &[u8]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer.write_all(frame).await?;
    writer.flush().await
}
