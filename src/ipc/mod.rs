//! IPC between CLI clients and the daemon
//!
//! Provides message-based communication using length-prefixed JSON. Unix
//! builds talk over a domain socket, Windows builds over a named pipe.

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::io;
use std::path::Path;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

mod messages;
pub use messages::{Request, Response};

#[cfg(windows)]
mod pipe;
#[cfg(unix)]
mod socket;

#[cfg(windows)]
use pipe as transport;
#[cfg(unix)]
use socket as transport;

pub use transport::{Server, Stream, default_socket_path};

use crate::constants::ipc::MAX_MESSAGE_SIZE;

/// Client connection to the daemon
pub struct Client {
    stream: transport::ClientStream,
}

impl Client {
    pub async fn connect_to(path: &Path) -> Result<Self> {
        let stream = transport::connect(path).await?;
        Ok(Self { stream })
    }

    /// Send request and wait for response
    pub async fn request(&mut self, req: &Request) -> Result<Response> {
        write_message(&mut self.stream, req).await?;
        read_message(&mut self.stream)
            .await?
            .ok_or_else(|| anyhow!("Daemon closed the connection without responding"))
    }
}

/// Write length-prefixed message to stream
pub async fn write_message<W, T>(stream: &mut W, msg: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let json = serde_json::to_vec(msg).context("Failed to serialize message to JSON")?;
    if json.len() > MAX_MESSAGE_SIZE {
        return Err(anyhow!("Message too large: {} bytes (max: {})", json.len(), MAX_MESSAGE_SIZE));
    }

    // Write length prefix (u32 little-endian)
    let len = json.len() as u32;
    stream
        .write_all(&len.to_le_bytes())
        .await
        .context("Failed to write message length")?;
    stream.write_all(&json).await.context("Failed to write message payload")?;
    stream.flush().await.context("Failed to flush stream")?;
    Ok(())
}

/// Read length-prefixed message from stream; `None` when the peer closed cleanly
pub async fn read_message<R, T>(stream: &mut R) -> Result<Option<T>>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut len_buf = [0u8; 4];
    match stream.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e).context("Failed to read message length"),
    }
    let len = u32::from_le_bytes(len_buf) as usize;

    // Sanity check (prevent DoS via huge allocation)
    if len > MAX_MESSAGE_SIZE {
        return Err(anyhow!("Message too large: {} bytes (max: {})", len, MAX_MESSAGE_SIZE));
    }

    let mut json_buf = vec![0u8; len];
    stream
        .read_exact(&mut json_buf)
        .await
        .context("Failed to read message payload")?;

    serde_json::from_slice(&json_buf)
        .map(Some)
        .context("Failed to deserialize message from JSON")
}
