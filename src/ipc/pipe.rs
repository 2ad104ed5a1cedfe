//! Windows named pipe transport
//!
//! Each accepted client takes the listening pipe instance; a new instance is
//! created immediately so the next client always finds one.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::net::windows::named_pipe::{ClientOptions, NamedPipeClient, NamedPipeServer, ServerOptions};
use tokio::time::sleep;

use crate::constants::ipc::{PIPE_BUSY_RETRIES, PIPE_BUSY_WAIT, PIPE_NAME};

/// ERROR_PIPE_BUSY: every instance is serving another client
const ERROR_PIPE_BUSY: i32 = 231;

/// Accepted daemon-side connection
pub type Stream = NamedPipeServer;

/// Client-side connection
pub type ClientStream = NamedPipeClient;

pub fn default_socket_path() -> Result<PathBuf> {
    Ok(PathBuf::from(PIPE_NAME))
}

pub async fn connect(path: &Path) -> Result<ClientStream> {
    let mut attempts = 0;
    loop {
        match ClientOptions::new().open(path) {
            Ok(client) => return Ok(client),
            Err(e) if e.raw_os_error() == Some(ERROR_PIPE_BUSY) && attempts < PIPE_BUSY_RETRIES => {
                attempts += 1;
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to connect to daemon at {} (is it running?)", path.display())
                });
            }
        }
        sleep(PIPE_BUSY_WAIT).await;
    }
}

/// Server listener for the daemon
pub struct Server {
    pipe: NamedPipeServer,
    name: PathBuf,
}

impl Server {
    /// Create the first pipe instance; fails if another daemon owns the name
    pub fn bind_to(name: PathBuf) -> Result<Self> {
        let pipe = ServerOptions::new()
            .first_pipe_instance(true)
            .create(&name)
            .with_context(|| format!("Failed to create pipe {}", name.display()))?;
        Ok(Self { pipe, name })
    }

    pub async fn accept(&mut self) -> Result<Stream> {
        self.pipe.connect().await.context("Failed to accept IPC connection")?;
        let next = ServerOptions::new()
            .create(&self.name)
            .with_context(|| format!("Failed to create pipe {}", self.name.display()))?;
        Ok(std::mem::replace(&mut self.pipe, next))
    }

    pub fn path(&self) -> &Path {
        &self.name
    }
}
