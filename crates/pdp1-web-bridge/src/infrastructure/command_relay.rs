//! Relay to the emulator's command interpreter.
//!
//! Every command gets a fresh TCP connection: write the command and a
//! newline, read one reply line (or everything up to the remote close),
//! trim it, and hang up.  There is no retry.

use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

use crate::application::{BridgeError, CommandInterpreter};

/// Errors from a single relayed command.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("could not connect to command port {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("failed to send command: {0}")]
    Send(#[source] io::Error),

    #[error("failed to read reply: {0}")]
    Receive(#[source] io::Error),
}

/// Client of the emulator command interpreter at a fixed address.
#[derive(Debug, Clone)]
pub struct CommandRelay {
    addr: SocketAddr,
}

impl CommandRelay {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }

    /// Sends `cmd` and returns the trimmed reply line.
    ///
    /// # Errors
    ///
    /// Returns a [`RelayError`] if the interpreter cannot be reached or the
    /// connection fails before a reply is read.
    pub async fn relay(&self, cmd: &str) -> Result<String, RelayError> {
        let stream = TcpStream::connect(self.addr)
            .await
            .map_err(|source| RelayError::Connect {
                addr: self.addr,
                source,
            })?;
        let (read_half, mut write_half) = stream.into_split();

        let mut line = Vec::with_capacity(cmd.len() + 1);
        line.extend_from_slice(cmd.as_bytes());
        line.push(b'\n');
        write_half.write_all(&line).await.map_err(RelayError::Send)?;

        let mut reply = String::new();
        BufReader::new(read_half)
            .read_line(&mut reply)
            .await
            .map_err(RelayError::Receive)?;

        let reply = reply.trim().to_string();
        debug!("command {cmd:?} -> {reply:?}");
        Ok(reply)
    }
}

#[async_trait]
impl CommandInterpreter for CommandRelay {
    async fn execute(&self, cmd: &str) -> Result<String, BridgeError> {
        self.relay(cmd)
            .await
            .map_err(|e| BridgeError::Relay(e.to_string()))
    }
}
