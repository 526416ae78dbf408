//! Console typewriter link.
//!
//! Output: every byte the emulator types is forwarded as one `char` event.
//! Input: keystrokes from the browser go through a single-slot queue.  A
//! keystroke that does not fit (the previous one is still waiting, typically
//! because the emulator is unreachable) is dropped with a warning, so the
//! session's request loop never waits on the typewriter.

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use super::LinkSession;
use crate::application::{KeyboardInput, SessionBroker};
use crate::domain::messages::BridgeToClientMsg;

/// Creates a typewriter link and the handle used to feed it keystrokes.
pub fn typewriter(broker: Arc<SessionBroker>) -> (TypewriterLink, TypewriterHandle) {
    let (keys_tx, keys_rx) = mpsc::channel(1);
    (
        TypewriterLink {
            broker,
            keys: keys_rx,
            keys_open: true,
        },
        TypewriterHandle { keys: keys_tx },
    )
}

/// Sending side of the keystroke queue.
#[derive(Clone)]
pub struct TypewriterHandle {
    keys: mpsc::Sender<u8>,
}

impl KeyboardInput for TypewriterHandle {
    fn press(&self, value: u8) -> bool {
        match self.keys.try_send(value) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("typewriter: keystroke {value:#04o} dropped; previous key not yet delivered");
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!("typewriter: keystroke {value:#04o} dropped; link stopped");
                false
            }
        }
    }
}

/// Connection side of the typewriter: relays output and delivers keys.
pub struct TypewriterLink {
    broker: Arc<SessionBroker>,
    keys: mpsc::Receiver<u8>,
    keys_open: bool,
}

#[async_trait]
impl LinkSession for TypewriterLink {
    fn name(&self) -> &'static str {
        "typewriter"
    }

    async fn run(&mut self, stream: TcpStream) -> io::Result<()> {
        let (mut reader, mut writer) = stream.into_split();
        let mut buf = [0u8; 256];

        loop {
            tokio::select! {
                read = reader.read(&mut buf) => {
                    let n = read?;
                    if n == 0 {
                        return Ok(());
                    }
                    for &value in &buf[..n] {
                        self.broker.send(BridgeToClientMsg::Char { value });
                    }
                }
                key = self.keys.recv(), if self.keys_open => match key {
                    Some(value) => {
                        debug!("typewriter: key {value:#04o}");
                        writer.write_all(&[value]).await?;
                    }
                    None => self.keys_open = false,
                },
            }
        }
    }
}
