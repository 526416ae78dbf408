//! Paper-tape punch link.
//!
//! The punch only ever talks: every byte the emulator punches is forwarded
//! to the live session as one `punch_data` event.

use std::io;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tracing::debug;

use super::LinkSession;
use crate::application::SessionBroker;
use crate::domain::messages::BridgeToClientMsg;

/// Forwards punched bytes to the live session.
pub struct PunchLink {
    broker: Arc<SessionBroker>,
}

impl PunchLink {
    pub fn new(broker: Arc<SessionBroker>) -> Self {
        Self { broker }
    }
}

#[async_trait]
impl LinkSession for PunchLink {
    fn name(&self) -> &'static str {
        "punch"
    }

    async fn run(&mut self, mut stream: TcpStream) -> io::Result<()> {
        let mut buf = [0u8; 256];
        loop {
            let n = stream.read(&mut buf).await?;
            if n == 0 {
                return Ok(());
            }
            debug!("punch: {n} bytes");
            for &value in &buf[..n] {
                self.broker.send(BridgeToClientMsg::PunchData { value });
            }
        }
    }
}
