//! Type 30 display link.
//!
//! Unlike punch and typewriter, the display connection is opened and closed
//! on request of the live session (`connect_dpy` / `disconnect_dpy`).  A
//! single actor task owns the connection state and serializes those
//! requests:
//!
//! ```text
//! Enable   → close the open connection (if any), connect, `dpy_connected`,
//!            spawn the stream task
//! Disable  → close the open connection (if any), `dpy_disconnected`
//! stream   → read ≤ 512 bytes, decode into ≤ 128 points, one `points` event;
//!            on read failure `dpy_disconnected` and exit (no reconnect)
//! ```
//!
//! Every connection gets a new epoch number.  The stream task checks the
//! epoch under the same lock the actor uses to retire a connection, so a
//! retired connection never emits another event and exactly one
//! `dpy_disconnected` is sent per connection.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use pdp1_core::protocol::points::{PointDecoder, MAX_BATCH_BYTES};

use crate::application::{BridgeError, DisplayControl, SessionBroker};
use crate::domain::messages::BridgeToClientMsg;

enum DisplayCommand {
    Enable(oneshot::Sender<()>),
    Disable(oneshot::Sender<()>),
}

/// Handle to the display actor.
#[derive(Clone)]
pub struct DisplayHandle {
    commands: mpsc::Sender<DisplayCommand>,
}

/// Spawns the display actor for the emulator display port at `addr`.
pub fn spawn_display(addr: SocketAddr, broker: Arc<SessionBroker>) -> DisplayHandle {
    let (tx, rx) = mpsc::channel(16);
    let actor = DisplayActor {
        addr,
        broker,
        epoch: Arc::new(Mutex::new(0)),
        active: None,
    };
    tokio::spawn(actor.run(rx));
    DisplayHandle { commands: tx }
}

impl DisplayHandle {
    async fn request(&self, make: fn(oneshot::Sender<()>) -> DisplayCommand) -> Result<(), BridgeError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.commands
            .send(make(done_tx))
            .await
            .map_err(|_| BridgeError::PeripheralStopped("display"))?;
        done_rx
            .await
            .map_err(|_| BridgeError::PeripheralStopped("display"))
    }
}

#[async_trait]
impl DisplayControl for DisplayHandle {
    async fn enable(&self) -> Result<(), BridgeError> {
        self.request(DisplayCommand::Enable).await
    }

    async fn disable(&self) -> Result<(), BridgeError> {
        self.request(DisplayCommand::Disable).await
    }
}

struct DisplayActor {
    addr: SocketAddr,
    broker: Arc<SessionBroker>,
    /// Epoch of the live connection.  Bumped whenever one is retired.
    epoch: Arc<Mutex<u64>>,
    active: Option<(u64, JoinHandle<()>)>,
}

impl DisplayActor {
    async fn run(mut self, mut commands: mpsc::Receiver<DisplayCommand>) {
        while let Some(cmd) = commands.recv().await {
            match cmd {
                DisplayCommand::Enable(done) => {
                    self.close();
                    self.open().await;
                    let _ = done.send(());
                }
                DisplayCommand::Disable(done) => {
                    self.close();
                    let _ = done.send(());
                }
            }
        }
        self.close();
        debug!("display: actor stopped");
    }

    async fn open(&mut self) {
        let stream = match TcpStream::connect(self.addr).await {
            Ok(stream) => stream,
            Err(e) => {
                warn!("display: could not connect to {}: {e}", self.addr);
                return;
            }
        };

        let epoch = {
            let mut current = lock(&self.epoch);
            *current += 1;
            *current
        };
        info!("display: connected to {}", self.addr);
        self.broker.send(BridgeToClientMsg::DpyConnected);

        let task = tokio::spawn(stream_points(
            stream,
            epoch,
            Arc::clone(&self.epoch),
            Arc::clone(&self.broker),
        ));
        self.active = Some((epoch, task));
    }

    fn close(&mut self) {
        let Some((epoch, task)) = self.active.take() else {
            return;
        };
        {
            let mut current = lock(&self.epoch);
            if *current == epoch {
                *current += 1;
                info!("display: disconnected");
                self.broker.send(BridgeToClientMsg::DpyDisconnected);
            }
        }
        task.abort();
    }
}

async fn stream_points(
    mut stream: TcpStream,
    epoch: u64,
    current: Arc<Mutex<u64>>,
    broker: Arc<SessionBroker>,
) {
    let mut decoder = PointDecoder::new();
    let mut buf = [0u8; MAX_BATCH_BYTES];

    loop {
        let capacity = decoder.read_capacity();
        let failure = match stream.read(&mut buf[..capacity]).await {
            Ok(0) => "emulator closed the connection".to_string(),
            Ok(n) => {
                let values = decoder.feed(&buf[..n]);
                if values.is_empty() {
                    continue;
                }
                let live = lock(&current);
                if *live != epoch {
                    return;
                }
                broker.send(BridgeToClientMsg::Points { values });
                continue;
            }
            Err(e) => e.to_string(),
        };

        let mut live = lock(&current);
        if *live == epoch {
            *live += 1;
            warn!("display: {failure}");
            broker.send(BridgeToClientMsg::DpyDisconnected);
        }
        return;
    }
}

fn lock(epoch: &Mutex<u64>) -> std::sync::MutexGuard<'_, u64> {
    epoch.lock().unwrap_or_else(PoisonError::into_inner)
}
