//! Paper-tape reader controller.
//!
//! The reader peripheral is a lock-step byte pump: the bridge writes one tape
//! byte, the emulator answers with one acknowledgment byte, and only then does
//! the cursor advance and a `reader_position` event go to the browser.
//!
//! One actor task owns the mount state and handles requests in order.  The
//! tape itself lives in a [`TapeState`] shared with the read loop, together
//! with a generation number:
//!
//! - every mount, unmount and session detach bumps the generation and aborts
//!   the running loop (which also drops its connection);
//! - the loop checks its generation under the lock before every step and
//!   publishes positions while still holding it, so a superseded loop cannot
//!   emit a single event after the request that replaced it.
//!
//! A detached session only pauses the tape.  The next session gets the full
//! image and the current cursor (`reader_mounted`) and reading resumes from
//! there.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use pdp1_core::TapeBuffer;

use crate::application::{BridgeError, ReaderControl, SessionBroker};
use crate::domain::messages::BridgeToClientMsg;

enum ReaderCommand {
    Mount(Vec<u8>, oneshot::Sender<()>),
    Unmount(oneshot::Sender<()>),
    SessionAttached(oneshot::Sender<()>),
    SessionDetached(oneshot::Sender<()>),
}

#[derive(Default)]
struct TapeState {
    generation: u64,
    tape: Option<TapeBuffer>,
}

impl TapeState {
    fn snapshot(&self) -> Option<BridgeToClientMsg> {
        self.tape.as_ref().map(|tape| BridgeToClientMsg::ReaderMounted {
            data: tape.data().to_vec(),
            position: tape.cursor(),
        })
    }
}

/// Handle to the reader actor.  Cheap to clone.
#[derive(Clone)]
pub struct ReaderHandle {
    commands: mpsc::Sender<ReaderCommand>,
}

/// Spawns the reader actor for the emulator reader port at `addr`.
pub fn spawn_reader(addr: SocketAddr, broker: Arc<SessionBroker>) -> ReaderHandle {
    let (tx, rx) = mpsc::channel(16);
    let actor = ReaderActor {
        addr,
        broker,
        state: Arc::new(Mutex::new(TapeState::default())),
        read_loop: None,
    };
    tokio::spawn(actor.run(rx));
    ReaderHandle { commands: tx }
}

impl ReaderHandle {
    async fn request(
        &self,
        make: impl FnOnce(oneshot::Sender<()>) -> ReaderCommand,
    ) -> Result<(), BridgeError> {
        let (done_tx, done_rx) = oneshot::channel();
        self.commands
            .send(make(done_tx))
            .await
            .map_err(|_| BridgeError::PeripheralStopped("reader"))?;
        done_rx
            .await
            .map_err(|_| BridgeError::PeripheralStopped("reader"))
    }
}

#[async_trait]
impl ReaderControl for ReaderHandle {
    async fn mount(&self, data: Vec<u8>) -> Result<(), BridgeError> {
        self.request(|done| ReaderCommand::Mount(data, done)).await
    }

    async fn unmount(&self) -> Result<(), BridgeError> {
        self.request(ReaderCommand::Unmount).await
    }

    async fn session_attached(&self) -> Result<(), BridgeError> {
        self.request(ReaderCommand::SessionAttached).await
    }

    async fn session_detached(&self) -> Result<(), BridgeError> {
        self.request(ReaderCommand::SessionDetached).await
    }
}

struct ReaderActor {
    addr: SocketAddr,
    broker: Arc<SessionBroker>,
    state: Arc<Mutex<TapeState>>,
    read_loop: Option<JoinHandle<()>>,
}

impl ReaderActor {
    async fn run(mut self, mut commands: mpsc::Receiver<ReaderCommand>) {
        while let Some(cmd) = commands.recv().await {
            let done = match cmd {
                ReaderCommand::Mount(data, done) => {
                    self.mount(data);
                    done
                }
                ReaderCommand::Unmount(done) => {
                    self.stop_loop();
                    if lock(&self.state).tape.take().is_some() {
                        info!("reader: unmounted");
                    }
                    done
                }
                ReaderCommand::SessionAttached(done) => {
                    self.resume();
                    done
                }
                ReaderCommand::SessionDetached(done) => {
                    self.stop_loop();
                    done
                }
            };
            let _ = done.send(());
        }
        self.stop_loop();
        debug!("reader: actor stopped");
    }

    fn mount(&mut self, data: Vec<u8>) {
        self.stop_loop();
        {
            let mut state = lock(&self.state);
            let tape = TapeBuffer::mount(data);
            info!(
                "reader: mounted {} bytes, starting at {}",
                tape.len(),
                tape.cursor()
            );
            state.tape = Some(tape);
            if let Some(snapshot) = state.snapshot() {
                self.broker.send(snapshot);
            }
        }
        self.start_loop();
    }

    /// Replays the mounted tape to a new session and continues reading.
    fn resume(&mut self) {
        let unread = {
            let state = lock(&self.state);
            let Some(snapshot) = state.snapshot() else {
                return;
            };
            self.broker.send(snapshot);
            state.tape.as_ref().is_some_and(|tape| !tape.is_exhausted())
        };

        let running = self
            .read_loop
            .as_ref()
            .is_some_and(|task| !task.is_finished());
        if unread && !running {
            self.start_loop();
        }
    }

    fn start_loop(&mut self) {
        let generation = lock(&self.state).generation;
        self.read_loop = Some(tokio::spawn(feed_tape(
            self.addr,
            generation,
            Arc::clone(&self.state),
            Arc::clone(&self.broker),
        )));
    }

    fn stop_loop(&mut self) {
        lock(&self.state).generation += 1;
        if let Some(task) = self.read_loop.take() {
            task.abort();
        }
    }
}

/// Feeds the tape to the emulator one acknowledged byte at a time.
///
/// Ends silently when the tape is exhausted, the connection fails, or a newer
/// request has bumped the generation.
async fn feed_tape(
    addr: SocketAddr,
    generation: u64,
    state: Arc<Mutex<TapeState>>,
    broker: Arc<SessionBroker>,
) {
    let mut stream = match TcpStream::connect(addr).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!("reader: could not connect to {addr}: {e}");
            return;
        }
    };
    debug!("reader: connected to {addr}");

    let mut ack = [0u8; 1];
    loop {
        let next = {
            let tape_state = lock(&state);
            if tape_state.generation != generation {
                return;
            }
            match tape_state.tape.as_ref().and_then(TapeBuffer::current) {
                Some(byte) => byte,
                None => {
                    info!("reader: end of tape");
                    return;
                }
            }
        };

        if let Err(e) = stream.write_all(&[next]).await {
            debug!("reader: write failed: {e}");
            return;
        }
        if let Err(e) = stream.read_exact(&mut ack).await {
            debug!("reader: acknowledgment failed: {e}");
            return;
        }

        let mut tape_state = lock(&state);
        if tape_state.generation != generation {
            return;
        }
        let Some(position) = tape_state.tape.as_mut().and_then(TapeBuffer::advance) else {
            return;
        };
        broker.send(BridgeToClientMsg::ReaderPosition { position });
    }
}

fn lock(state: &Mutex<TapeState>) -> MutexGuard<'_, TapeState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
