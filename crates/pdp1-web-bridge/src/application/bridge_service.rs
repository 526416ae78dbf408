//! Request dispatch and session lifecycle.
//!
//! [`Bridge`] is the one place that knows what each browser request means:
//! it routes requests to the peripherals, relays emulator commands, runs the
//! assembler, and performs the attach/detach bookkeeping around the
//! [`SessionBroker`].
//!
//! # Session lifecycle
//!
//! ```text
//! attach   → display closed if a session is live (its notice goes to that session)
//!          → broker slot swapped (old session evicted)
//!          → mounted tape replayed to the new session, reading resumes
//! detach   → broker slot emptied (only if still current)
//!          → display closed
//!          → tape reading paused; tape and cursor kept for the next session
//! ```
//!
//! Attach and detach run one at a time under a lifecycle lock, so a late
//! detach can never pause the reader or close the display after a newer
//! session has attached.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::application::ports::{
    Assembler, CommandInterpreter, DisplayControl, KeyboardInput, ReaderControl,
};
use crate::application::session_broker::{SessionBroker, SessionId};
use crate::domain::messages::{BridgeToClientMsg, ClientToBridgeMsg};

// ── Error type ────────────────────────────────────────────────────────────────

/// Errors that can occur while handling a browser request.
///
/// None of these end the session; the dispatcher logs them and carries on.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The task owning a peripheral has exited (usually during shutdown).
    #[error("{0} task is not running")]
    PeripheralStopped(&'static str),

    /// The emulator command interpreter could not be reached.
    #[error("command relay failed: {0}")]
    Relay(String),
}

/// The set of peripheral services a [`Bridge`] drives.
pub struct Peripherals {
    pub reader: Arc<dyn ReaderControl>,
    pub display: Arc<dyn DisplayControl>,
    pub keyboard: Arc<dyn KeyboardInput>,
    pub interpreter: Arc<dyn CommandInterpreter>,
    pub assembler: Arc<dyn Assembler>,
}

/// Routes browser requests to peripherals and manages the live session.
pub struct Bridge {
    broker: Arc<SessionBroker>,
    peripherals: Peripherals,
    /// Held for the whole of an attach or detach, peripheral cleanup included.
    lifecycle: Mutex<()>,
}

impl Bridge {
    /// Creates a bridge sending its events through `broker`.
    pub fn new(broker: Arc<SessionBroker>, peripherals: Peripherals) -> Self {
        Self {
            broker,
            peripherals,
            lifecycle: Mutex::new(()),
        }
    }

    /// The broker shared with the peripheral tasks.
    pub fn broker(&self) -> &Arc<SessionBroker> {
        &self.broker
    }

    /// The reader control surface, for the out-of-band control port.
    pub fn reader(&self) -> Arc<dyn ReaderControl> {
        Arc::clone(&self.peripherals.reader)
    }

    /// Makes `outbound` the live session, evicting any previous one.
    pub async fn attach_session(&self, outbound: mpsc::Sender<BridgeToClientMsg>) -> SessionId {
        let _lifecycle = self.lifecycle.lock().await;

        if let Some(live) = self.broker.current() {
            if let Err(e) = self.peripherals.display.disable().await {
                warn!("session {live}: closing display before eviction failed: {e}");
            }
        }
        let (id, _) = self.broker.attach(outbound);

        if let Err(e) = self.peripherals.reader.session_attached().await {
            warn!("session {id}: reader replay failed: {e}");
        }
        id
    }

    /// Ends session `id` after its connection closed.
    ///
    /// A session that was already evicted by a newer one is ignored, so its
    /// late cleanup cannot disturb the new session.
    pub async fn detach_session(&self, id: SessionId) {
        let _lifecycle = self.lifecycle.lock().await;
        if !self.broker.detach(id) {
            return;
        }
        if let Err(e) = self.peripherals.display.disable().await {
            warn!("session {id}: closing display failed: {e}");
        }
        if let Err(e) = self.peripherals.reader.session_detached().await {
            warn!("session {id}: pausing reader failed: {e}");
        }
    }

    /// Handles one request from the live session.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::PeripheralStopped`] if the peripheral that
    /// should handle the request has shut down.
    pub async fn handle(&self, msg: ClientToBridgeMsg) -> Result<(), BridgeError> {
        debug!("handling {}", msg.kind());
        match msg {
            ClientToBridgeMsg::MountReader { data } => {
                info!("mounting reader with {} bytes", data.len());
                self.peripherals.reader.mount(data).await
            }
            ClientToBridgeMsg::UnmountReader => self.peripherals.reader.unmount().await,
            ClientToBridgeMsg::ConnectDpy => self.peripherals.display.enable().await,
            ClientToBridgeMsg::DisconnectDpy => self.peripherals.display.disable().await,
            ClientToBridgeMsg::Key { value } => {
                self.peripherals.keyboard.press(value);
                Ok(())
            }
            ClientToBridgeMsg::Cmd { cmd } => {
                let reply = match self.peripherals.interpreter.execute(&cmd).await {
                    Ok(reply) => reply,
                    Err(e) => {
                        warn!("emulator command {cmd:?} failed: {e}");
                        String::new()
                    }
                };
                self.broker.send(BridgeToClientMsg::Reply { cmd: reply });
                Ok(())
            }
            ClientToBridgeMsg::Assemble { source } => {
                let out = self.peripherals.assembler.assemble(&source).await;
                if !out.err.is_empty() {
                    info!("assembly failed: {}", out.err.lines().next().unwrap_or_default());
                }
                self.broker.send(BridgeToClientMsg::Assembly {
                    listing: out.listing,
                    rim: out.rim,
                    err: out.err,
                });
                Ok(())
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::application::ports::AssemblyOutput;

    /// Records every call made through the peripheral ports.
    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
        relay_fails: bool,
        slow_display_off: bool,
    }

    impl Recorder {
        fn push(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ReaderControl for Recorder {
        async fn mount(&self, data: Vec<u8>) -> Result<(), BridgeError> {
            self.push(format!("mount {}", data.len()));
            Ok(())
        }
        async fn unmount(&self) -> Result<(), BridgeError> {
            self.push("unmount");
            Ok(())
        }
        async fn session_attached(&self) -> Result<(), BridgeError> {
            self.push("reader attached");
            Ok(())
        }
        async fn session_detached(&self) -> Result<(), BridgeError> {
            self.push("reader detached");
            Ok(())
        }
    }

    #[async_trait]
    impl DisplayControl for Recorder {
        async fn enable(&self) -> Result<(), BridgeError> {
            self.push("display on");
            Ok(())
        }
        async fn disable(&self) -> Result<(), BridgeError> {
            if self.slow_display_off {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            self.push("display off");
            Ok(())
        }
    }

    /// Display that announces its closing to whichever session is live.
    struct AnnouncingDisplay {
        broker: Arc<SessionBroker>,
    }

    #[async_trait]
    impl DisplayControl for AnnouncingDisplay {
        async fn enable(&self) -> Result<(), BridgeError> {
            Ok(())
        }
        async fn disable(&self) -> Result<(), BridgeError> {
            self.broker.send(BridgeToClientMsg::DpyDisconnected);
            Ok(())
        }
    }

    impl KeyboardInput for Recorder {
        fn press(&self, value: u8) -> bool {
            self.push(format!("key {value}"));
            true
        }
    }

    #[async_trait]
    impl CommandInterpreter for Recorder {
        async fn execute(&self, cmd: &str) -> Result<String, BridgeError> {
            self.push(format!("cmd {cmd}"));
            if self.relay_fails {
                Err(BridgeError::Relay("connection refused".to_string()))
            } else {
                Ok(format!("ok {cmd}"))
            }
        }
    }

    #[async_trait]
    impl Assembler for Recorder {
        async fn assemble(&self, source: &str) -> AssemblyOutput {
            self.push("assemble");
            if source.contains("error") {
                AssemblyOutput::failed("undefined symbol")
            } else {
                AssemblyOutput {
                    listing: "listing".to_string(),
                    rim: vec![1, 2, 3],
                    err: String::new(),
                }
            }
        }
    }

    fn make_bridge(recorder: Arc<Recorder>) -> Bridge {
        Bridge::new(
            Arc::new(SessionBroker::new()),
            Peripherals {
                reader: recorder.clone(),
                display: recorder.clone(),
                keyboard: recorder.clone(),
                interpreter: recorder.clone(),
                assembler: recorder,
            },
        )
    }

    #[tokio::test]
    async fn test_first_attach_replays_reader_without_touching_display() {
        // Arrange
        let recorder = Arc::new(Recorder::default());
        let bridge = make_bridge(recorder.clone());
        let (tx, _rx) = mpsc::channel(4);

        // Act
        bridge.attach_session(tx).await;

        // Assert
        assert_eq!(recorder.calls(), vec!["reader attached"]);
    }

    #[tokio::test]
    async fn test_second_attach_closes_display_of_evicted_session() {
        let recorder = Arc::new(Recorder::default());
        let bridge = make_bridge(recorder.clone());
        let (tx1, _rx1) = mpsc::channel(4);
        let (tx2, _rx2) = mpsc::channel(4);

        bridge.attach_session(tx1).await;
        bridge.attach_session(tx2).await;

        assert_eq!(
            recorder.calls(),
            vec!["reader attached", "display off", "reader attached"]
        );
    }

    #[tokio::test]
    async fn test_detach_of_evicted_session_does_no_cleanup() {
        // Arrange
        let recorder = Arc::new(Recorder::default());
        let bridge = make_bridge(recorder.clone());
        let (tx1, _rx1) = mpsc::channel(4);
        let (tx2, _rx2) = mpsc::channel(4);
        let old = bridge.attach_session(tx1).await;
        let current = bridge.attach_session(tx2).await;
        let before = recorder.calls().len();

        // Act: the evicted session's connection closes late
        bridge.detach_session(old).await;

        // Assert
        assert_eq!(recorder.calls().len(), before);
        assert_eq!(bridge.broker().current(), Some(current));
    }

    #[tokio::test]
    async fn test_detach_closes_display_and_pauses_reader() {
        let recorder = Arc::new(Recorder::default());
        let bridge = make_bridge(recorder.clone());
        let (tx, _rx) = mpsc::channel(4);
        let id = bridge.attach_session(tx).await;

        bridge.detach_session(id).await;

        assert_eq!(
            recorder.calls(),
            vec!["reader attached", "display off", "reader detached"]
        );
        assert_eq!(bridge.broker().current(), None);
    }

    #[tokio::test]
    async fn test_attach_during_slow_detach_leaves_new_session_running() {
        // Arrange: closing the display takes a while
        let recorder = Arc::new(Recorder {
            slow_display_off: true,
            ..Recorder::default()
        });
        let bridge = Arc::new(make_bridge(recorder.clone()));
        let (tx1, _rx1) = mpsc::channel(4);
        let (tx2, _rx2) = mpsc::channel(4);
        let old = bridge.attach_session(tx1).await;

        // Act: the browser reloads; the new session arrives mid-detach
        let detaching = tokio::spawn({
            let bridge = Arc::clone(&bridge);
            async move { bridge.detach_session(old).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        let current = bridge.attach_session(tx2).await;
        detaching.await.unwrap();

        // Assert: the reader was resumed after the old session was paused
        assert_eq!(
            recorder.calls(),
            vec![
                "reader attached",
                "display off",
                "reader detached",
                "reader attached"
            ]
        );
        assert_eq!(bridge.broker().current(), Some(current));
    }

    #[tokio::test]
    async fn test_evicted_session_gets_display_notice_not_new_session() {
        // Arrange
        let recorder = Arc::new(Recorder::default());
        let broker = Arc::new(SessionBroker::new());
        let bridge = Bridge::new(
            Arc::clone(&broker),
            Peripherals {
                reader: recorder.clone(),
                display: Arc::new(AnnouncingDisplay {
                    broker: Arc::clone(&broker),
                }),
                keyboard: recorder.clone(),
                interpreter: recorder.clone(),
                assembler: recorder,
            },
        );
        let (tx1, mut rx1) = mpsc::channel(4);
        let (tx2, mut rx2) = mpsc::channel(4);
        bridge.attach_session(tx1).await;

        // Act
        bridge.attach_session(tx2).await;

        // Assert
        assert_eq!(rx1.recv().await, Some(BridgeToClientMsg::DpyDisconnected));
        assert_eq!(rx1.recv().await, None);
        assert!(rx2.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_peripheral_requests_are_routed() {
        // Arrange
        let recorder = Arc::new(Recorder::default());
        let bridge = make_bridge(recorder.clone());

        // Act
        for msg in [
            ClientToBridgeMsg::MountReader { data: vec![0; 12] },
            ClientToBridgeMsg::ConnectDpy,
            ClientToBridgeMsg::Key { value: 0o61 },
            ClientToBridgeMsg::DisconnectDpy,
            ClientToBridgeMsg::UnmountReader,
        ] {
            bridge.handle(msg).await.unwrap();
        }

        // Assert
        assert_eq!(
            recorder.calls(),
            vec!["mount 12", "display on", "key 49", "display off", "unmount"]
        );
    }

    #[tokio::test]
    async fn test_cmd_reply_is_sent_to_session() {
        // Arrange
        let recorder = Arc::new(Recorder::default());
        let bridge = make_bridge(recorder);
        let (tx, mut rx) = mpsc::channel(4);
        bridge.attach_session(tx).await;

        // Act
        bridge
            .handle(ClientToBridgeMsg::Cmd {
                cmd: "muldiv ?".to_string(),
            })
            .await
            .unwrap();

        // Assert
        assert_eq!(
            rx.recv().await.unwrap(),
            BridgeToClientMsg::Reply {
                cmd: "ok muldiv ?".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_failed_relay_sends_empty_reply() {
        let recorder = Arc::new(Recorder {
            relay_fails: true,
            ..Recorder::default()
        });
        let bridge = make_bridge(recorder);
        let (tx, mut rx) = mpsc::channel(4);
        bridge.attach_session(tx).await;

        bridge
            .handle(ClientToBridgeMsg::Cmd {
                cmd: "r".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(
            rx.recv().await.unwrap(),
            BridgeToClientMsg::Reply { cmd: String::new() }
        );
    }

    #[tokio::test]
    async fn test_assembly_result_is_sent_to_session() {
        let recorder = Arc::new(Recorder::default());
        let bridge = make_bridge(recorder);
        let (tx, mut rx) = mpsc::channel(4);
        bridge.attach_session(tx).await;

        bridge
            .handle(ClientToBridgeMsg::Assemble {
                source: "error here".to_string(),
            })
            .await
            .unwrap();
        bridge
            .handle(ClientToBridgeMsg::Assemble {
                source: "start 4".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(
            rx.recv().await.unwrap(),
            BridgeToClientMsg::Assembly {
                listing: String::new(),
                rim: Vec::new(),
                err: "undefined symbol".to_string()
            }
        );
        assert_eq!(
            rx.recv().await.unwrap(),
            BridgeToClientMsg::Assembly {
                listing: "listing".to_string(),
                rim: vec![1, 2, 3],
                err: String::new()
            }
        );
    }
}
