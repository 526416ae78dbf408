//! WebSocket server: startup, accept loop and per-session task management.
//!
//! This module is responsible for:
//!
//! 1. Binding the WebSocket and control-port listeners (the only fatal
//!    failures of the bridge).
//! 2. Starting the peripheral tasks (reader, punch, typewriter, display)
//!    that live for the whole process.
//! 3. Accepting browser connections and upgrading them to WebSocket
//!    sessions.  The newest session always wins: attaching it evicts the
//!    previous one.
//! 4. Running two concurrent halves per session:
//!    - **Writer**: drains the session's outbound queue, one JSON text frame
//!      per event.  It is the only task that ever writes to the socket.
//!    - **Reader**: parses JSON requests and hands them to the [`Bridge`].
//! 5. Gracefully shutting down when the `running` flag is cleared.

use std::net::SocketAddr;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::{
    accept_async,
    tungstenite::{Error as WsError, Message as WsMessage},
};
use tracing::{debug, error, info, warn};

use crate::application::{Bridge, Peripherals, SessionBroker};
use crate::domain::config::BridgeConfig;
use crate::domain::messages::ClientToBridgeMsg;
use crate::infrastructure::assembler::MacroAssembler;
use crate::infrastructure::command_relay::CommandRelay;
use crate::infrastructure::control_server::run_control_server;
use crate::infrastructure::peripheral::{
    run_reconnecting, spawn_display, typewriter, PunchLink,
};
use crate::infrastructure::reader::spawn_reader;

// ── Public API ────────────────────────────────────────────────────────────────

/// Runs the bridge until `running` is set to `false`.
///
/// Binds both listeners first, then starts the peripherals, the control
/// port and the WebSocket accept loop.
///
/// # Errors
///
/// Returns an error if either listener cannot be bound (e.g., the port is
/// already in use or the process lacks permission to bind).
pub async fn run_server(config: BridgeConfig, running: Arc<AtomicBool>) -> anyhow::Result<()> {
    let ws_listener = TcpListener::bind(config.ws_bind_addr)
        .await
        .with_context(|| {
            format!(
                "failed to bind WebSocket listener on {}",
                config.ws_bind_addr
            )
        })?;
    let control_listener = TcpListener::bind(config.control_bind_addr)
        .await
        .with_context(|| {
            format!(
                "failed to bind control listener on {}",
                config.control_bind_addr
            )
        })?;

    info!("WebSocket bridge listening on {}", config.ws_bind_addr);
    info!("control port listening on {}", config.control_bind_addr);

    let bridge = start_bridge(&config, &running);
    tokio::spawn(run_control_server(
        control_listener,
        bridge.reader(),
        Arc::clone(&running),
    ));

    serve_websocket(ws_listener, bridge, config.outbound_queue, running).await;
    Ok(())
}

/// Starts the long-lived peripheral tasks and returns the bridge that
/// drives them.
///
/// Punch and typewriter connect right away and keep reconnecting; the
/// reader and display only connect when asked to.
pub fn start_bridge(config: &BridgeConfig, running: &Arc<AtomicBool>) -> Arc<Bridge> {
    let broker = Arc::new(SessionBroker::new());

    tokio::spawn(run_reconnecting(
        PunchLink::new(Arc::clone(&broker)),
        config.punch_addr(),
        config.reconnect_backoff,
        Arc::clone(running),
    ));

    let (typewriter_link, keyboard) = typewriter(Arc::clone(&broker));
    tokio::spawn(run_reconnecting(
        typewriter_link,
        config.typewriter_addr(),
        config.reconnect_backoff,
        Arc::clone(running),
    ));

    let peripherals = Peripherals {
        reader: Arc::new(spawn_reader(config.reader_addr(), Arc::clone(&broker))),
        display: Arc::new(spawn_display(config.display_addr(), Arc::clone(&broker))),
        keyboard: Arc::new(keyboard),
        interpreter: Arc::new(CommandRelay::new(config.command_addr())),
        assembler: Arc::new(MacroAssembler::new(config.assembler_path.clone())),
    };

    Arc::new(Bridge::new(broker, peripherals))
}

/// Accepts browser connections on `listener` until `running` is cleared.
///
/// Each connection runs in its own task; `outbound_queue` is the capacity
/// of its outbound event queue.
pub async fn serve_websocket(
    listener: TcpListener,
    bridge: Arc<Bridge>,
    outbound_queue: usize,
    running: Arc<AtomicBool>,
) {
    loop {
        if !running.load(Ordering::Relaxed) {
            info!("shutdown flag set; stopping accept loop");
            break;
        }

        // Short timeout so the shutdown flag is noticed while idle.
        match timeout(Duration::from_millis(200), listener.accept()).await {
            Ok(Ok((stream, peer_addr))) => {
                info!("new browser connection from {peer_addr}");
                let bridge = Arc::clone(&bridge);
                tokio::spawn(async move {
                    handle_browser_session(stream, peer_addr, bridge, outbound_queue).await;
                });
            }
            Ok(Err(e)) => {
                error!("accept error: {e}");
            }
            Err(_) => {}
        }
    }
}

// ── Per-session handler ───────────────────────────────────────────────────────

/// Wraps [`run_session`] and logs the outcome.
async fn handle_browser_session(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    bridge: Arc<Bridge>,
    outbound_queue: usize,
) {
    match run_session(raw_stream, peer_addr, bridge, outbound_queue).await {
        Ok(()) => info!("connection {peer_addr} closed normally"),
        Err(e) => warn!("connection {peer_addr} closed with error: {e:#}"),
    }
}

/// Runs the complete lifecycle of a single browser WebSocket session.
///
/// # Errors
///
/// Returns an error if the WebSocket handshake fails.
async fn run_session(
    raw_stream: TcpStream,
    peer_addr: SocketAddr,
    bridge: Arc<Bridge>,
    outbound_queue: usize,
) -> anyhow::Result<()> {
    let ws_stream = accept_async(raw_stream)
        .await
        .with_context(|| format!("WebSocket handshake failed with {peer_addr}"))?;

    let (mut ws_tx, mut ws_rx) = ws_stream.split();
    let (out_tx, mut out_rx) = mpsc::channel(outbound_queue.max(1));
    let session_id = bridge.attach_session(out_tx).await;
    info!("session {session_id}: established with {peer_addr}");

    // ── Writer ─────────────────────────────────────────────────────────────────
    //
    // The queue closes when the broker drops its sender: either a newer
    // session evicted this one, or this session detached.
    let mut writer = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(json) => json,
                Err(e) => {
                    error!("session {session_id}: JSON serialization error: {e}");
                    continue;
                }
            };
            if ws_tx.send(WsMessage::Text(json)).await.is_err() {
                debug!("session {session_id}: WebSocket send failed (browser disconnected)");
                return;
            }
        }
        debug!("session {session_id}: outbound queue closed; closing WebSocket");
        let _ = ws_tx.close().await;
    });

    // ── Reader ─────────────────────────────────────────────────────────────────
    let requests = async {
        while let Some(frame) = ws_rx.next().await {
            let text = match frame {
                Ok(WsMessage::Text(text)) => text,
                Ok(WsMessage::Close(_)) => {
                    debug!("session {session_id}: WebSocket Close frame received");
                    break;
                }
                Ok(WsMessage::Binary(_)) => {
                    warn!("session {session_id}: unexpected binary WebSocket frame (ignored)");
                    continue;
                }
                Ok(_) => continue,
                Err(WsError::ConnectionClosed | WsError::Protocol(_)) => {
                    debug!("session {session_id}: browser WebSocket closed");
                    break;
                }
                Err(e) => {
                    warn!("session {session_id}: browser WebSocket error: {e}");
                    break;
                }
            };

            let request: ClientToBridgeMsg = match serde_json::from_str(&text) {
                Ok(request) => request,
                Err(e) => {
                    warn!("session {session_id}: invalid JSON from browser: {e}");
                    continue;
                }
            };
            if let Err(e) = bridge.handle(request).await {
                warn!("session {session_id}: {e}");
            }
        }
    };

    tokio::select! {
        _ = &mut writer => {
            debug!("session {session_id}: writer ended");
        }
        _ = requests => {
            debug!("session {session_id}: browser stream ended");
        }
    }
    writer.abort();

    bridge.detach_session(session_id).await;
    Ok(())
}
