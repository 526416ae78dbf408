//! PDP-1 peripheral web bridge — entry point.
//!
//! This binary lets a web page act as the operator console of a running PDP-1
//! emulator.  The browser speaks JSON over WebSocket; the emulator exposes
//! each peripheral as a raw TCP byte stream on its own port.  The bridge
//! pumps tape bytes into the reader, forwards punch, typewriter and display
//! output to the browser, relays console commands, and runs the external
//! assembler.
//!
//! # Usage
//!
//! ```text
//! pdp1-web-bridge [OPTIONS]
//!
//! Options:
//!   --ws-port <PORT>              WebSocket listener port [default: 8080]
//!   --ws-bind <IP>                WebSocket bind address [default: 0.0.0.0]
//!   --emulator-host <HOST>        Host running the emulator [default: 127.0.0.1]
//!   --command-port <PORT>         Command interpreter port [default: 1040]
//!   --typewriter-port <PORT>      Typewriter port [default: 1041]
//!   --reader-port <PORT>          Paper-tape reader port [default: 1042]
//!   --punch-port <PORT>           Paper-tape punch port [default: 1043]
//!   --display-port <PORT>         Display point-record port [default: 3400]
//!   --control-port <PORT>         Control port [default: 1050]
//!   --control-bind <IP>           Control port bind address [default: 127.0.0.1]
//!   --reconnect-backoff <SECS>    Punch/typewriter retry wait [default: 5]
//!   --assembler <PATH>            Assembler executable [default: /usr/local/bin/macro1]
//!   --outbound-queue <N>          Per-session outbound queue size [default: 4096]
//! ```
//!
//! Every option can also be set through a `PDP1_*` environment variable
//! (`--ws-port` ↔ `PDP1_WS_PORT`, and so on).  CLI args take precedence.
//!
//! # Architecture overview
//!
//! ```text
//! Web Browser  (JSON over WebSocket)
//!       ↕
//! pdp1-web-bridge  ← this process
//!   domain/          JSON message types, BridgeConfig
//!   application/     SessionBroker, Bridge dispatcher
//!   infrastructure/  WebSocket server, peripheral links, control port
//!       ↕
//! PDP-1 emulator  (ports 1040-1043, 3400)
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::net::lookup_host;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pdp1_web_bridge::domain::{BridgeConfig, PeripheralPorts};
use pdp1_web_bridge::infrastructure::run_server;

// ── CLI argument definitions ──────────────────────────────────────────────────

/// PDP-1 peripheral web bridge.
#[derive(Debug, Parser)]
#[command(
    name = "pdp1-web-bridge",
    about = "WebSocket bridge between a browser console and the PDP-1 emulator's peripherals",
    version
)]
struct Cli {
    /// TCP port for the WebSocket server to listen on.
    #[arg(long, default_value_t = 8080, env = "PDP1_WS_PORT")]
    ws_port: u16,

    /// IP address to bind the WebSocket server to.
    #[arg(long, default_value = "0.0.0.0", env = "PDP1_WS_BIND")]
    ws_bind: String,

    /// IP address or host name of the machine running the emulator.
    #[arg(long, default_value = "127.0.0.1", env = "PDP1_EMULATOR_HOST")]
    emulator_host: String,

    /// Emulator command interpreter port.
    #[arg(long, default_value_t = 1040, env = "PDP1_COMMAND_PORT")]
    command_port: u16,

    /// Console typewriter port.
    #[arg(long, default_value_t = 1041, env = "PDP1_TYPEWRITER_PORT")]
    typewriter_port: u16,

    /// Paper-tape reader port.
    #[arg(long, default_value_t = 1042, env = "PDP1_READER_PORT")]
    reader_port: u16,

    /// Paper-tape punch port.
    #[arg(long, default_value_t = 1043, env = "PDP1_PUNCH_PORT")]
    punch_port: u16,

    /// Display point-record port.
    #[arg(long, default_value_t = 3400, env = "PDP1_DISPLAY_PORT")]
    display_port: u16,

    /// TCP port of the out-of-band control listener.
    #[arg(long, default_value_t = 1050, env = "PDP1_CONTROL_PORT")]
    control_port: u16,

    /// IP address to bind the control listener to.
    ///
    /// The control port reads files on behalf of whoever connects, so it
    /// defaults to loopback.
    #[arg(long, default_value = "127.0.0.1", env = "PDP1_CONTROL_BIND")]
    control_bind: String,

    /// Seconds to wait between punch/typewriter reconnect attempts.
    #[arg(long, default_value_t = 5, env = "PDP1_RECONNECT_BACKOFF")]
    reconnect_backoff: u64,

    /// Path of the macro1 assembler executable.
    #[arg(long, default_value = "/usr/local/bin/macro1", env = "PDP1_ASSEMBLER")]
    assembler: PathBuf,

    /// Capacity of the live session's outbound event queue.
    #[arg(long, default_value_t = 4096, env = "PDP1_OUTBOUND_QUEUE")]
    outbound_queue: usize,
}

impl Cli {
    /// Converts the parsed CLI arguments into a [`BridgeConfig`].
    ///
    /// A host name given as `--emulator-host` is resolved once, here.
    ///
    /// # Errors
    ///
    /// Returns an error if `--ws-bind` or `--control-bind` is not a valid IP
    /// address, or if `--emulator-host` does not resolve.
    async fn into_bridge_config(self) -> anyhow::Result<BridgeConfig> {
        let ws_bind: IpAddr = self
            .ws_bind
            .parse()
            .with_context(|| format!("invalid WebSocket bind address: '{}'", self.ws_bind))?;
        let control_bind: IpAddr = self
            .control_bind
            .parse()
            .with_context(|| format!("invalid control bind address: '{}'", self.control_bind))?;
        let emulator_host = resolve_host(&self.emulator_host).await?;

        Ok(BridgeConfig {
            ws_bind_addr: SocketAddr::new(ws_bind, self.ws_port),
            control_bind_addr: SocketAddr::new(control_bind, self.control_port),
            emulator_host,
            ports: PeripheralPorts {
                command: self.command_port,
                typewriter: self.typewriter_port,
                reader: self.reader_port,
                punch: self.punch_port,
                display: self.display_port,
            },
            reconnect_backoff: Duration::from_secs(self.reconnect_backoff),
            assembler_path: self.assembler,
            outbound_queue: self.outbound_queue,
        })
    }
}

/// Parses `host` as an IP address, falling back to a name lookup.
async fn resolve_host(host: &str) -> anyhow::Result<IpAddr> {
    if let Ok(ip) = host.parse() {
        return Ok(ip);
    }
    lookup_host((host, 0))
        .await
        .with_context(|| format!("cannot resolve emulator host '{host}'"))?
        .map(|addr| addr.ip())
        .next()
        .with_context(|| format!("emulator host '{host}' has no addresses"))
}

// ── Entry point ───────────────────────────────────────────────────────────────

/// Program entry point.
///
/// # What happens at startup
///
/// 1. `tracing_subscriber` is initialised; `RUST_LOG` selects the level
///    (default `info`).
/// 2. CLI arguments are parsed and turned into a [`BridgeConfig`].
/// 3. A Ctrl+C handler is spawned; it clears the shared `running` flag.
/// 4. [`run_server`] binds the listeners, starts the peripherals and serves
///    browsers until the flag is cleared.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.into_bridge_config().await?;

    info!(
        "PDP-1 web bridge starting — ws={}, control={}, emulator={}",
        config.ws_bind_addr, config.control_bind_addr, config.emulator_host
    );

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl+C — initiating graceful shutdown");
                running_clone.store(false, Ordering::Relaxed);
            }
            Err(e) => {
                tracing::error!("failed to listen for Ctrl+C signal: {e}");
            }
        }
    });

    run_server(config, running).await?;

    info!("PDP-1 web bridge stopped");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
