//! Bridge configuration types.
//!
//! [`BridgeConfig`] is the single source of truth for all runtime settings.
//! It can be constructed from CLI arguments (preferred for production) or from
//! sensible defaults (useful for local development and tests).
//!
//! The emulator exposes every peripheral on its own well-known TCP port on
//! one host, so the config stores the host once plus a [`PeripheralPorts`]
//! table and derives the socket addresses on demand.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// TCP ports the emulator listens on, one per peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeripheralPorts {
    /// Emulator command interpreter (one line in, one line out).
    pub command: u16,
    /// Console typewriter raw bytes (both directions).
    pub typewriter: u16,
    /// Paper-tape reader: one byte out, one acknowledgment byte back.
    pub reader: u16,
    /// Paper-tape punch raw bytes (emulator → bridge).
    pub punch: u16,
    /// Type 30 display point-record stream.
    pub display: u16,
}

impl Default for PeripheralPorts {
    fn default() -> Self {
        Self {
            command: 1040,
            typewriter: 1041,
            reader: 1042,
            punch: 1043,
            display: 3400,
        }
    }
}

/// All runtime configuration for the bridge.
///
/// Build this struct once at startup and wrap it in an `Arc` so it can be
/// shared cheaply across the peripheral tasks.
///
/// # Example
///
/// ```rust
/// use pdp1_web_bridge::domain::BridgeConfig;
///
/// let cfg = BridgeConfig::default();
/// assert_eq!(cfg.ws_bind_addr.port(), 8080);
/// assert_eq!(cfg.reader_addr().port(), 1042);
/// ```
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// The address and port the WebSocket server binds to.
    pub ws_bind_addr: SocketAddr,

    /// The address the out-of-band control port binds to.
    ///
    /// Defaults to loopback: the control port performs file reads on behalf
    /// of whoever connects.
    pub control_bind_addr: SocketAddr,

    /// Host running the emulator's peripheral ports.
    pub emulator_host: IpAddr,

    /// Per-peripheral TCP ports on `emulator_host`.
    pub ports: PeripheralPorts,

    /// Wait between punch/typewriter reconnect attempts.
    pub reconnect_backoff: Duration,

    /// Executable of the external assembler.
    pub assembler_path: PathBuf,

    /// Capacity of the outbound queue of the live session.  Events that do
    /// not fit are dropped.
    pub outbound_queue: usize,
}

impl BridgeConfig {
    /// Address of the emulator command interpreter.
    pub fn command_addr(&self) -> SocketAddr {
        SocketAddr::new(self.emulator_host, self.ports.command)
    }

    /// Address of the typewriter port.
    pub fn typewriter_addr(&self) -> SocketAddr {
        SocketAddr::new(self.emulator_host, self.ports.typewriter)
    }

    /// Address of the paper-tape reader port.
    pub fn reader_addr(&self) -> SocketAddr {
        SocketAddr::new(self.emulator_host, self.ports.reader)
    }

    /// Address of the paper-tape punch port.
    pub fn punch_addr(&self) -> SocketAddr {
        SocketAddr::new(self.emulator_host, self.ports.punch)
    }

    /// Address of the display point-record port.
    pub fn display_addr(&self) -> SocketAddr {
        SocketAddr::new(self.emulator_host, self.ports.display)
    }
}

impl Default for BridgeConfig {
    /// Returns a `BridgeConfig` suitable for running next to a local emulator.
    ///
    /// | Field             | Default                  |
    /// |-------------------|--------------------------|
    /// | ws_bind_addr      | `0.0.0.0:8080`           |
    /// | control_bind_addr | `127.0.0.1:1050`         |
    /// | emulator_host     | `127.0.0.1`              |
    /// | ports             | 1040/1041/1042/1043/3400 |
    /// | reconnect_backoff | 5 seconds                |
    /// | assembler_path    | `/usr/local/bin/macro1`  |
    /// | outbound_queue    | 4096                     |
    fn default() -> Self {
        Self {
            ws_bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8080),
            control_bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 1050),
            emulator_host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            ports: PeripheralPorts::default(),
            reconnect_backoff: Duration::from_secs(5),
            assembler_path: PathBuf::from("/usr/local/bin/macro1"),
            outbound_queue: 4096,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
