//! pdp1-web-bridge library crate.
//!
//! Connects one browser session (JSON over WebSocket) to the peripheral
//! ports of a running PDP-1 emulator: paper-tape reader and punch, console
//! typewriter, Type 30 display, and the emulator command interpreter.  It
//! also runs the external assembler on request and accepts tape mounts on a
//! plain-text control port.
//!
//! # Architecture (clean architecture)
//!
//! ```text
//! Browser (JSON over WebSocket)          operator (text lines)
//!         ↕                                     ↓
//! [pdp1-web-bridge]
//!   ├── domain/           Pure types: JSON message enums, BridgeConfig
//!   ├── application/      SessionBroker, Bridge dispatcher, peripheral ports
//!   └── infrastructure/
//!         ├── ws_server/      WebSocket accept loop (tokio-tungstenite)
//!         ├── reader/         tape reader actor and lock-step read loop
//!         ├── peripheral/     punch, typewriter, display links
//!         ├── control_server/ out-of-band control port
//!         ├── command_relay/  emulator command interpreter client
//!         └── assembler/      external macro1 runs
//!         ↕
//! PDP-1 emulator (raw TCP, one port per peripheral)
//! ```
//!
//! # Layer rules
//!
//! - `domain` has no I/O and no async.
//! - `application` depends on `domain` and talks to peripherals only through
//!   the traits in `application::ports`.
//! - `infrastructure` depends on all other layers plus `tokio` and `tungstenite`.

/// Domain layer: pure business-logic types (no I/O).
pub mod domain;

/// Application layer: session ownership and request dispatch.
pub mod application;

/// Infrastructure layer: sockets, peripheral tasks and external processes.
pub mod infrastructure;
