//! Infrastructure layer for pdp1-web-bridge.
//!
//! The infrastructure layer handles all I/O: the browser WebSocket, the
//! emulator's peripheral ports, the command interpreter, the external
//! assembler and the out-of-band control port.
//!
//! # Responsibilities
//!
//! - Binding the WebSocket and control listeners
//! - Performing the WebSocket HTTP upgrade handshake
//! - Owning one task per peripheral connection, with its reconnect policy
//! - Spawning per-session Tokio tasks
//! - Handling the graceful shutdown signal
//!
//! # What does NOT belong here?
//!
//! - Request dispatch and session bookkeeping (that is the application layer)
//! - Message type definitions (that is the domain layer)
//! - Configuration parsing (that is done in `main.rs`)

pub mod assembler;
pub mod command_relay;
pub mod control_server;
pub mod peripheral;
pub mod reader;
pub mod ws_server;

// Re-export the primary entry points so `main.rs` can call them concisely.
pub use ws_server::{run_server, serve_websocket, start_bridge};
