//! Domain layer for pdp1-web-bridge.
//!
//! The domain layer contains pure types that have no dependencies on I/O,
//! networking, or async runtimes.
//!
//! # What belongs in the domain layer?
//!
//! - Message types (the JSON "language" between browser and bridge)
//! - Configuration structures
//!
//! # What does NOT belong here?
//!
//! - Any `tokio`, `TcpStream`, or `WebSocket` types
//! - File I/O or environment variable reading

pub mod config;
pub mod messages;

pub use config::{BridgeConfig, PeripheralPorts};
pub use messages::{BridgeToClientMsg, ClientToBridgeMsg};
