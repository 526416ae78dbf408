//! Application layer for pdp1-web-bridge.
//!
//! The application layer knows *what* to do with each browser request and
//! each peripheral event, but delegates *how* to the infrastructure layer
//! through the traits in [`ports`].
//!
//! # Responsibilities
//!
//! - Owning the single live session slot ([`SessionBroker`])
//! - Dispatching browser requests and running attach/detach cleanup ([`Bridge`])
//! - Defining the `BridgeError` type for request-level failures
//!
//! # What does NOT belong here?
//!
//! - Opening sockets or listening for connections (that is infrastructure)
//! - WebSocket framing (handled by tokio-tungstenite)

pub mod bridge_service;
pub mod ports;
pub mod session_broker;

pub use bridge_service::{Bridge, BridgeError, Peripherals};
pub use ports::{
    Assembler, AssemblyOutput, CommandInterpreter, DisplayControl, KeyboardInput, ReaderControl,
};
pub use session_broker::{SessionBroker, SessionId};
