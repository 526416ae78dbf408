//! # pdp1-core
//!
//! Pure building blocks for the PDP-1 peripheral web bridge.  Nothing in this
//! crate opens a socket or spawns a task, so every rule here can be tested
//! without a network.
//!
//! # Architecture overview (for beginners)
//!
//! The PDP-1 emulator exposes its peripherals (paper-tape reader, punch,
//! typewriter, point-plotting display) as raw TCP byte streams.  The bridge
//! connects to those streams and relays them to one browser session.  This
//! crate holds the parts of that job that are plain data manipulation:
//!
//! - **`domain`** – The mounted paper tape ([`TapeBuffer`]) and the leader
//!   skip that decides where reading starts.
//!
//! - **`protocol`** – The display's 4-byte point-record stream
//!   ([`PointDecoder`]) and the quote-aware tokenizer for the out-of-band
//!   control port ([`ControlCommand`]).

pub mod domain;
pub mod protocol;

pub use domain::tape::{leader_skip, TapeBuffer};
pub use protocol::control::{tokenize, ControlCommand, ControlError};
pub use protocol::points::{decode_points, PointDecoder};
