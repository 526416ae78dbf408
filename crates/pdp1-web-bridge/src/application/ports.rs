//! Interfaces the application layer drives.
//!
//! The infrastructure layer implements these with the real peripheral tasks;
//! tests implement them with in-memory fakes.

use async_trait::async_trait;

use super::bridge_service::BridgeError;

/// Control surface of the paper-tape reader.
#[async_trait]
pub trait ReaderControl: Send + Sync {
    /// Replaces the mounted tape with `data` and starts feeding it.
    async fn mount(&self, data: Vec<u8>) -> Result<(), BridgeError>;

    /// Stops feeding and forgets the mounted tape.
    async fn unmount(&self) -> Result<(), BridgeError>;

    /// A new live session attached: replay the mounted tape, if any.
    async fn session_attached(&self) -> Result<(), BridgeError>;

    /// The live session went away: stop feeding, keep the tape and cursor.
    async fn session_detached(&self) -> Result<(), BridgeError>;
}

/// Control surface of the point-plotting display link.
#[async_trait]
pub trait DisplayControl: Send + Sync {
    /// Opens (or reopens) the display stream.
    async fn enable(&self) -> Result<(), BridgeError>;

    /// Closes the display stream if it is open.
    async fn disable(&self) -> Result<(), BridgeError>;
}

/// Keystroke input of the console typewriter.
pub trait KeyboardInput: Send + Sync {
    /// Offers one keystroke without waiting.  Returns `false` when it was
    /// dropped.
    fn press(&self, value: u8) -> bool;
}

/// The emulator's line-oriented command interpreter.
#[async_trait]
pub trait CommandInterpreter: Send + Sync {
    /// Sends one command line and returns the reply line.
    async fn execute(&self, cmd: &str) -> Result<String, BridgeError>;
}

/// Output of one assembler run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblyOutput {
    /// Assembler listing text.
    pub listing: String,
    /// RIM-format binary tape image.
    pub rim: Vec<u8>,
    /// Empty on success.
    pub err: String,
}

impl AssemblyOutput {
    /// A failed run: empty artifacts and a non-empty error.
    pub fn failed(err: impl Into<String>) -> Self {
        Self {
            listing: String::new(),
            rim: Vec::new(),
            err: err.into(),
        }
    }
}

/// The external source-to-binary assembler.
#[async_trait]
pub trait Assembler: Send + Sync {
    /// Assembles `source`.  Failures are reported in
    /// [`AssemblyOutput::err`], never as a panic or error return.
    async fn assemble(&self, source: &str) -> AssemblyOutput;
}
