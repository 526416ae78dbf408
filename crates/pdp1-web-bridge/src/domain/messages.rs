//! JSON message types for the browser-facing WebSocket protocol.
//!
//! # Message flow
//!
//! ```text
//! Browser → Bridge:  JSON text frame  →  ClientToBridgeMsg
//! Bridge  → Browser: BridgeToClientMsg →  JSON text frame
//! ```
//!
//! # JSON discriminant
//!
//! Every message is a JSON object with a `"type"` field that identifies the
//! variant.  All other fields are flattened into the same object:
//!
//! ```json
//! {"type":"reader_position","position":1204}
//! {"type":"key","value":65}
//! ```
//!
//! Each kind carries only its own fields, so a punched byte and a typed
//! character are different variants even though both are a single `value`.
//!
//! Byte payloads (tape images and RIM files) travel as standard base64
//! strings, which is what the browser client produces with `btoa()` and
//! consumes with `atob()`.

use serde::{Deserialize, Serialize};

// ── Browser → Bridge messages ─────────────────────────────────────────────────

/// All requests the live browser session can send to the bridge.
///
/// # Serde representation
///
/// ```json
/// {"type":"mount_reader","data":"AAAAgICA"}
/// {"type":"connect_dpy"}
/// {"type":"cmd","cmd":"muldiv ?"}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientToBridgeMsg {
    /// Mount a tape image in the paper-tape reader.
    MountReader {
        /// Raw tape image.
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
    },

    /// Remove the tape from the reader.
    UnmountReader,

    /// Open the display stream.
    ConnectDpy,

    /// Close the display stream.
    DisconnectDpy,

    /// A keystroke for the console typewriter (a FIO-DEC code).
    Key {
        /// The character code to send.
        value: u8,
    },

    /// One line for the emulator command interpreter.
    Cmd {
        /// The command text, without the trailing newline.
        cmd: String,
    },

    /// Assemble MACRO source with the external assembler.
    Assemble {
        /// Assembler source text.
        source: String,
    },
}

impl ClientToBridgeMsg {
    /// Returns the wire name of the message kind.
    ///
    /// Used in debug logs so tape images and source text never end up in the
    /// log output.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientToBridgeMsg::MountReader { .. } => "mount_reader",
            ClientToBridgeMsg::UnmountReader => "unmount_reader",
            ClientToBridgeMsg::ConnectDpy => "connect_dpy",
            ClientToBridgeMsg::DisconnectDpy => "disconnect_dpy",
            ClientToBridgeMsg::Key { .. } => "key",
            ClientToBridgeMsg::Cmd { .. } => "cmd",
            ClientToBridgeMsg::Assemble { .. } => "assemble",
        }
    }
}

// ── Bridge → Browser messages ─────────────────────────────────────────────────

/// All events the bridge sends to the live browser session.
///
/// # Serde representation
///
/// ```json
/// {"type":"reader_mounted","data":"AAAAgICA","position":3}
/// {"type":"points","values":[16909060,84281096]}
/// {"type":"assembly","listing":"...","rim":"...","err":""}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BridgeToClientMsg {
    /// Snapshot of the mounted tape: full image plus read position.
    ///
    /// Sent on every mount and replayed to a newly attached session.
    ReaderMounted {
        #[serde(with = "base64_bytes")]
        data: Vec<u8>,
        position: usize,
    },

    /// The reader consumed another byte; `position` is the next unread index.
    ReaderPosition { position: usize },

    /// The punch emitted one byte.
    PunchData { value: u8 },

    /// One batch of raw display point records, in stream order.
    Points { values: Vec<u32> },

    /// The display stream is open.
    DpyConnected,

    /// The display stream closed (on request or because it failed).
    DpyDisconnected,

    /// The typewriter printed one character.
    Char { value: u8 },

    /// Reply line from the emulator command interpreter.
    Reply { cmd: String },

    /// Result of an assembler run.  `err` is empty on success; on failure
    /// `listing` and `rim` are empty.
    Assembly {
        listing: String,
        #[serde(with = "base64_bytes")]
        rim: Vec<u8>,
        err: String,
    },
}

impl BridgeToClientMsg {
    /// Returns the wire name of the message kind.
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeToClientMsg::ReaderMounted { .. } => "reader_mounted",
            BridgeToClientMsg::ReaderPosition { .. } => "reader_position",
            BridgeToClientMsg::PunchData { .. } => "punch_data",
            BridgeToClientMsg::Points { .. } => "points",
            BridgeToClientMsg::DpyConnected => "dpy_connected",
            BridgeToClientMsg::DpyDisconnected => "dpy_disconnected",
            BridgeToClientMsg::Char { .. } => "char",
            BridgeToClientMsg::Reply { .. } => "reply",
            BridgeToClientMsg::Assembly { .. } => "assembly",
        }
    }
}

/// Serde adapter encoding `Vec<u8>` as a standard base64 string.
mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{de::Error as _, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Go-style clients encode an empty byte slice as `null`.
        let text = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
        STANDARD.decode(text.as_bytes()).map_err(D::Error::custom)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
