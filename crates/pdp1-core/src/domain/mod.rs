//! Domain types with no I/O: the mounted paper tape and its cursor.

pub mod tape;

pub use tape::{leader_skip, TapeBuffer};
