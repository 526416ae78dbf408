//! Wire-level formats: the display point-record stream and the control-port
//! line protocol.

pub mod control;
pub mod points;

pub use control::{tokenize, ControlCommand, ControlError};
pub use points::{decode_points, PointDecoder, MAX_BATCH_BYTES, MAX_BATCH_RECORDS, RECORD_SIZE};
