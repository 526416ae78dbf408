//! Paper-tape buffer and read cursor.
//!
//! A mounted tape is an immutable byte image plus a cursor pointing at the
//! next byte the reader will hand to the emulator.  The cursor only ever moves
//! forward and never runs past the end of the image.
//!
//! # What is a tape leader? (for beginners)
//!
//! Real paper tapes start with a long run of blank frames (all holes
//! unpunched, i.e. `0x00`) so the operator can thread the tape into the
//! reader.  Feeding hundreds of blank frames to the emulator is pointless, so
//! a freshly mounted tape starts close to the first data frame.  When the
//! leader is long we keep a few blank frames in front of the data, because
//! some loaders expect to see blank tape before the first word.

/// Leader runs longer than this are shortened.
pub const LEADER_KEEP_THRESHOLD: usize = 20;

/// Number of blank frames kept in front of the data when a long leader is
/// skipped.
pub const LEADER_BACKUP: usize = 10;

/// Computes the initial read position for a freshly mounted tape image.
///
/// Counts the leading zero bytes `n`.  When `n` exceeds
/// [`LEADER_KEEP_THRESHOLD`] the cursor is backed up by [`LEADER_BACKUP`],
/// otherwise it lands exactly on the first non-zero byte (or the end of the
/// image for an all-blank tape of at most 20 frames).
///
/// # Examples
///
/// ```rust
/// use pdp1_core::leader_skip;
///
/// assert_eq!(leader_skip(&[0, 0, 0, 7]), 3);
/// assert_eq!(leader_skip(&[0; 30]), 20);
/// assert_eq!(leader_skip(&[1, 2, 3]), 0);
/// ```
pub fn leader_skip(data: &[u8]) -> usize {
    let blank = data.iter().take_while(|&&b| b == 0).count();
    if blank > LEADER_KEEP_THRESHOLD {
        blank - LEADER_BACKUP
    } else {
        blank
    }
}

/// A mounted paper tape: the full image and the index of the next unread byte.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TapeBuffer {
    data: Vec<u8>,
    cursor: usize,
}

impl TapeBuffer {
    /// Mounts `data`, placing the cursor past the tape leader.
    pub fn mount(data: Vec<u8>) -> Self {
        let cursor = leader_skip(&data);
        Self { data, cursor }
    }

    /// The complete tape image as mounted.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Index of the next byte to be read.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Length of the tape image in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` for an empty image.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` once every byte has been read.
    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.data.len()
    }

    /// The byte under the cursor, or `None` at the end of the tape.
    pub fn current(&self) -> Option<u8> {
        self.data.get(self.cursor).copied()
    }

    /// Moves the cursor past the current byte and returns the new position.
    ///
    /// Returns `None` (and leaves the cursor untouched) when the tape is
    /// already exhausted.
    pub fn advance(&mut self) -> Option<usize> {
        if self.is_exhausted() {
            return None;
        }
        self.cursor += 1;
        Some(self.cursor)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
