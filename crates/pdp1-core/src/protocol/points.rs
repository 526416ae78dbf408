//! Decoder for the display's binary point-record stream.
//!
//! The display peripheral streams fixed-width records: every record is a
//! 32-bit little-endian word carrying the beam coordinates and intensity of
//! one plotted point.  The bridge does not interpret the words; it only cuts
//! the byte stream into records and forwards them in order.
//!
//! TCP may split a record across two reads, so [`PointDecoder`] keeps the
//! bytes of an incomplete record until the rest arrives.

/// Size of one point record on the wire.
pub const RECORD_SIZE: usize = 4;

/// Maximum number of records forwarded in one batch.
pub const MAX_BATCH_RECORDS: usize = 128;

/// Read buffer size that yields at most [`MAX_BATCH_RECORDS`] records.
pub const MAX_BATCH_BYTES: usize = MAX_BATCH_RECORDS * RECORD_SIZE;

/// Decodes every complete record in `bytes`, ignoring a trailing partial one.
///
/// # Examples
///
/// ```rust
/// use pdp1_core::protocol::points::decode_points;
///
/// assert_eq!(decode_points(&[0x01, 0x02, 0x03, 0x04]), vec![0x0403_0201]);
/// ```
pub fn decode_points(bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(RECORD_SIZE)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Streaming record decoder that carries partial records between reads.
#[derive(Debug, Default)]
pub struct PointDecoder {
    pending: Vec<u8>,
}

impl PointDecoder {
    /// Creates a decoder with no buffered bytes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bytes of an incomplete record held back from the last feed.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// How many bytes the next read may request so that the resulting batch
    /// stays within [`MAX_BATCH_RECORDS`].
    pub fn read_capacity(&self) -> usize {
        MAX_BATCH_BYTES - self.pending.len()
    }

    /// Appends freshly read bytes and returns the records they complete, in
    /// stream order.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<u32> {
        if self.pending.is_empty() {
            let whole = bytes.len() - bytes.len() % RECORD_SIZE;
            self.pending.extend_from_slice(&bytes[whole..]);
            return decode_points(&bytes[..whole]);
        }

        self.pending.extend_from_slice(bytes);
        let whole = self.pending.len() - self.pending.len() % RECORD_SIZE;
        let points = decode_points(&self.pending[..whole]);
        self.pending.drain(..whole);
        points
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_read_yields_exactly_128_points_in_order() {
        // Arrange: 128 records whose values are their own index
        let mut bytes = Vec::with_capacity(MAX_BATCH_BYTES);
        for i in 0..MAX_BATCH_RECORDS as u32 {
            bytes.extend_from_slice(&i.to_le_bytes());
        }
        let mut decoder = PointDecoder::new();

        // Act
        let points = decoder.feed(&bytes);

        // Assert
        assert_eq!(points.len(), 128);
        assert!(points.iter().enumerate().all(|(i, &p)| p == i as u32));
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_records_are_little_endian() {
        let points = decode_points(&[0x78, 0x56, 0x34, 0x12, 0xFF, 0x00, 0x00, 0x80]);
        assert_eq!(points, vec![0x1234_5678, 0x8000_00FF]);
    }

    #[test]
    fn test_partial_record_is_carried_into_next_feed() {
        // Arrange: one record split 3 + 1 across two reads
        let mut decoder = PointDecoder::new();

        // Act
        let first = decoder.feed(&[0xAA, 0xBB, 0xCC]);
        let second = decoder.feed(&[0xDD, 0x01, 0x00]);

        // Assert
        assert!(first.is_empty());
        assert_eq!(decoder.pending_len(), 2);
        assert_eq!(second, vec![0xDDCC_BBAA]);
    }

    #[test]
    fn test_read_capacity_shrinks_by_pending_bytes() {
        let mut decoder = PointDecoder::new();
        assert_eq!(decoder.read_capacity(), 512);

        decoder.feed(&[1, 2]);
        assert_eq!(decoder.read_capacity(), 510);

        // A read of read_capacity() bytes completes exactly 128 records.
        let points = decoder.feed(&vec![0u8; 510]);
        assert_eq!(points.len(), MAX_BATCH_RECORDS);
        assert_eq!(decoder.pending_len(), 0);
    }
}
