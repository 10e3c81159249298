// (c) 2024 Ross Younger

//! Datagram framing for the raw UDP mechanism
//!
#![allow(clippy::doc_markdown)]
//! # The xfer UDP protocol
//!
//! The `udp` mechanism is a connectionless, best-effort chunk broadcast.
//! A file is split into chunks; each chunk travels in exactly one UDP datagram.
//! There are no acknowledgements, no retransmissions and no congestion control.
//! The receiver must be listening before the sender starts.
//!
//! Every datagram carries a fixed 12-byte header, all fields big-endian:
//!
//! | Offset | Field | Size | Meaning |
//! |---|---|---|---|
//! | 0 | magic | 4 bytes | [`MAGIC`]; datagrams with any other value are ignored |
//! | 4 | sequence | 4 bytes | Zero-based chunk index |
//! | 8 | totalChunks | 4 bytes | Total chunk count for this transfer |
//! | 12 | payload | up to 65536 bytes | Raw file bytes for this chunk |
//!
//! `sequence < totalChunks` holds for every valid datagram, and `totalChunks`
//! is the same across all datagrams of one transfer.
//!
//! ## Chunk size
//!
//! The protocol allows payloads of up to [`MAX_PAYLOAD`] bytes, but the largest UDP payload
//! an IPv4 datagram can carry is 65507 bytes. The sender therefore defaults to
//! [`DEFAULT_CHUNK_SIZE`], the largest payload which fits together with its header.
//! Receivers do not care about the chunk size; they concatenate payloads in sequence order.
//!
//! ## Known limitations
//!
//! * Lost datagrams are never detected. The sender reports success once every datagram has
//!   been handed to the network stack; a receiver missing a chunk waits forever
//!   (unless it was given an idle timeout).
//! * Nothing on the wire distinguishes concurrent transfers. One receiver serves one transfer.

use static_assertions::const_assert;

/// Identifies our datagrams ("XFR").
pub const MAGIC: u32 = 0x0058_4652;

/// Length of the fixed datagram header
pub const HEADER_LEN: usize = 12;

/// Largest payload a single datagram may carry (64 KiB)
pub const MAX_PAYLOAD: usize = 64 * 1024;

/// Largest UDP payload that fits in one IPv4 datagram
pub const MAX_IPV4_UDP_PAYLOAD: usize = 65_507;

/// Default sender chunk size
pub const DEFAULT_CHUNK_SIZE: usize = MAX_IPV4_UDP_PAYLOAD - HEADER_LEN;

const_assert!(HEADER_LEN == 3 * std::mem::size_of::<u32>());
const_assert!(DEFAULT_CHUNK_SIZE <= MAX_PAYLOAD);

/// The fixed header at the start of every datagram (the magic number is implicit)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatagramHeader {
    /// Zero-based chunk index
    pub sequence: u32,
    /// Total number of chunks in this transfer
    pub total_chunks: u32,
}

impl DatagramHeader {
    /// Standard constructor
    #[must_use]
    pub fn new(sequence: u32, total_chunks: u32) -> Self {
        Self {
            sequence,
            total_chunks,
        }
    }

    /// Writes a complete datagram (header, then `payload`) into `buf`, replacing its contents.
    pub fn encode(&self, payload: &[u8], buf: &mut Vec<u8>) {
        debug_assert!(payload.len() <= MAX_PAYLOAD);
        buf.clear();
        buf.reserve(HEADER_LEN + payload.len());
        buf.extend_from_slice(&MAGIC.to_be_bytes());
        buf.extend_from_slice(&self.sequence.to_be_bytes());
        buf.extend_from_slice(&self.total_chunks.to_be_bytes());
        buf.extend_from_slice(payload);
    }

    /// Splits a received datagram into its header and payload.
    ///
    /// Returns `None` if the datagram is too short to hold a header, or does not carry our magic number.
    #[must_use]
    pub fn decode(datagram: &[u8]) -> Option<(Self, &[u8])> {
        let (header, payload) = datagram.split_at_checked(HEADER_LEN)?;
        let word = |offset: usize| -> Option<u32> {
            let bytes: [u8; 4] = header.get(offset..offset + 4)?.try_into().ok()?;
            Some(u32::from_be_bytes(bytes))
        };
        if word(0)? != MAGIC {
            return None;
        }
        Some((Self::new(word(4)?, word(8)?), payload))
    }
}

/// Number of chunks needed to carry `size` bytes: `ceil(size / chunk_size)`.
///
/// An empty file needs no chunks at all.
///
/// # Panics
/// If `chunk_size` is zero.
#[must_use]
pub fn chunk_count(size: u64, chunk_size: usize) -> u64 {
    assert!(chunk_size > 0, "chunk size must be non-zero");
    size.div_ceil(chunk_size as u64)
}

#[cfg(test)]
mod test {
    use super::{chunk_count, DatagramHeader, HEADER_LEN, MAGIC, MAX_PAYLOAD};

    #[test]
    fn header_layout_is_big_endian() {
        let mut buf = Vec::new();
        DatagramHeader::new(0x0102_0304, 0x0a0b_0c0d).encode(b"xyz", &mut buf);
        assert_eq!(
            buf,
            [
                0x00, 0x58, 0x46, 0x52, // magic
                0x01, 0x02, 0x03, 0x04, // sequence
                0x0a, 0x0b, 0x0c, 0x0d, // total
                b'x', b'y', b'z'
            ]
        );
    }

    #[test]
    fn decode_splits_payload() {
        let mut buf = Vec::new();
        DatagramHeader::new(3, 4).encode(&[9u8; 100], &mut buf);
        let (header, payload) = DatagramHeader::decode(&buf).unwrap();
        assert_eq!(header, DatagramHeader::new(3, 4));
        assert_eq!(payload, &[9u8; 100][..]);
    }

    #[test]
    fn encode_reuses_buffer() {
        let mut buf = Vec::new();
        DatagramHeader::new(0, 2).encode(&[1u8; 500], &mut buf);
        DatagramHeader::new(1, 2).encode(&[2u8; 7], &mut buf);
        assert_eq!(buf.len(), HEADER_LEN + 7);
    }

    #[test]
    fn header_only_datagram_has_empty_payload() {
        let mut buf = Vec::new();
        DatagramHeader::new(0, 1).encode(&[], &mut buf);
        let (_, payload) = DatagramHeader::decode(&buf).unwrap();
        assert!(payload.is_empty());
    }

    #[test]
    fn foreign_magic_rejected() {
        let mut buf = Vec::new();
        DatagramHeader::new(0, 1).encode(b"data", &mut buf);
        buf[0] = 0xff;
        assert!(DatagramHeader::decode(&buf).is_none());
    }

    #[test]
    fn truncated_rejected() {
        let short = &MAGIC.to_be_bytes()[..];
        assert!(DatagramHeader::decode(short).is_none());
        assert!(DatagramHeader::decode(&[]).is_none());
    }

    #[test]
    fn chunk_count_edge_cases() {
        assert_eq!(chunk_count(0, MAX_PAYLOAD), 0);
        assert_eq!(chunk_count(1, MAX_PAYLOAD), 1);
        assert_eq!(chunk_count(65_536, MAX_PAYLOAD), 1);
        assert_eq!(chunk_count(65_537, MAX_PAYLOAD), 2);
        assert_eq!(chunk_count(204_800, MAX_PAYLOAD), 4);
    }

    #[test]
    fn chunk_count_is_ceiling() {
        for _ in 0..1000 {
            let size = fastrand::u64(0..1 << 40);
            let n = chunk_count(size, MAX_PAYLOAD);
            let chunk = MAX_PAYLOAD as u64;
            assert!(n * chunk >= size, "{n} chunks too few for {size}");
            assert!(n == 0 || (n - 1) * chunk < size, "{n} chunks too many for {size}");
        }
    }
}
