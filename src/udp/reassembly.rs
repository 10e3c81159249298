//! Receiver-side chunk bookkeeping
// (c) 2024 Ross Younger

use std::collections::BTreeMap;

use tokio::io::{AsyncWrite, AsyncWriteExt as _};
use tracing::{trace, warn};

use crate::protocol::DatagramHeader;

/// Collects chunk payloads, keyed by sequence number, until the transfer is complete.
///
/// A duplicate sequence number silently replaces the payload held for it.
/// Because chunks are keyed and written out in sequence order, the result does not
/// depend on the order in which datagrams arrived.
#[derive(Debug, Default)]
pub struct ReassemblyBuffer {
    chunks: BTreeMap<u32, Vec<u8>>,
    total: Option<u32>,
    bytes: u64,
}

impl ReassemblyBuffer {
    /// Constructor
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Considers one received datagram. Returns true if it filled a sequence number not seen before.
    ///
    /// Datagrams which are too short, carry a foreign magic number, claim zero chunks,
    /// or have a sequence number outside the advertised total are ignored.
    pub fn accept(&mut self, datagram: &[u8]) -> bool {
        let Some((header, payload)) = DatagramHeader::decode(datagram) else {
            trace!("ignoring {} byte datagram without our header", datagram.len());
            return false;
        };
        if header.total_chunks == 0 || header.sequence >= header.total_chunks {
            trace!(
                "ignoring chunk {} of claimed total {}",
                header.sequence,
                header.total_chunks
            );
            return false;
        }
        match self.total {
            Some(t) if t != header.total_chunks => {
                warn!(
                    "chunk total changed mid-transfer from {t} to {}; using the latest",
                    header.total_chunks
                );
                let dropped = self.chunks.split_off(&header.total_chunks);
                self.bytes -= dropped.values().map(|c| c.len() as u64).sum::<u64>();
                self.total = Some(header.total_chunks);
            }
            Some(_) => (),
            None => self.total = Some(header.total_chunks),
        }
        self.bytes += payload.len() as u64;
        match self.chunks.insert(header.sequence, payload.to_vec()) {
            Some(previous) => {
                trace!("duplicate chunk {}", header.sequence);
                self.bytes -= previous.len() as u64;
                false
            }
            None => true,
        }
    }

    /// The advertised chunk total, once any valid datagram has arrived
    #[must_use]
    pub fn total(&self) -> Option<u32> {
        self.total
    }

    /// Number of distinct chunks held
    #[must_use]
    pub fn received(&self) -> usize {
        self.chunks.len()
    }

    /// Payload bytes held
    #[must_use]
    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    /// True once every chunk `0..total` is present
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.total
            .is_some_and(|t| u64::try_from(self.chunks.len()).is_ok_and(|n| n == u64::from(t)))
    }

    /// Writes all chunks, in sequence order, to `out`. Returns the number of bytes written.
    pub async fn write_to<W>(self, out: &mut W) -> anyhow::Result<u64>
    where
        W: AsyncWrite + Unpin,
    {
        let mut written = 0u64;
        for chunk in self.chunks.into_values() {
            out.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        out.flush().await?;
        Ok(written)
    }
}

#[cfg(test)]
mod test {
    use super::ReassemblyBuffer;
    use crate::protocol::DatagramHeader;

    fn datagram(seq: u32, total: u32, payload: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        DatagramHeader::new(seq, total).encode(payload, &mut buf);
        buf
    }

    fn chunks_of(data: &[u8], size: usize) -> Vec<Vec<u8>> {
        let total = u32::try_from(data.chunks(size).len()).unwrap();
        data.chunks(size)
            .enumerate()
            .map(|(i, c)| datagram(u32::try_from(i).unwrap(), total, c))
            .collect()
    }

    async fn drain(buf: ReassemblyBuffer) -> Vec<u8> {
        let mut out = Vec::new();
        let _ = buf.write_to(&mut out).await.unwrap();
        out
    }

    #[tokio::test]
    async fn in_order() {
        let data: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        let mut buf = ReassemblyBuffer::new();
        for d in chunks_of(&data, 1000) {
            assert!(buf.accept(&d));
        }
        assert!(buf.is_complete());
        assert_eq!(buf.bytes(), 10_000);
        assert_eq!(drain(buf).await, data);
    }

    #[tokio::test]
    async fn arrival_order_and_duplicates_do_not_matter() {
        let data: Vec<u8> = std::iter::repeat_with(|| fastrand::u8(..))
            .take(50_000)
            .collect();
        let datagrams = chunks_of(&data, 777);
        for _ in 0..20 {
            let mut shuffled = datagrams.clone();
            // sprinkle in some duplicates
            for _ in 0..10 {
                shuffled.push(datagrams[fastrand::usize(..datagrams.len())].clone());
            }
            fastrand::shuffle(&mut shuffled);
            let mut buf = ReassemblyBuffer::new();
            for d in &shuffled {
                let _ = buf.accept(d);
            }
            assert!(buf.is_complete());
            assert_eq!(buf.received(), datagrams.len());
            assert_eq!(drain(buf).await, data);
        }
    }

    #[tokio::test]
    async fn duplicate_replaces() {
        let mut buf = ReassemblyBuffer::new();
        assert!(buf.accept(&datagram(0, 1, b"first")));
        assert!(!buf.accept(&datagram(0, 1, b"again")));
        assert_eq!(buf.received(), 1);
        assert_eq!(buf.bytes(), 5);
        assert_eq!(drain(buf).await, b"again");
    }

    #[test]
    fn junk_ignored() {
        let mut buf = ReassemblyBuffer::new();
        assert!(!buf.accept(b"short"));
        assert!(!buf.accept(&[0u8; 64]));
        assert!(!buf.accept(&datagram(5, 5, b"x")));
        assert!(!buf.accept(&datagram(0, 0, b"x")));
        assert!(buf.total().is_none());
        assert!(!buf.is_complete());
    }

    #[test]
    fn incomplete_until_last_chunk() {
        let mut buf = ReassemblyBuffer::new();
        assert!(buf.accept(&datagram(2, 3, b"c")));
        assert!(buf.accept(&datagram(0, 3, b"a")));
        assert!(!buf.is_complete());
        assert!(buf.accept(&datagram(1, 3, b"b")));
        assert!(buf.is_complete());
    }

    #[tokio::test]
    async fn changed_total_uses_latest() {
        let mut buf = ReassemblyBuffer::new();
        assert!(buf.accept(&datagram(0, 4, b"a")));
        assert!(buf.accept(&datagram(3, 4, b"d")));
        assert!(buf.accept(&datagram(1, 2, b"b")));
        assert_eq!(buf.total(), Some(2));
        assert_eq!(buf.received(), 2);
        assert!(buf.is_complete());
        assert_eq!(drain(buf).await, b"ab");
    }
}
