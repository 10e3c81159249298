//! Sending side of the raw UDP mechanism
// (c) 2024 Ross Younger

use std::{path::Path, time::Instant};

use anyhow::{bail, ensure, Context as _, Result};
use indicatif::ProgressBar;
use tokio::{
    fs::File,
    io::{AsyncRead, AsyncReadExt as _},
    net::{lookup_host, UdpSocket},
};
use tracing::{debug, trace};

use crate::{
    protocol::{chunk_count, DatagramHeader, DEFAULT_CHUNK_SIZE, MAX_PAYLOAD},
    util::{
        socket::{preferred_peer, unspecified_for},
        stats::log_transfer,
    },
};

/// How often, in chunks, the progress bar is updated
const PROGRESS_INTERVAL: u64 = 100;

/// Tuning for [`send`]
#[derive(Debug, Clone, Copy)]
pub struct SendOptions {
    /// Payload bytes per datagram
    pub chunk_size: usize,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// What a completed [`send`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendReport {
    /// Payload bytes sent
    pub bytes: u64,
    /// Datagrams sent
    pub chunks: u64,
}

/// Fills `buf` from `reader`, stopping early only at end of file. Returns the number of bytes read.
async fn read_chunk<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Sends the regular file at `source` to a listening receiver at `host:port`, one chunk per datagram.
///
/// Completion means every datagram was handed to the network stack; nothing confirms delivery.
/// An empty file sends nothing and succeeds immediately.
pub async fn send(
    source: &Path,
    host: &str,
    port: u16,
    options: SendOptions,
    progress: &ProgressBar,
) -> Result<SendReport> {
    let chunk_size = options.chunk_size;
    ensure!(
        (1..=MAX_PAYLOAD).contains(&chunk_size),
        "chunk size must be between 1 and {MAX_PAYLOAD} bytes (got {chunk_size})"
    );

    let meta = tokio::fs::metadata(source)
        .await
        .with_context(|| format!("cannot read {}", source.display()))?;
    if meta.is_dir() {
        bail!("UDP protocol only supports single file transfers");
    }
    let size = meta.len();
    let total = chunk_count(size, chunk_size);
    if total == 0 {
        debug!("{} is empty; nothing to send", source.display());
        return Ok(SendReport {
            bytes: 0,
            chunks: 0,
        });
    }
    let Ok(total_u32) = u32::try_from(total) else {
        bail!(
            "{} is too large to send in {chunk_size} byte chunks ({total} chunks needed)",
            source.display()
        );
    };

    let peer = preferred_peer(
        lookup_host((host, port))
            .await
            .with_context(|| format!("could not resolve {host}"))?,
    )
    .with_context(|| format!("no addresses found for {host}"))?;
    let socket = UdpSocket::bind(unspecified_for(&peer)).await?;
    debug!("sending {size} bytes in {total} chunks to {peer}");

    let mut file = File::open(source)
        .await
        .with_context(|| format!("cannot open {}", source.display()))?;
    let mut payload = vec![0u8; chunk_size];
    let mut datagram = Vec::with_capacity(crate::protocol::HEADER_LEN + chunk_size);
    let mut bytes = 0u64;
    let start = Instant::now();
    progress.set_length(size);

    for sequence in 0..total_u32 {
        let n = read_chunk(&mut file, &mut payload).await?;
        ensure!(
            n > 0,
            "{} shrank while being sent (chunk {sequence} of {total})",
            source.display()
        );
        DatagramHeader::new(sequence, total_u32).encode(&payload[..n], &mut datagram);
        let _ = socket
            .send_to(&datagram, peer)
            .await
            .with_context(|| format!("failed to send chunk {sequence} to {peer}"))?;
        bytes += n as u64;
        trace!("sent chunk {sequence}/{total} ({n} bytes)");
        if u64::from(sequence + 1) % PROGRESS_INTERVAL == 0 {
            progress.set_position(bytes);
        }
        // Don't hog the runtime; this also gives the receiver's queue a chance to drain.
        tokio::task::yield_now().await;
    }
    progress.set_position(bytes);
    log_transfer("Sent", bytes, total, start.elapsed());
    Ok(SendReport {
        bytes,
        chunks: total,
    })
}
