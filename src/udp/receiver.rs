//! Receiving side of the raw UDP mechanism
// (c) 2024 Ross Younger

use std::{path::Path, time::Duration, time::Instant};

use anyhow::{Context as _, Result};
use human_repr::HumanCount as _;
use tokio::{io::BufWriter, net::UdpSocket};
use tracing::{debug, info, warn};

use super::ReassemblyBuffer;
use crate::{
    protocol::{HEADER_LEN, MAX_PAYLOAD},
    util::{socket::set_receive_buffer, stats::log_transfer},
};

/// Kernel receive buffer we ask for, so bursts from a fast sender are not dropped
const WANTED_RECEIVE_BUFFER: usize = 8 * 1024 * 1024;

/// Tuning for [`receive`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ReceiveOptions {
    /// Give up if no datagram arrives for this long. `None` waits forever.
    pub idle_timeout: Option<Duration>,
}

/// What a completed receive did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiveReport {
    /// Bytes written to the output file
    pub bytes: u64,
    /// Distinct chunks received
    pub chunks: u64,
}

/// Binds `bind_host:bind_port` and receives one transfer into `output`.
pub async fn receive(
    bind_host: &str,
    bind_port: u16,
    output: &Path,
    options: ReceiveOptions,
) -> Result<ReceiveReport> {
    let socket = UdpSocket::bind((bind_host, bind_port))
        .await
        .with_context(|| format!("could not bind UDP {bind_host}:{bind_port}"))?;
    info!("Listening on {}", socket.local_addr()?);
    receive_on(socket, output, options).await
}

/// Receives one transfer on an already bound socket, then writes the chunks in sequence order to `output`.
///
/// The output file is only created once every chunk has arrived.
/// Without an idle timeout, a transfer that lost a datagram never completes.
pub async fn receive_on(
    socket: UdpSocket,
    output: &Path,
    options: ReceiveOptions,
) -> Result<ReceiveReport> {
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("cannot create directory {}", parent.display()))?;
    }
    match set_receive_buffer(&socket, WANTED_RECEIVE_BUFFER) {
        Ok(size) if size < WANTED_RECEIVE_BUFFER => debug!(
            "UDP receive buffer is {}; wanted {}",
            size.human_count_bytes(),
            WANTED_RECEIVE_BUFFER.human_count_bytes()
        ),
        Ok(_) => (),
        Err(e) => warn!("Unable to set UDP receive buffer size: {e}"),
    }

    let mut chunks = ReassemblyBuffer::new();
    // One spare byte lets us spot (and drop) oversized datagrams rather than silently truncating them
    let mut buf = vec![0u8; HEADER_LEN + MAX_PAYLOAD + 1];
    let mut start: Option<Instant> = None;

    while !chunks.is_complete() {
        let recv = socket.recv_from(&mut buf);
        let (len, from) = match options.idle_timeout {
            None => recv.await?,
            Some(limit) => tokio::time::timeout(limit, recv).await.with_context(|| {
                format!(
                    "no datagram for {}s; received {} of {} chunks",
                    limit.as_secs(),
                    chunks.received(),
                    chunks
                        .total()
                        .map_or_else(|| "?".to_string(), |t| t.to_string())
                )
            })??,
        };
        if len > HEADER_LEN + MAX_PAYLOAD {
            debug!("ignoring oversized datagram ({len} bytes) from {from}");
            continue;
        }
        if chunks.accept(&buf[..len]) && start.is_none() {
            debug!("transfer started by {from}");
            start = Some(Instant::now());
        }
    }
    let received = chunks.received() as u64;

    let file = tokio::fs::File::create(output)
        .await
        .with_context(|| format!("cannot create {}", output.display()))?;
    let mut writer = BufWriter::new(file);
    let bytes = chunks.write_to(&mut writer).await?;
    log_transfer(
        "Received",
        bytes,
        received,
        start.map(|s| s.elapsed()).unwrap_or_default(),
    );
    Ok(ReceiveReport {
        bytes,
        chunks: received,
    })
}

#[cfg(test)]
mod test {
    use super::{receive_on, ReceiveOptions};
    use crate::{
        protocol::DatagramHeader,
        udp::{send, SendOptions},
        util::make_test_tempfile,
    };
    use indicatif::ProgressBar;
    use std::time::Duration;
    use tokio::net::UdpSocket;

    #[tokio::test]
    async fn loopback_transfer_is_byte_identical() -> anyhow::Result<()> {
        let data: Vec<u8> = std::iter::repeat_with(|| fastrand::u8(..))
            .take(200 * 1024)
            .collect();
        let (source, dir) = make_test_tempfile(&data, "payload.bin");
        let output = dir.path().join("out/received.bin");

        let socket = UdpSocket::bind("127.0.0.1:0").await?;
        let port = socket.local_addr()?.port();
        let options = ReceiveOptions {
            idle_timeout: Some(Duration::from_secs(10)),
        };
        let out2 = output.clone();
        let receiver = tokio::spawn(async move { receive_on(socket, &out2, options).await });

        let sent = send(
            &source,
            "127.0.0.1",
            port,
            SendOptions::default(),
            &ProgressBar::hidden(),
        )
        .await?;
        assert_eq!(sent.chunks, 4);
        assert_eq!(sent.bytes, 204_800);

        let got = receiver.await??;
        assert_eq!(got.chunks, 4);
        assert_eq!(got.bytes, 204_800);
        assert_eq!(std::fs::read(&output)?, data);
        Ok(())
    }

    #[tokio::test]
    async fn shuffled_datagrams_reassemble() -> anyhow::Result<()> {
        let data: Vec<u8> = (0..=255u8).cycle().take(5000).collect();
        let dir = tempfile::tempdir()?;
        let output = dir.path().join("out.bin");

        let socket = UdpSocket::bind("127.0.0.1:0").await?;
        let addr = socket.local_addr()?;
        let out2 = output.clone();
        let receiver = tokio::spawn(async move {
            receive_on(
                socket,
                &out2,
                ReceiveOptions {
                    idle_timeout: Some(Duration::from_secs(10)),
                },
            )
            .await
        });

        let mut datagrams: Vec<Vec<u8>> = data
            .chunks(500)
            .enumerate()
            .map(|(i, c)| {
                let mut buf = Vec::new();
                DatagramHeader::new(u32::try_from(i).unwrap(), 10).encode(c, &mut buf);
                buf
            })
            .collect();
        datagrams.push(datagrams[3].clone());
        fastrand::shuffle(&mut datagrams);

        let tx = UdpSocket::bind("127.0.0.1:0").await?;
        let _ = tx.send_to(b"not one of ours", addr).await?;
        for d in &datagrams {
            let _ = tx.send_to(d, addr).await?;
        }
        let _ = receiver.await??;
        assert_eq!(std::fs::read(&output)?, data);
        Ok(())
    }

    #[tokio::test]
    async fn idle_timeout_gives_up() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let output = dir.path().join("never.bin");
        let socket = UdpSocket::bind("127.0.0.1:0").await?;
        let result = receive_on(
            socket,
            &output,
            ReceiveOptions {
                idle_timeout: Some(Duration::from_millis(200)),
            },
        )
        .await;
        assert!(result.is_err());
        assert!(!output.exists());
        Ok(())
    }
}
