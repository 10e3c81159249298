// (c) 2024 Ross Younger
//! Choosing a transfer mechanism
//!
//! The heuristic uses only what can be learned without opening a connection:
//! the shape of the destination, and the size and type of the source.
//!
//! | Destination | Source | Suggestion |
//! |---|---|---|
//! | local path | anything | rsync |
//! | `ftp://...` | anything | ftp |
//! | `https://`, `http://`, `http3://` | anything | quic |
//! | `[user@]host:path` | directory | rsync |
//! | `[user@]host:path` | 1 GiB or more | udr |
//! | `[user@]host:path` | 100 MiB or more | rsync |
//! | `[user@]host:path` | smaller, or unreadable | sftp |
//!
//! The suggestion is used if it is available and the user did not ask to pick.
//! Otherwise the user chooses from the available mechanisms.

use std::{future::Future, path::Path};

use anyhow::{bail, Result};
use tracing::{debug, info};

use crate::{
    destination::DestinationKind,
    mechanism::{probe::AvailabilityProbe, Mechanism, TransferRequest},
};

pub mod picker;
pub use picker::ConsolePicker;

/// Files of at least this size go to rsync rather than sftp
pub const LARGE_FILE_THRESHOLD: u64 = 100 * 1024 * 1024;
/// Files of at least this size go to udr
pub const HUGE_FILE_THRESHOLD: u64 = 1024 * 1024 * 1024;

/// A snapshot of a local path, taken once before the transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    /// The path as given
    pub path: std::path::PathBuf,
    /// Size in bytes
    pub size: u64,
    /// Whether the path is a directory
    pub is_directory: bool,
}

/// Stats a local path. Returns `None` if it does not exist or cannot be read.
pub async fn probe_file(path: &Path) -> Option<FileDescriptor> {
    match tokio::fs::metadata(path).await {
        Ok(meta) => Some(FileDescriptor {
            path: path.to_path_buf(),
            size: meta.len(),
            is_directory: meta.is_dir(),
        }),
        Err(e) => {
            debug!("cannot stat {}: {e}", path.display());
            None
        }
    }
}

/// The mechanism the heuristic recommends. This is a pure function.
///
/// A missing `file` counts as a zero-byte regular file.
#[must_use]
pub fn suggest(destination: DestinationKind, file: Option<&FileDescriptor>) -> Mechanism {
    match destination {
        DestinationKind::Local => Mechanism::Rsync,
        DestinationKind::Ftp => Mechanism::Ftp,
        DestinationKind::Http => Mechanism::Quic,
        DestinationKind::Remote => match file {
            Some(f) if f.is_directory => Mechanism::Rsync,
            Some(f) if f.size >= HUGE_FILE_THRESHOLD => Mechanism::Udr,
            Some(f) if f.size >= LARGE_FILE_THRESHOLD => Mechanism::Rsync,
            _ => Mechanism::Sftp,
        },
    }
}

/// Asks the user to pick a mechanism
pub trait Chooser {
    /// Offers `choices` (never empty) with `preselected` highlighted.
    /// Returns `None` if the user declined to choose.
    fn choose(
        &self,
        choices: &[Mechanism],
        preselected: usize,
    ) -> impl Future<Output = Result<Option<Mechanism>>> + Send;
}

/// Decides which mechanism will carry out `request`.
///
/// An explicit mechanism is returned as-is, without checking availability; callers should check before transferring.
pub async fn resolve<P, C>(request: &TransferRequest, probe: &P, chooser: &C) -> Result<Mechanism>
where
    P: AvailabilityProbe + Sync,
    C: Chooser,
{
    if let Some(m) = request.explicit_mechanism {
        debug!("mechanism {m} requested explicitly");
        return Ok(m);
    }

    let kind = DestinationKind::classify(&request.destination);
    // Only remote suggestions depend on the source
    let file = match kind {
        DestinationKind::Remote => probe_file(&request.source).await,
        _ => None,
    };
    let suggested = suggest(kind, file.as_ref());
    debug!("destination is {kind}; suggesting {suggested}");

    let available = probe.list_available().await;
    debug!("available mechanisms: {available:?}");
    let position = available.iter().position(|m| *m == suggested);

    if !request.interactive && position.is_some() {
        return Ok(suggested);
    }
    if available.is_empty() {
        bail!("no transfer mechanism is available on this host");
    }
    if position.is_none() {
        info!("suggested mechanism {suggested} is not available");
    }
    match chooser.choose(&available, position.unwrap_or(0)).await? {
        Some(m) => Ok(m),
        None => bail!("No protocol selected."),
    }
}
