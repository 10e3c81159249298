//! Configuration structure
// (c) 2024 Ross Younger

use std::{path::Path, time::Duration};

use anyhow::ensure;
use serde::{Deserialize, Serialize};

use crate::protocol::{DEFAULT_CHUNK_SIZE, MAX_PAYLOAD};

/// The set of configurable options supported by xfer.
///
/// **Note:** The implementation of `default()` for this struct returns xfer's hard-wired configuration defaults.
///
/// Credentials live here and are handed to the mechanisms that need them;
/// nothing else in the crate reads them from the environment.
///
// Maintainer note: None of the members of this struct should be Option<anything>. Empty strings and zeroes mean "unset".
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Configuration {
    // CREDENTIALS =====================================================================================
    /// Private key file for scp and sftp. Empty means "let ssh decide".
    pub ssh_key: String,
    /// FTP login name used when the destination does not name one
    pub ftp_user: String,
    /// FTP password used when the destination does not carry one
    pub ftp_password: String,

    // EXTERNAL PROGRAMS ===============================================================================
    /// The rsync program
    pub rsync: String,
    /// The udr program
    pub udr: String,
    /// The curl program (used for the quic and ftp mechanisms)
    pub curl: String,
    /// The scp program
    pub scp: String,
    /// The sftp program
    pub sftp: String,

    // UDP MECHANISM ===================================================================================
    /// Payload bytes per UDP datagram (1 to 65536)
    pub udp_chunk_size: u32,
    /// How long a UDP receiver waits for the next datagram, in seconds. 0 waits forever.
    pub receive_timeout: u32,

    // AVAILABILITY PROBES =============================================================================
    /// How long an availability probe may run before the mechanism is deemed unavailable, in seconds
    pub probe_timeout: u16,
}

impl Configuration {
    /// The ssh private key, if one was configured
    #[must_use]
    pub fn ssh_key_path(&self) -> Option<&Path> {
        (!self.ssh_key.is_empty()).then(|| Path::new(&self.ssh_key))
    }

    /// UDP chunk size accessor
    #[must_use]
    pub fn chunk_size(&self) -> usize {
        self.udp_chunk_size as usize
    }

    /// Accessor for `probe_timeout`, as a Duration
    #[must_use]
    pub fn probe_timeout_duration(&self) -> Duration {
        Duration::from_secs(self.probe_timeout.into())
    }

    /// Accessor for `receive_timeout`; `None` means wait forever
    #[must_use]
    pub fn receive_idle_timeout(&self) -> Option<Duration> {
        (self.receive_timeout > 0).then(|| Duration::from_secs(self.receive_timeout.into()))
    }

    /// Checks the values which have constraints beyond their type
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            (1..=MAX_PAYLOAD).contains(&self.chunk_size()),
            "udp_chunk_size must be between 1 and {MAX_PAYLOAD} (got {})",
            self.udp_chunk_size
        );
        ensure!(self.probe_timeout > 0, "probe_timeout must be at least 1 second");
        for (name, program) in [
            ("rsync", &self.rsync),
            ("udr", &self.udr),
            ("curl", &self.curl),
            ("scp", &self.scp),
            ("sftp", &self.sftp),
        ] {
            ensure!(!program.is_empty(), "the {name} program name must not be empty");
        }
        Ok(())
    }
}

impl std::fmt::Debug for Configuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Configuration")
            .field("ssh_key", &self.ssh_key)
            .field("ftp_user", &self.ftp_user)
            .field("ftp_password", &redact(&self.ftp_password))
            .field("rsync", &self.rsync)
            .field("udr", &self.udr)
            .field("curl", &self.curl)
            .field("scp", &self.scp)
            .field("sftp", &self.sftp)
            .field("udp_chunk_size", &self.udp_chunk_size)
            .field("receive_timeout", &self.receive_timeout)
            .field("probe_timeout", &self.probe_timeout)
            .finish()
    }
}

/// Hides a secret, while still showing whether it was set
pub(crate) fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "<redacted>"
    }
}

impl Default for Configuration {
    /// **(Unusual!)**
    /// Returns xfer's hard-wired configuration defaults.
    #[allow(clippy::cast_possible_truncation)]
    fn default() -> Self {
        Self {
            ssh_key: String::new(),
            ftp_user: "anonymous".into(),
            ftp_password: String::new(),

            rsync: "rsync".into(),
            udr: "udr".into(),
            curl: "curl".into(),
            scp: "scp".into(),
            sftp: "sftp".into(),

            udp_chunk_size: DEFAULT_CHUNK_SIZE as u32,
            receive_timeout: 0,

            probe_timeout: 5,
        }
    }
}
