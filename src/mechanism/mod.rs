// (c) 2024 Ross Younger
//! Transfer mechanisms
//!
//! Every mechanism honours the same two-operation contract:
//! * [`Mechanism::available`] says whether it can run on this host. It never fails; any problem means "no".
//! * [`Mechanism::transfer`] copies a source to a destination, or fails with an error naming the mechanism or program.
//!
//! Apart from `udp`, which is implemented in [`crate::udp`], each mechanism drives an external program.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use indicatif::MultiProgress;
use strum::{EnumIter, EnumString, IntoStaticStr};
use tracing::debug;

use crate::{config::Configuration, destination::UdpDestination, udp, util::progress};

mod external;
pub mod probe;

/// The closed set of transfer mechanisms.
///
/// Declaration order is the display order used by the picker and `--list`; it carries no other meaning.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    EnumIter,
    EnumString,
    IntoStaticStr,
    strum::Display,
    clap::ValueEnum,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Mechanism {
    /// Secure copy over ssh
    Scp,
    /// SSH File Transfer Protocol
    Sftp,
    /// Plain FTP, via curl
    Ftp,
    /// rsync
    Rsync,
    /// Raw UDP datagrams (xfer's own protocol)
    Udp,
    /// HTTP/3 upload, via curl
    Quic,
    /// UDR (rsync over UDT)
    Udr,
}

impl Mechanism {
    /// The mechanism's name, as accepted on the command line
    #[must_use]
    pub fn name(self) -> &'static str {
        self.into()
    }

    /// A one-line description for menus and listings
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Mechanism::Scp => "Secure Copy over SSH; good for single files, encrypted",
            Mechanism::Sftp => "SSH File Transfer Protocol; reliable, encrypted, good for directories",
            Mechanism::Ftp => "FTP; classic, widely supported (unencrypted)",
            Mechanism::Rsync => "RSYNC; efficient sync, delta transfer, great for large files and directories",
            Mechanism::Udp => "UDP; fast, best for LAN; no encryption, may lose packets",
            Mechanism::Quic => "QUIC (HTTP/3); low-latency, multiplexed; requires an HTTP/3 server",
            Mechanism::Udr => "UDR (UDT + rsync); very fast over high-latency links",
        }
    }

    /// Determines whether this mechanism can run on this host.
    ///
    /// This may run a program (with `--version`) or search the `PATH`, but never transfers anything.
    pub async fn available(self, config: &Configuration) -> bool {
        let limit = config.probe_timeout_duration();
        let result = match self {
            Mechanism::Scp => probe::on_path(&config.scp).await,
            Mechanism::Sftp => probe::on_path(&config.sftp).await,
            Mechanism::Ftp => probe::version_check(&config.curl, limit, curl_has_ftp).await,
            Mechanism::Rsync => probe::version_check(&config.rsync, limit, |_| true).await,
            Mechanism::Udp => true,
            Mechanism::Quic => probe::version_check(&config.curl, limit, curl_has_http3).await,
            Mechanism::Udr => probe::version_check(&config.udr, limit, |_| true).await,
        };
        debug!("mechanism {self} available: {result}");
        result
    }

    /// Copies `source` to `destination` using this mechanism.
    ///
    /// Any progress bar is drawn within `display`.
    pub async fn transfer(
        self,
        source: &Path,
        destination: &str,
        options: TransferOptions,
        config: &Configuration,
        display: &MultiProgress,
    ) -> Result<()> {
        match self {
            Mechanism::Scp => external::ssh::scp(source, destination, options, config).await,
            Mechanism::Sftp => external::ssh::sftp(source, destination, options, config).await,
            Mechanism::Ftp => external::ftp::transfer(source, destination, options, config).await,
            Mechanism::Rsync => external::rsync(source, destination, options, config).await,
            Mechanism::Udp => udp_transfer(source, destination, options, config, display).await,
            Mechanism::Quic => external::quic(source, destination, options, config).await,
            Mechanism::Udr => external::udr(source, destination, options, config).await,
        }
    }
}

/// curl lists its supported protocols on a line like `Protocols: dict file ftp ftps http https ...`
fn curl_has_ftp(version: &str) -> bool {
    version
        .lines()
        .filter_map(|l| l.strip_prefix("Protocols:"))
        .any(|protocols| protocols.split_whitespace().any(|p| p == "ftp"))
}

fn curl_has_http3(version: &str) -> bool {
    version.contains("HTTP3")
}

async fn udp_transfer(
    source: &Path,
    destination: &str,
    options: TransferOptions,
    config: &Configuration,
    display: &MultiProgress,
) -> Result<()> {
    let target: UdpDestination = destination.parse()?;
    let label = source
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();
    let bar = progress::bar_for(display, &label, 0, options.show_progress)?;
    let send_options = udp::SendOptions {
        chunk_size: config.chunk_size(),
    };
    let result = udp::send(source, &target.host, target.port, send_options, &bar)
        .await
        .with_context(|| format!("udp transfer to {}:{} failed", target.host, target.port));
    bar.finish_and_clear();
    let _ = result?;
    Ok(())
}

/// Per-transfer switches which mechanisms understand
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferOptions {
    /// Copy directories and their contents
    pub recursive: bool,
    /// Show progress while transferring
    pub show_progress: bool,
}

/// Everything the caller supplies for one transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    /// Local file or directory to send
    pub source: PathBuf,
    /// Where to send it; the format depends on the mechanism
    pub destination: String,
    /// Use this mechanism, whatever the heuristics say
    pub explicit_mechanism: Option<Mechanism>,
    /// Always ask the user to choose
    pub interactive: bool,
    /// Copy directories and their contents
    pub recursive: bool,
    /// Show progress while transferring
    pub show_progress: bool,
}

impl TransferRequest {
    /// The switches to hand to the chosen mechanism
    #[must_use]
    pub fn options(&self) -> TransferOptions {
        TransferOptions {
            recursive: self.recursive,
            show_progress: self.show_progress,
        }
    }
}

#[cfg(test)]
mod test {
    use super::{curl_has_ftp, curl_has_http3, Mechanism};
    use crate::config::Configuration;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    const CURL_VERSION: &str = "curl 8.5.0 (x86_64-pc-linux-gnu) libcurl/8.5.0 OpenSSL/3.0.13 zlib/1.3 nghttp2/1.59.0
Release-Date: 2023-12-06
Protocols: dict file ftp ftps gopher gophers http https imap imaps mqtt pop3 pop3s rtsp smb smbs smtp smtps telnet tftp
Features: alt-svc AsynchDNS HSTS HTTP2 HTTPS-proxy IPv6 Largefile libz NTLM SSL threadsafe TLS-SRP UnixSockets
";

    #[test]
    fn names_round_trip() {
        for m in Mechanism::iter() {
            assert_eq!(Mechanism::from_str(m.name()).unwrap(), m);
            assert_eq!(m.to_string(), m.name());
            assert!(!m.description().is_empty());
        }
        assert_eq!(Mechanism::from_str("RSYNC").unwrap(), Mechanism::Rsync);
        assert!(Mechanism::from_str("carrier-pigeon").is_err());
    }

    #[test]
    fn declaration_order() {
        let names: Vec<_> = Mechanism::iter().map(Mechanism::name).collect();
        assert_eq!(names, ["scp", "sftp", "ftp", "rsync", "udp", "quic", "udr"]);
    }

    #[test]
    fn curl_capabilities() {
        assert!(curl_has_ftp(CURL_VERSION));
        assert!(!curl_has_http3(CURL_VERSION));
        let with_h3 = CURL_VERSION.replace("HTTP2", "HTTP2 HTTP3");
        assert!(curl_has_http3(&with_h3));
        let no_ftp = CURL_VERSION.replace(" ftp ftps", "");
        assert!(!curl_has_ftp(&no_ftp));
    }

    #[tokio::test]
    async fn udp_always_available() {
        assert!(Mechanism::Udp.available(&Configuration::default()).await);
    }

    #[tokio::test]
    async fn missing_programs_are_unavailable() {
        let config = Configuration {
            rsync: "/nonexistent/rsync".into(),
            udr: "/nonexistent/udr".into(),
            curl: "/nonexistent/curl".into(),
            scp: "/nonexistent/scp".into(),
            sftp: "/nonexistent/sftp".into(),
            ..Default::default()
        };
        for m in Mechanism::iter().filter(|m| *m != Mechanism::Udp) {
            assert!(!m.available(&config).await, "{m}");
        }
    }

    #[tokio::test]
    async fn udp_directory_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = Mechanism::Udp
            .transfer(
                dir.path(),
                "127.0.0.1:9",
                super::TransferOptions::default(),
                &Configuration::default(),
                &indicatif::MultiProgress::new(),
            )
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("single file"), "{err:#}");
    }

    #[tokio::test]
    async fn udp_bad_destination() {
        let (path, _dir) = crate::util::make_test_tempfile(b"hi", "f");
        let result = Mechanism::Udp
            .transfer(
                &path,
                "no-port-here",
                super::TransferOptions::default(),
                &Configuration::default(),
                &indicatif::MultiProgress::new(),
            )
            .await;
        assert!(result.is_err());
    }
}
