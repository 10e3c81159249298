// xfer top-level command-line arguments
// (c) 2024 Ross Younger

use std::path::PathBuf;

use anyhow::anyhow;
use clap::Parser;
use serde::Serialize;

use crate::{
    destination::UdpDestination,
    mechanism::{Mechanism, TransferRequest},
};

/// Options that switch us into another mode i.e. which don't require source/destination arguments
pub(crate) const MODE_OPTIONS: &[&str] = &["listen", "list", "show_config", "config_files"];

#[derive(Debug, Parser, Clone)]
#[command(
    author,
    version(env!("XFER_VERSION_STRING")),
    about,
    before_help = "e.g.   xfer ./file.txt user@server:/home/user/",
    infer_long_args(true)
)]
#[command(help_template(
    "\
{name} version {version}
{about-with-newline}
{usage-heading} {usage}
{before-help}
{all-args}{after-help}
"
))]
#[command(styles=super::styles::CLAP_STYLES)]
#[allow(clippy::struct_excessive_bools)]
pub(crate) struct CliArgs {
    // MODE SELECTION ======================================================================
    /// Receives a single file sent with `-m udp`, writes it to PATH, then exits.
    ///
    /// Start the receiver before the sender; datagrams sent before it is listening are lost.
    #[arg(
        long,
        value_name("HOST:PORT:PATH"),
        help_heading("Modes"),
        conflicts_with_all(["list", "show_config", "config_files", "protocol", "pick"])
    )]
    pub listen: Option<UdpDestination>,

    /// Lists every transfer mechanism, and whether it is available on this host
    #[arg(long, action, help_heading("Modes"), conflicts_with_all(["show_config", "config_files"]))]
    pub list: bool,

    /// Outputs the active configuration, then exits
    #[arg(long, action, help_heading("Configuration"), conflicts_with("config_files"))]
    pub show_config: bool,

    /// Outputs the paths of the configuration files xfer reads, then exits
    #[arg(long, action, help_heading("Configuration"))]
    pub config_files: bool,

    // MECHANISM CHOICE ====================================================================
    /// Uses this mechanism, whatever the heuristics would suggest
    #[arg(
        short = 'm',
        long,
        value_enum,
        ignore_case = true,
        value_name("NAME"),
        help_heading("Mechanism")
    )]
    pub protocol: Option<Mechanism>,

    /// Always chooses the mechanism interactively, with the suggestion preselected
    #[arg(short, long, action, help_heading("Mechanism"))]
    pub pick: bool,

    // TRANSFER OPTIONS ====================================================================
    /// Copies directories and their contents
    #[arg(short, long, action)]
    pub recursive: bool,

    /// Shows progress while transferring
    #[arg(long, action, conflicts_with("quiet"))]
    pub progress: bool,

    /// Quiet mode; reports only errors
    #[arg(short, long, action, conflicts_with("debug"))]
    pub quiet: bool,

    // DEBUG ===============================================================================
    /// Enable detailed debug output
    ///
    /// This has the same effect as setting `RUST_LOG=xfer=debug` in the environment.
    /// If present, `RUST_LOG` overrides this option.
    #[arg(short, long, action, help_heading("Debug"))]
    pub debug: bool,

    /// Log to a file
    ///
    /// By default the log receives everything printed to stderr.
    /// To override this behaviour, set the environment variable `RUST_LOG_FILE_DETAIL` (same semantics as `RUST_LOG`).
    #[arg(short('l'), long, action, help_heading("Debug"), value_name("FILE"))]
    pub log_file: Option<PathBuf>,

    // CONFIGURATION OVERRIDES =============================================================
    #[command(flatten)]
    pub config: ConfigOverrides,

    // POSITIONAL ARGUMENTS ================================================================
    /// The local file or directory to send
    #[arg(
        conflicts_with_all(MODE_OPTIONS),
        required = true,
        value_name = "SOURCE"
    )]
    pub source: Option<PathBuf>,

    /// Where to send it.
    ///
    /// `[user@]host:path` for scp, sftp, rsync and udr; `ftp://...` for ftp;
    /// `https://...` or `http3://...` for quic; `host:port` for udp; or a local path.
    #[arg(
        conflicts_with_all(MODE_OPTIONS),
        required = true,
        value_name = "DESTINATION"
    )]
    pub destination: Option<String>,
}

impl CliArgs {
    /// The transfer described by the positional arguments and switches
    pub(crate) fn transfer_request(&self) -> anyhow::Result<TransferRequest> {
        let missing = || anyhow!("both source and destination must be specified");
        Ok(TransferRequest {
            source: self.source.clone().ok_or_else(missing)?,
            destination: self.destination.clone().ok_or_else(missing)?,
            explicit_mechanism: self.protocol,
            interactive: self.pick,
            recursive: self.recursive,
            show_progress: self.progress,
        })
    }

    /// The console log level these switches ask for
    pub(crate) fn log_level(&self) -> &'static str {
        if self.debug {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "info"
        }
    }
}

/// Configuration settings which may be given on the command line.
///
/// These are merged over the files and environment; unset options leave them alone.
#[derive(Debug, Clone, Default, clap::Args, Serialize)]
pub(crate) struct ConfigOverrides {
    /// SSH private key for scp and sftp
    #[arg(short = 'i', long, value_name("FILE"), help_heading("Credentials"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_key: Option<String>,

    /// FTP user name, when the destination does not name one
    #[arg(long, value_name("USER"), help_heading("Credentials"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ftp_user: Option<String>,

    /// FTP password. Prefer the `FTP_PASSWORD` environment variable; command lines are visible to other users.
    #[arg(long, value_name("PASSWORD"), help_heading("Credentials"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ftp_password: Option<String>,

    /// Payload bytes per UDP datagram
    #[arg(
        long("chunk-size"),
        value_name("BYTES"),
        help_heading("Tuning"),
        value_parser = clap::value_parser!(u32).range(1..=65536)
    )]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub udp_chunk_size: Option<u32>,

    /// How long each availability check may take
    #[arg(long, value_name("SEC"), help_heading("Tuning"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe_timeout: Option<u16>,

    /// With `--listen`, gives up after this long without a datagram (0 waits forever)
    #[arg(long, value_name("SEC"), help_heading("Tuning"))]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receive_timeout: Option<u32>,
}
