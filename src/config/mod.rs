// (c) 2024 Ross Younger
//! # Configuration management
//!
//! xfer obtains run-time configuration from the following sources, highest priority first:
//! 1. Command-line options
//! 2. Environment variables
//!    * `SSH_PRIVATE_KEY_PATH` sets `ssh_key`
//!    * `FTP_PASSWORD` sets `ftp_password`
//!    * `XFER_<FIELD>` sets any field, e.g. `XFER_UDP_CHUNK_SIZE=1400`
//! 3. The user's configuration file (`~/.xfer.toml`)
//! 4. The system-wide configuration file (`/etc/xfer.toml`)
//! 5. Hard-wired defaults
//!
//! Each field is evaluated independently.
//!
//! ## File format
//!
//! Configuration files are TOML, with one key per field of [Configuration].
//!
//! ### Example
//!
//! ```text
//! ssh_key = "/home/me/.ssh/id_backup"
//! ftp_user = "uploader"
//! rsync = "/opt/rsync-3/bin/rsync"
//! udp_chunk_size = 8192     # our WAN path fragments badly
//! receive_timeout = 30
//! ```
//!
//! ## Configurable options
//!
//! On the command line:
//! * `xfer --show-config` outputs a list of supported fields, their current values, and where each value came from.
//! * `xfer --config-files` outputs the list of configuration files for the current user and platform.

mod manager;
pub use manager::Manager;

mod structure;
pub use structure::Configuration;

/// The base name of our configuration files
pub(crate) const BASE_CONFIG_FILENAME: &str = "xfer.toml";
