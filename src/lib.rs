// (c) 2024 Ross Younger

//! Unified file transfer dispatcher
//!
//! xfer sends a local file or directory to a destination using one of several mechanisms
//! (scp, sftp, ftp, rsync, udp, quic, udr). It picks one from the shape of the destination
//! and the size of the source, or lets the user choose, and then drives it.
//!
//! ```text
//! xfer ./file.txt user@server:/home/user/      # small file: sftp
//! xfer -r ./site server:/var/www/              # directory: rsync
//! xfer -m udp ./image.iso 192.0.2.7:9000       # raw UDP; run `xfer --listen 0.0.0.0:9000:/tmp/image.iso` there first
//! xfer --pick ./file.txt server:                # choose interactively
//! ```
//!
//! All mechanisms apart from `udp` are external programs, which must be installed;
//! `xfer --list` shows which are usable on this host.
//!
//! ## Configuration
//!
//! See [`config`].

mod cli;
pub use cli::cli;

pub mod client;
pub mod config;
pub mod destination;
pub mod mechanism;
pub mod protocol;
pub mod resolver;
pub mod udp;
pub mod util;
