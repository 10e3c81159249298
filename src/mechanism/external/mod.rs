//! Mechanisms which hand the work to another program
// (c) 2024 Ross Younger

use std::{
    ffi::{OsStr, OsString},
    path::Path,
    process::Stdio,
};

use anyhow::{anyhow, bail, ensure, Context as _, Result};
use tokio::{io::AsyncWriteExt as _, process::Command};
use tracing::debug;

use super::TransferOptions;
use crate::config::Configuration;

pub(crate) mod ftp;
pub(crate) mod ssh;

/// A program and its arguments, ready to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Invocation {
    program: String,
    args: Vec<OsString>,
}

impl Invocation {
    fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
        }
    }

    fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    fn arg_if<S: AsRef<OsStr>>(self, condition: bool, arg: S) -> Self {
        if condition {
            self.arg(arg)
        } else {
            self
        }
    }

    fn command(&self) -> Command {
        debug!("running {} {:?}", self.program, self.args);
        let mut command = Command::new(&self.program);
        let _ = command.args(&self.args).kill_on_drop(true);
        command
    }

    fn check(&self, status: std::process::ExitStatus) -> Result<()> {
        ensure!(status.success(), "{} failed ({status})", self.program);
        Ok(())
    }

    /// Runs to completion, sharing our terminal
    async fn run(&self) -> Result<()> {
        let status = self
            .command()
            .status()
            .await
            .with_context(|| format!("could not run {}", self.program))?;
        self.check(status)
    }

    /// Runs to completion with `input` as its standard input
    async fn run_with_input(&self, input: &[u8]) -> Result<()> {
        let mut child = self
            .command()
            .stdin(Stdio::piped())
            .spawn()
            .with_context(|| format!("could not run {}", self.program))?;
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("could not access {} stdin", self.program))?;
        stdin
            .write_all(input)
            .await
            .with_context(|| format!("could not send instructions to {}", self.program))?;
        drop(stdin); // EOF
        let status = child.wait().await?;
        self.check(status)
    }
}

/// Double-quotes a string for a line-oriented command language (sftp batch files, curl config files),
/// escaping backslashes and double quotes.
fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Where a file lands when the remote path names a directory (empty, or ends in `/`)
fn remote_file_path(remote: &str, source: &Path) -> String {
    if remote.is_empty() || remote.ends_with('/') {
        let name = source.file_name().unwrap_or_default().to_string_lossy();
        format!("{remote}{name}")
    } else {
        remote.to_string()
    }
}

/// Metadata for a source we are about to send; a missing source is an error
async fn source_metadata(source: &Path) -> Result<std::fs::Metadata> {
    tokio::fs::metadata(source)
        .await
        .with_context(|| format!("cannot read {}", source.display()))
}

fn rsync_invocation(
    source: &Path,
    destination: &str,
    options: TransferOptions,
    config: &Configuration,
) -> Invocation {
    Invocation::new(&config.rsync)
        .arg_if(options.recursive, "-r")
        .arg_if(options.show_progress, "--progress")
        .arg("-a")
        .arg("--no-perms")
        .arg(source)
        .arg(destination)
}

/// Copies with rsync
pub(crate) async fn rsync(
    source: &Path,
    destination: &str,
    options: TransferOptions,
    config: &Configuration,
) -> Result<()> {
    rsync_invocation(source, destination, options, config)
        .run()
        .await
}

fn udr_invocation(
    source: &Path,
    destination: &str,
    options: TransferOptions,
    config: &Configuration,
) -> Invocation {
    Invocation::new(&config.udr)
        .arg_if(options.recursive, "-r")
        .arg_if(options.show_progress, "--progress")
        .arg(source)
        .arg(destination)
}

/// Copies with udr
pub(crate) async fn udr(
    source: &Path,
    destination: &str,
    options: TransferOptions,
    config: &Configuration,
) -> Result<()> {
    udr_invocation(source, destination, options, config)
        .run()
        .await
}

/// The upload URL for an HTTP/3 destination; a bare `host/path` means https
fn quic_url(destination: &str) -> String {
    let lower = destination.to_ascii_lowercase();
    if lower.starts_with("http3://") {
        format!("https://{}", &destination["http3://".len()..])
    } else if lower.starts_with("http://") || lower.starts_with("https://") {
        destination.to_string()
    } else {
        format!("https://{destination}")
    }
}

fn quic_invocation(
    source: &Path,
    destination: &str,
    options: TransferOptions,
    config: &Configuration,
) -> Invocation {
    Invocation::new(&config.curl)
        .arg("--http3")
        .arg("--fail")
        .arg_if(!options.show_progress, "-sS")
        .arg("-T")
        .arg(source)
        .arg(quic_url(destination))
        .arg_if(options.show_progress, "--progress-bar")
}

/// Uploads a single file over HTTP/3 with curl
pub(crate) async fn quic(
    source: &Path,
    destination: &str,
    options: TransferOptions,
    config: &Configuration,
) -> Result<()> {
    if source_metadata(source).await?.is_dir() {
        bail!("quic uploads a single file; pick another mechanism for directories");
    }
    quic_invocation(source, destination, options, config)
        .run()
        .await
        .context("HTTP/3 upload failed; does the server support HTTP/3?")
}
