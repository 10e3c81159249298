//! scp and sftp
// (c) 2024 Ross Younger

use std::path::Path;

use anyhow::{bail, Context as _, Result};

use super::{quote, remote_file_path, source_metadata, Invocation};
use crate::{config::Configuration, destination::ParsedDestination, mechanism::TransferOptions};

/// Parses an ssh-style destination, naming the mechanism on failure
fn parse(destination: &str, mechanism: &str) -> Result<ParsedDestination> {
    destination
        .parse::<ParsedDestination>()
        .with_context(|| format!("Invalid {mechanism} destination: {destination}"))
}

/// Checks a source is fit to send. Returns whether it is a directory.
async fn check_source(source: &Path, options: TransferOptions) -> Result<bool> {
    let is_dir = source_metadata(source).await?.is_dir();
    if is_dir && !options.recursive {
        bail!("Source is a directory; use --recursive");
    }
    Ok(is_dir)
}

/// Options common to scp and sftp. Without a port, ssh's own default (usually 22) applies.
fn with_connection_options(
    mut inv: Invocation,
    target: &ParsedDestination,
    config: &Configuration,
) -> Invocation {
    if let Some(port) = target.port {
        inv = inv.arg("-P").arg(port.to_string());
    }
    if let Some(key) = config.ssh_key_path() {
        inv = inv.arg("-i").arg(key);
    }
    inv
}

fn scp_invocation(
    source: &Path,
    target: &ParsedDestination,
    options: TransferOptions,
    config: &Configuration,
) -> Invocation {
    let inv = Invocation::new(&config.scp)
        .arg_if(options.recursive, "-r")
        .arg_if(!options.show_progress, "-q");
    with_connection_options(inv, target, config)
        .arg(source)
        .arg(target.to_string())
}

/// Copies with scp
pub(crate) async fn scp(
    source: &Path,
    destination: &str,
    options: TransferOptions,
    config: &Configuration,
) -> Result<()> {
    let target = parse(destination, "SCP")?;
    let _ = check_source(source, options).await?;
    scp_invocation(source, &target, options, config).run().await
}

/// The sftp command line; the work itself arrives on stdin as a batch (see [`sftp_batch`])
fn sftp_invocation(target: &ParsedDestination, config: &Configuration) -> Invocation {
    let inv = Invocation::new(&config.sftp).arg("-b").arg("-");
    with_connection_options(inv, target, config).arg(target.login())
}

fn sftp_batch(source: &str, remote: &str, is_dir: bool) -> String {
    let flags = if is_dir { "-r " } else { "" };
    format!("put {flags}{} {}\n", quote(source), quote(remote))
}

/// Copies with sftp in batch mode
pub(crate) async fn sftp(
    source: &Path,
    destination: &str,
    options: TransferOptions,
    config: &Configuration,
) -> Result<()> {
    let target = parse(destination, "SFTP")?;
    let is_dir = check_source(source, options).await?;
    let Some(local) = source.to_str() else {
        bail!("sftp cannot express the path {source:?}");
    };
    let remote = if is_dir {
        target.path.clone()
    } else {
        remote_file_path(&target.path, source)
    };
    let remote = if remote.is_empty() { ".".into() } else { remote };
    sftp_invocation(&target, config)
        .run_with_input(sftp_batch(local, &remote, is_dir).as_bytes())
        .await
}

#[cfg(test)]
mod test {
    use super::{parse, scp_invocation, sftp_batch, sftp_invocation};
    use crate::{
        config::Configuration,
        mechanism::{external::test::args_of, TransferOptions},
    };
    use std::path::Path;

    #[test]
    fn scp_plain() {
        let target = parse("user@server:/home/user/", "SCP").unwrap();
        let inv = scp_invocation(
            Path::new("./file.txt"),
            &target,
            TransferOptions::default(),
            &Configuration::default(),
        );
        assert_eq!(args_of(&inv), ["-q", "./file.txt", "user@server:/home/user/"]);
    }

    #[test]
    fn scp_everything() {
        let target = parse("root@[fe80::1]:2222:/data", "SCP").unwrap();
        let config = Configuration {
            ssh_key: "/keys/id_ed25519".into(),
            ..Default::default()
        };
        let inv = scp_invocation(
            Path::new("dir"),
            &target,
            TransferOptions {
                recursive: true,
                show_progress: true,
            },
            &config,
        );
        assert_eq!(
            args_of(&inv),
            [
                "-r",
                "-P",
                "2222",
                "-i",
                "/keys/id_ed25519",
                "dir",
                "root@[fe80::1]:/data"
            ]
        );
    }

    #[test]
    fn sftp_args() {
        let target = parse("backup-host:/srv/data", "SFTP").unwrap();
        let inv = sftp_invocation(&target, &Configuration::default());
        assert_eq!(args_of(&inv), ["-b", "-", "backup-host"]);
    }

    #[test]
    fn batches() {
        assert_eq!(
            sftp_batch("/tmp/a b.txt", "/srv/a b.txt", false),
            "put \"/tmp/a b.txt\" \"/srv/a b.txt\"\n"
        );
        assert_eq!(sftp_batch("dist", "www", true), "put -r \"dist\" \"www\"\n");
    }

    #[test]
    fn bad_destination_names_mechanism() {
        let err = parse("nocolon", "SFTP").unwrap_err();
        assert!(err.to_string().contains("SFTP"), "{err}");
    }

    #[tokio::test]
    async fn directory_needs_recursive() {
        let dir = tempfile::tempdir().unwrap();
        for result in [
            super::scp(dir.path(), "h:/x", TransferOptions::default(), &Configuration::default())
                .await,
            super::sftp(dir.path(), "h:/x", TransferOptions::default(), &Configuration::default())
                .await,
        ] {
            let err = result.unwrap_err();
            assert!(err.to_string().contains("--recursive"), "{err}");
        }
    }
}
