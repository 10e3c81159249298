//! FTP uploads, driven through curl
// (c) 2024 Ross Younger

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, ensure, Context as _, Result};
use tracing::{debug, info};
use url::Url;

use super::{quote, source_metadata, Invocation};
use crate::{config::Configuration, destination::ParsedDestination, mechanism::TransferOptions};

const DEFAULT_FTP_PORT: u16 = 21;

/// Where an FTP upload goes, and how to log in
#[derive(Debug, Clone, PartialEq, Eq)]
struct FtpTarget {
    /// The target. A path ending in `/` names a directory.
    url: Url,
    /// `user:password`, when the URL does not carry its own login
    credentials: Option<String>,
}

/// Replaces the path of `url` with `path`, as written in an scp-style destination.
///
/// curl treats URL paths as relative to the login directory; a leading `%2F` makes them absolute.
fn set_remote_path(url: &mut Url, path: &str) -> Result<()> {
    let mut parts: Vec<String> = path
        .split('/')
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect();
    if path.starts_with('/') {
        match parts.first_mut() {
            Some(first) => first.insert(0, '/'),
            None => parts.push("/".into()),
        }
    }
    if path.ends_with('/') && !parts.is_empty() {
        parts.push(String::new());
    }
    let mut segments = url
        .path_segments_mut()
        .map_err(|()| anyhow!("FTP URL cannot carry a path"))?;
    let _ = segments.clear().extend(parts);
    Ok(())
}

impl FtpTarget {
    /// Accepts `ftp://[user[:password]@]host[:port]/path` or `[user@]host:path`.
    ///
    /// Logins missing from the destination come from the configuration.
    fn new(destination: &str, config: &Configuration) -> Result<Self> {
        let fallback_login = |user: &str| format!("{user}:{}", config.ftp_password);

        if destination.to_ascii_lowercase().starts_with("ftp://") {
            let url = Url::parse(destination)
                .with_context(|| format!("Invalid FTP URL: {destination}"))?;
            ensure!(url.has_host(), "Invalid FTP URL: {destination} (no host)");
            let credentials = url
                .username()
                .is_empty()
                .then(|| fallback_login(&config.ftp_user));
            return Ok(Self { url, credentials });
        }

        let parsed = destination
            .parse::<ParsedDestination>()
            .with_context(|| format!("Invalid FTP destination: {destination}"))?;
        let mut url = Url::parse(&format!(
            "ftp://{}:{}/",
            parsed.host_for_display(),
            parsed.port.unwrap_or(DEFAULT_FTP_PORT)
        ))
        .with_context(|| format!("Invalid FTP destination: {destination}"))?;
        set_remote_path(&mut url, &parsed.path)?;
        let user = parsed.user.as_deref().unwrap_or(&config.ftp_user);
        Ok(Self {
            url,
            credentials: Some(fallback_login(user)),
        })
    }

    fn is_directory(&self) -> bool {
        self.url.path().ends_with('/')
    }

    /// The URL of a file at `relative` (path components) beneath the target directory
    fn file_url<I>(&self, relative: I) -> Result<Url>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut url = self.url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|()| anyhow!("FTP URL cannot carry a path"))?;
            let _ = segments.pop_if_empty().extend(relative);
        }
        Ok(url)
    }
}

/// Every regular file beneath `root`, with its path components relative to `root`, in a stable order
async fn files_beneath(root: &Path) -> Result<Vec<(PathBuf, Vec<String>)>> {
    let mut found = Vec::new();
    let mut pending = vec![(root.to_path_buf(), Vec::<String>::new())];
    while let Some((dir, prefix)) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&dir)
            .await
            .with_context(|| format!("cannot read directory {}", dir.display()))?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let mut relative = prefix.clone();
            relative.push(entry.file_name().to_string_lossy().to_string());
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                pending.push((path, relative));
            } else if file_type.is_symlink() && tokio::fs::metadata(&path).await?.is_dir() {
                // could lead back to an ancestor
                debug!("not following directory symlink {}", path.display());
            } else {
                found.push((path, relative));
            }
        }
    }
    found.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(found)
}

/// The curl configuration for a set of uploads, fed on stdin so that nothing secret appears in a process listing
fn curl_config(credentials: Option<&str>, uploads: &[(PathBuf, Url)]) -> Result<String> {
    let mut out = String::new();
    if let Some(c) = credentials {
        out.push_str(&format!("user = {}\n", quote(c)));
    }
    for (local, url) in uploads {
        let Some(local) = local.to_str() else {
            bail!("curl cannot express the path {local:?}");
        };
        out.push_str(&format!("upload-file = {}\n", quote(local)));
        out.push_str(&format!("url = {}\n", quote(url.as_str())));
    }
    Ok(out)
}

fn curl_invocation(options: TransferOptions, config: &Configuration) -> Invocation {
    Invocation::new(&config.curl)
        .arg("-K")
        .arg("-")
        .arg(if options.show_progress {
            "--progress-bar"
        } else {
            "-sS"
        })
        .arg("--ftp-create-dirs")
}

/// Uploads a file, or a directory's contents when `recursive`, over FTP
pub(crate) async fn transfer(
    source: &Path,
    destination: &str,
    options: TransferOptions,
    config: &Configuration,
) -> Result<()> {
    let target = FtpTarget::new(destination, config)?;
    let uploads = if source_metadata(source).await?.is_dir() {
        if !options.recursive {
            bail!("Source is a directory; use --recursive");
        }
        let mut uploads = Vec::new();
        for (local, relative) in files_beneath(source).await? {
            let url = target.file_url(&relative)?;
            uploads.push((local, url));
        }
        uploads
    } else if target.is_directory() {
        let name = source.file_name().unwrap_or_default().to_string_lossy();
        vec![(source.to_path_buf(), target.file_url([name])?)]
    } else {
        vec![(source.to_path_buf(), target.url.clone())]
    };
    if uploads.is_empty() {
        info!("{} contains no files; nothing to upload", source.display());
        return Ok(());
    }
    let instructions = curl_config(target.credentials.as_deref(), &uploads)?;
    curl_invocation(options, config)
        .run_with_input(instructions.as_bytes())
        .await
        .context("FTP upload failed")
}
