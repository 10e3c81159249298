//! Mechanism availability
// (c) 2024 Ross Younger

use std::{future::Future, process::Stdio, time::Duration};

use futures_util::future::join_all;
use strum::IntoEnumIterator as _;
use tokio::process::Command;
use tracing::debug;

use super::Mechanism;
use crate::config::Configuration;

/// Answers "can this mechanism run here?"
///
/// Implementations must not transfer data or change any persistent state, and must
/// report any failure as "not available".
pub trait AvailabilityProbe {
    /// Checks a single mechanism
    fn probe(&self, mechanism: Mechanism) -> impl Future<Output = bool> + Send;

    /// Checks every mechanism concurrently.
    /// The result holds the usable ones, in declaration order.
    fn list_available(&self) -> impl Future<Output = Vec<Mechanism>> + Send
    where
        Self: Sync,
    {
        async move {
            let checks = Mechanism::iter().map(|m| async move { (m, self.probe(m).await) });
            join_all(checks)
                .await
                .into_iter()
                .filter_map(|(m, usable)| usable.then_some(m))
                .collect()
        }
    }
}

/// The real availability checks, driven by the active configuration
#[derive(Debug, Clone)]
pub struct Registry {
    config: Configuration,
}

impl Registry {
    /// Constructor
    #[must_use]
    pub fn new(config: &Configuration) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl AvailabilityProbe for Registry {
    fn probe(&self, mechanism: Mechanism) -> impl Future<Output = bool> + Send {
        mechanism.available(&self.config)
    }
}

/// Runs `program --version`, then applies `accept` to its standard output.
///
/// A program which can't be started, exits unsuccessfully or takes longer than `limit` is unavailable.
pub(crate) async fn version_check(program: &str, limit: Duration, accept: fn(&str) -> bool) -> bool {
    let mut command = Command::new(program);
    let _ = command
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true);
    let output = match tokio::time::timeout(limit, command.output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            debug!("{program}: {e}");
            return false;
        }
        Err(_) => {
            debug!("{program} --version did not finish within {limit:?}");
            return false;
        }
    };
    if !output.status.success() {
        debug!("{program} --version failed ({})", output.status);
        return false;
    }
    accept(&String::from_utf8_lossy(&output.stdout))
}

/// Determines whether `program` can be found, either as given or by searching `PATH`
pub(crate) async fn on_path(program: &str) -> bool {
    let owned = program.to_string();
    match tokio::task::spawn_blocking(move || which::which(owned)).await {
        Ok(Ok(path)) => {
            debug!("found {program} at {}", path.display());
            true
        }
        Ok(Err(e)) => {
            debug!("{program}: {e}");
            false
        }
        Err(e) => {
            debug!("while searching for {program}: {e}");
            false
        }
    }
}
