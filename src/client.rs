// (c) 2024 Ross Younger
//! What the command line asks for: send, list mechanisms, or receive

use std::path::Path;

use anyhow::{bail, Result};
use futures_util::future::join_all;
use indicatif::MultiProgress;
use strum::IntoEnumIterator as _;
use tabled::{settings::style::Style, Table, Tabled};
use tracing::info;

use crate::{
    config::Configuration,
    destination::UdpDestination,
    mechanism::{
        probe::{AvailabilityProbe, Registry},
        Mechanism, TransferRequest,
    },
    resolver::{resolve, ConsolePicker},
    udp::{self, ReceiveOptions},
};

/// Resolves the mechanism for `request`, checks it can run here, then carries out the transfer.
pub async fn transfer(
    request: &TransferRequest,
    config: &Configuration,
    display: &MultiProgress,
) -> Result<()> {
    transfer_with(request, config, display, &Registry::new(config)).await
}

async fn transfer_with<P: AvailabilityProbe + Sync>(
    request: &TransferRequest,
    config: &Configuration,
    display: &MultiProgress,
    probe: &P,
) -> Result<()> {
    let mechanism = resolve(request, probe, &ConsolePicker).await?;
    if !probe.probe(mechanism).await {
        bail!("mechanism \"{mechanism}\" is not available (missing binary or dependency)");
    }
    info!("Using protocol: {mechanism}");
    mechanism
        .transfer(
            &request.source,
            &request.destination,
            request.options(),
            config,
            display,
        )
        .await?;
    info!("Done");
    Ok(())
}

#[derive(Tabled)]
struct MechanismRow {
    #[tabled(rename = "mechanism")]
    name: &'static str,
    available: &'static str,
    description: &'static str,
}

async fn survey<P: AvailabilityProbe + Sync>(probe: &P) -> Vec<MechanismRow> {
    let checks = Mechanism::iter().map(|m| async move {
        MechanismRow {
            name: m.name(),
            available: if probe.probe(m).await { "yes" } else { "no" },
            description: m.description(),
        }
    });
    join_all(checks).await
}

/// Prints every mechanism with its availability on this host
pub async fn list(config: &Configuration) -> Result<()> {
    let rows = survey(&Registry::new(config)).await;
    println!("{}", Table::new(rows).with(Style::sharp()));
    Ok(())
}

/// Receives one UDP transfer, as described by `target` (`host:port:path`)
pub async fn listen(target: &UdpDestination, config: &Configuration) -> Result<()> {
    let Some(path) = &target.path else {
        bail!("--listen needs somewhere to write: HOST:PORT:PATH");
    };
    let options = ReceiveOptions {
        idle_timeout: config.receive_idle_timeout(),
    };
    let _ = udp::receive(&target.host, target.port, Path::new(path), options).await?;
    info!("Done");
    Ok(())
}

#[cfg(test)]
mod test {
    use super::{listen, survey, transfer_with};
    use crate::{
        config::Configuration,
        destination::UdpDestination,
        mechanism::{probe::AvailabilityProbe, Mechanism, TransferRequest},
    };
    use assertables::assert_contains;
    use indicatif::MultiProgress;
    use std::{future::Future, path::PathBuf};

    struct Only(Vec<Mechanism>);

    impl AvailabilityProbe for Only {
        fn probe(&self, mechanism: Mechanism) -> impl Future<Output = bool> + Send {
            std::future::ready(self.0.contains(&mechanism))
        }
    }

    fn request(mechanism: Mechanism) -> TransferRequest {
        TransferRequest {
            source: PathBuf::from("/nonexistent/file"),
            destination: "host:/x".into(),
            explicit_mechanism: Some(mechanism),
            interactive: false,
            recursive: false,
            show_progress: false,
        }
    }

    #[tokio::test]
    async fn unavailable_mechanism_is_refused() {
        let err = transfer_with(
            &request(Mechanism::Udr),
            &Configuration::default(),
            &MultiProgress::new(),
            &Only(vec![Mechanism::Udp]),
        )
        .await
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "mechanism \"udr\" is not available (missing binary or dependency)"
        );
    }

    #[tokio::test]
    async fn transfer_errors_propagate() {
        let mut req = request(Mechanism::Udp);
        req.destination = "no-port-here".into();
        let err = transfer_with(
            &req,
            &Configuration::default(),
            &MultiProgress::new(),
            &Only(vec![Mechanism::Udp]),
        )
        .await
        .unwrap_err();
        assert_contains!(err.to_string(), "Invalid UDP destination");
    }

    #[tokio::test]
    async fn survey_covers_everything_in_order() {
        let rows = survey(&Only(vec![Mechanism::Sftp])).await;
        let names: Vec<_> = rows.iter().map(|r| r.name).collect();
        assert_eq!(names, ["scp", "sftp", "ftp", "rsync", "udp", "quic", "udr"]);
        let available: Vec<_> = rows.iter().map(|r| r.available).collect();
        assert_eq!(available, ["no", "yes", "no", "no", "no", "no", "no"]);
    }

    #[tokio::test]
    async fn listen_needs_a_path() {
        let target: UdpDestination = "127.0.0.1:0".parse().unwrap();
        let err = listen(&target, &Configuration::default())
            .await
            .unwrap_err();
        assert_contains!(err.to_string(), "HOST:PORT:PATH");
    }
}
