// Main CLI entrypoint
// (c) 2024 Ross Younger

use std::process::ExitCode;

use super::args::CliArgs;

use crate::{
    client,
    config::{Configuration, Manager},
    util::setup_tracing,
};
use clap::Parser;
use figment::providers::Serialized;
use indicatif::MultiProgress;

/// Main CLI entrypoint
pub fn cli() -> anyhow::Result<ExitCode> {
    let args = CliArgs::parse();
    if args.config_files {
        for file in Manager::config_files() {
            println!("{file}");
        }
        return Ok(ExitCode::SUCCESS);
    }

    let mut manager = Manager::new();
    manager.merge_provider(Serialized::defaults(&args.config));
    if args.show_config {
        println!("{manager}");
        return Ok(ExitCode::SUCCESS);
    }
    let config = manager
        .get::<Configuration>()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {e}"))?;
    config.validate()?;
    run(&args, &config)
}

#[tokio::main(flavor = "current_thread")]
async fn run(args: &CliArgs, config: &Configuration) -> anyhow::Result<ExitCode> {
    let progress = MultiProgress::new(); // This writes to stderr
    setup_tracing(args.log_level(), &progress, args.log_file.as_deref())
        .inspect_err(|e| anstream::eprintln!("{e:?}"))?;

    let outcome = if let Some(target) = &args.listen {
        client::listen(target, config).await
    } else if args.list {
        client::list(config).await
    } else {
        match args.transfer_request() {
            Ok(request) => client::transfer(&request, config, &progress).await,
            Err(e) => Err(e),
        }
    };
    Ok(match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    })
}
