//! rhremote command-line entry point.

mod app;
mod bars;
mod cli;
mod config;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use rhremote_transfer::TransferOutcome;

fn main() -> anyhow::Result<ExitCode> {
    let cli = cli::Cli::parse();

    let path = cli.config.clone().unwrap_or_else(config::config_path);
    let mut config = config::Config::load_from(&path)?;
    if let Some(socket) = &cli.socket {
        config.socket_path = socket.clone();
    }

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .init();

    tracing::debug!(
        version = env!("CARGO_PKG_VERSION"),
        config = %path.display(),
        socket = %config.socket_path.display(),
        "configuration loaded"
    );

    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt.block_on(app::run(cli.command, config, cli.quiet))?;

    if outcome != TransferOutcome::Ok {
        eprintln!("{outcome}");
    }
    Ok(exit_code(outcome))
}

fn exit_code(outcome: TransferOutcome) -> ExitCode {
    match outcome {
        TransferOutcome::Ok => ExitCode::SUCCESS,
        TransferOutcome::ConnectionError => ExitCode::from(2),
        TransferOutcome::TransferError => ExitCode::from(3),
        TransferOutcome::Cancelled => ExitCode::from(130),
        TransferOutcome::DestinationExists => ExitCode::from(4),
    }
}
