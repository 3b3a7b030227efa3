//! Command execution.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use rhremote_session::{PoolEvent, PoolKind, PoolManager, UnixConnector};
use rhremote_transfer::{
    FsContentResolver, Location, Orchestrator, TransferAction, TransferItems, TransferOutcome,
};

use crate::bars::{BarSink, format_fingerprint};
use crate::cli::Command;
use crate::config::Config;

/// Runs one command, returning the transfer result code.
pub async fn run(command: Command, config: Config, quiet: bool) -> anyhow::Result<TransferOutcome> {
    let connector = UnixConnector::new(&config.socket_path);
    let pools = Arc::new(PoolManager::new(connector, config.session_config()));

    let mut events = pools
        .take_events()
        .await
        .context("pool events already taken")?;
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                PoolEvent::Opened(info) => {
                    eprintln!(
                        "session {} ({}) fingerprint {}",
                        info.host,
                        info.kind,
                        format_fingerprint(&info.fingerprint)
                    );
                }
                other => tracing::debug!(?other, "pool membership changed"),
            }
        }
    });

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("SIGINT received, cancelling");
            interrupt.cancel();
        }
    });

    let outcome = match command {
        Command::Connect { host } => match pools.get_or_create(&host, PoolKind::Fast).await {
            Ok(conn) => {
                println!("{}", conn.fingerprint());
                TransferOutcome::Ok
            }
            Err(e) => {
                tracing::warn!(host = %host, error = %e, "connect failed");
                TransferOutcome::ConnectionError
            }
        },
        Command::Download {
            host,
            remote_dir,
            local_dir,
            names,
            overwrite,
        } => {
            if !overwrite && let Some(existing) = first_existing(&local_dir, &names) {
                tracing::warn!(path = %existing.display(), "destination exists");
                TransferOutcome::DestinationExists
            } else {
                let items = TransferItems::Paths {
                    parent: Location::remote(host, remote_dir),
                    names,
                };
                let destination = Location::local(local_dir.to_string_lossy());
                transfer(&pools, &items, &destination, TransferAction::Download, quiet, &cancel)
                    .await
            }
        }
        Command::Upload {
            host,
            remote_dir,
            files,
        } => {
            let items = TransferItems::ContentHandles(files);
            let destination = Location::remote(host, remote_dir);
            transfer(&pools, &items, &destination, TransferAction::Upload, quiet, &cancel).await
        }
        Command::ShowConfig => {
            println!("{}", toml::to_string_pretty(&config)?);
            TransferOutcome::Ok
        }
    };

    pools.close_all().await;
    drop(pools);
    join_printer(printer).await;
    Ok(outcome)
}

/// Waits for the event printer, logging a panic instead of hiding it.
async fn join_printer(printer: tokio::task::JoinHandle<()>) {
    if let Err(e) = printer.await {
        tracing::warn!(error = %e, "event printer task failed");
    }
}

async fn transfer(
    pools: &Arc<PoolManager<UnixConnector>>,
    items: &TransferItems<Location, PathBuf>,
    destination: &Location,
    action: TransferAction,
    quiet: bool,
    cancel: &CancellationToken,
) -> TransferOutcome {
    let orchestrator = Orchestrator::new(pools.clone(), FsContentResolver);
    let bar = BarSink::new(quiet);
    let outcome = orchestrator
        .transfer(items, destination, action, &bar, cancel)
        .await;
    if outcome.is_ok() {
        bar.finish(outcome.message());
    } else {
        bar.abandon(outcome.message());
    }
    outcome
}

fn first_existing(dir: &std::path::Path, names: &[String]) -> Option<PathBuf> {
    names.iter().map(|n| dir.join(n)).find(|p| p.exists())
}
