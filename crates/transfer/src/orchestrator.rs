//! Runs uploads and downloads over long-term roothelper sessions.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use rhremote_protocol::requests::END_OF_LIST;
use rhremote_protocol::{
    PathPair, PathPairsRequest, ProgressSignal, UploadBatchHeader, UploadItemHeader,
};
use rhremote_session::{ConnectionGuard, Connector, PoolKind, PoolManager};

use crate::error::TransferFailure;
use crate::progress::{Ingest, ProgressSink, ProgressState};
use crate::resolver::ContentResolver;
use crate::types::{PathIdentity, TransferAction, TransferItems, TransferOutcome, join_path};

/// Drives transfers through a shared [`PoolManager`].
pub struct Orchestrator<C: Connector, R> {
    pools: Arc<PoolManager<C>>,
    resolver: R,
}

impl<C: Connector, R: ContentResolver> Orchestrator<C, R> {
    pub fn new(pools: Arc<PoolManager<C>>, resolver: R) -> Self {
        Self { pools, resolver }
    }

    pub fn pools(&self) -> &Arc<PoolManager<C>> {
        &self.pools
    }

    /// Transfers `items` to `destination`.
    ///
    /// Routes on the source parent for a download and on the destination for
    /// an upload, using that host's long-term session. Transfers to the same
    /// host queue on that session. Once this transfer holds the session, any
    /// failure, cancellation included, closes and evicts it so the next
    /// transfer starts with a fresh handshake. Cancelling while still queued
    /// only abandons this transfer.
    ///
    /// # Panics
    ///
    /// Panics when a content-handle batch is paired with
    /// [`TransferAction::Download`], or when the side being routed on is not
    /// remote.
    pub async fn transfer<P: PathIdentity>(
        &self,
        items: &TransferItems<P, R::Handle>,
        destination: &P,
        action: TransferAction,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> TransferOutcome {
        let host = routing_host(items, destination, action);
        info!(host, %action, items = items.len(), "transfer started");

        let conn = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(host, "transfer cancelled before session was ready");
                return TransferOutcome::Cancelled;
            }
            result = self.pools.get_or_create(host, PoolKind::LongTerm) => match result {
                Ok(conn) => conn,
                Err(e) => {
                    warn!(host, error = %e, "no session for transfer");
                    return TransferOutcome::ConnectionError;
                }
            },
        };

        // Cancelling while queued behind another transfer leaves the session alone.
        let mut io = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(host, "transfer cancelled while waiting for the session");
                return TransferOutcome::Cancelled;
            }
            guard = conn.lock() => match guard {
                Ok(io) => io,
                Err(e) => {
                    warn!(host, %action, error = %e, "session unusable");
                    self.pools.evict(PoolKind::LongTerm, &conn).await;
                    return TransferFailure::from(e).outcome();
                }
            },
        };

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransferFailure::Cancelled),
            result = self.run(&mut io, items, destination, action, sink) => result,
        };
        drop(io);

        match result {
            Ok(()) => {
                info!(host, %action, "transfer completed");
                TransferOutcome::Ok
            }
            Err(failure) => {
                warn!(host, %action, error = %failure, "transfer failed");
                self.pools.evict(PoolKind::LongTerm, &conn).await;
                failure.outcome()
            }
        }
    }

    async fn run<P: PathIdentity>(
        &self,
        io: &mut ConnectionGuard<'_, C::Transport>,
        items: &TransferItems<P, R::Handle>,
        destination: &P,
        action: TransferAction,
        sink: &dyn ProgressSink,
    ) -> Result<(), TransferFailure> {
        match items {
            TransferItems::ContentHandles(handles) => {
                self.upload_handles(io, handles, destination, sink).await
            }
            TransferItems::Paths { parent, names } => {
                transfer_pairs(io, parent, names, destination, action, sink).await
            }
        }
    }

    /// Streams local content handles as descriptors, one item at a time.
    async fn upload_handles<P: PathIdentity>(
        &self,
        io: &mut ConnectionGuard<'_, C::Transport>,
        handles: &[R::Handle],
        destination: &P,
        sink: &dyn ProgressSink,
    ) -> Result<(), TransferFailure> {
        let mut resolved = Vec::with_capacity(handles.len());
        let mut total_size = 0u64;
        for handle in handles {
            let name = self
                .resolver
                .display_name(handle)
                .map_err(|source| resolver_failure(handle, source))?;
            let size = self
                .resolver
                .size(handle)
                .map_err(|source| resolver_failure(handle, source))?;
            total_size = total_size.saturating_add(size);
            resolved.push((handle, join_path(destination.dir(), &name), size));
        }

        io.write_all(&UploadBatchHeader { total_size }.encode())
            .await?;

        let mut progress = ProgressState::new(handles.len() as u64, total_size);
        for (handle, path, size) in resolved {
            debug!(path = %path, size, "uploading content handle");
            let header = UploadItemHeader {
                destination: path,
                size,
            };
            io.write_all(&header.encode()?).await?;
            let fd = self
                .resolver
                .open(handle)
                .map_err(|source| resolver_failure(handle, source))?;
            io.send_descriptor(fd).await?;
            sink.on_progress(progress.begin_file(size));

            loop {
                let signal = match io.read_signal().await? {
                    ProgressSignal::EndOfFiles => {
                        debug!("end of files inside an upload item, treating as end of file");
                        ProgressSignal::EndOfFile
                    }
                    other => other,
                };
                match progress.ingest(signal) {
                    Ingest::Progress(p) => sink.on_progress(p),
                    Ingest::FileDone(p) => {
                        sink.on_progress(p);
                        break;
                    }
                    Ingest::Finished(p) => {
                        if let Some(p) = p {
                            sink.on_progress(p);
                        }
                        break;
                    }
                }
            }
        }

        io.write_all(&END_OF_LIST).await?;
        Ok(())
    }
}

/// Sends path pairs under the action's code and follows progress to EOFs.
async fn transfer_pairs<T, P>(
    io: &mut ConnectionGuard<'_, T>,
    parent: &P,
    names: &[String],
    destination: &P,
    action: TransferAction,
    sink: &dyn ProgressSink,
) -> Result<(), TransferFailure>
where
    T: rhremote_session::Transport,
    P: PathIdentity,
{
    let pairs = names
        .iter()
        .map(|name| {
            PathPair::new(
                join_path(parent.dir(), name),
                join_path(destination.dir(), name),
            )
        })
        .collect();
    let request = PathPairsRequest {
        code: action.code(),
        pairs,
    };
    io.write_all(&request.encode()?).await?;

    let files_total = io.read_value("file count").await?;
    let bytes_total = io.read_value("total size").await?;
    debug!(files_total, bytes_total, "transfer totals");

    let mut progress = ProgressState::new(files_total, bytes_total);
    loop {
        match progress.ingest(io.read_signal().await?) {
            Ingest::Progress(p) | Ingest::FileDone(p) => sink.on_progress(p),
            Ingest::Finished(p) => {
                if let Some(p) = p {
                    sink.on_progress(p);
                }
                return Ok(());
            }
        }
    }
}

fn routing_host<'a, P: PathIdentity, H>(
    items: &'a TransferItems<P, H>,
    destination: &'a P,
    action: TransferAction,
) -> &'a str {
    match (action, items) {
        (TransferAction::Download, TransferItems::ContentHandles(_)) => {
            panic!("content-handle batches can only be uploaded")
        }
        (TransferAction::Download, TransferItems::Paths { parent, .. }) => parent
            .remote_host()
            .unwrap_or_else(|| panic!("download source {} is not remote", parent.dir())),
        (TransferAction::Upload, _) => destination
            .remote_host()
            .unwrap_or_else(|| panic!("upload destination {} is not remote", destination.dir())),
    }
}

fn resolver_failure<H: std::fmt::Debug>(handle: &H, source: std::io::Error) -> TransferFailure {
    TransferFailure::Resolver {
        handle: format!("{handle:?}"),
        source,
    }
}
