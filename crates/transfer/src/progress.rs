//! Progress reporting and the progress-ingestion state machine.
//!
//! The roothelper reports progress as bare `u64` values whose meaning
//! depends on the state: the first value for a file is its size, later
//! values are bytes done for that file, until EOF. EOFs ends the whole
//! transfer and is accepted in any state.

use rhremote_protocol::ProgressSignal;
use tracing::{debug, trace};

/// Progress of the file currently in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InnerProgress {
    /// The next value will be the file's size.
    AwaitingSize,
    Percent(u8),
}

/// One progress report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    /// Overall percentage, by bytes.
    pub outer: u8,
    pub inner: InnerProgress,
    pub files_done: u64,
    pub files_total: u64,
}

/// Receives progress reports. Must not block.
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, progress: TransferProgress);
}

impl<F> ProgressSink for F
where
    F: Fn(TransferProgress) + Send + Sync,
{
    fn on_progress(&self, progress: TransferProgress) {
        self(progress)
    }
}

/// Sink that discards every report.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&self, _progress: TransferProgress) {}
}

/// `done / total` as a percentage rounded to nearest, clamped to 100.
/// A zero `total` yields 0.
pub fn percent(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let scaled = (done as u128 * 200 + total as u128) / (total as u128 * 2);
    scaled.min(100) as u8
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileState {
    AwaitingFileSize,
    AwaitingProgressOrEof { size: u64 },
}

/// What a signal did to the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingest {
    /// Mid-file update.
    Progress(TransferProgress),
    /// The current file completed.
    FileDone(TransferProgress),
    /// The whole transfer completed. Carries a final report unless 100%
    /// was already reported.
    Finished(Option<TransferProgress>),
}

/// Tracks overall and per-file progress across a transfer.
#[derive(Debug, Clone)]
pub struct ProgressState {
    files_total: u64,
    bytes_total: u64,
    files_done: u64,
    bytes_done: u64,
    state: FileState,
    completed: bool,
}

impl ProgressState {
    pub fn new(files_total: u64, bytes_total: u64) -> Self {
        Self {
            files_total,
            bytes_total,
            files_done: 0,
            bytes_done: 0,
            state: FileState::AwaitingFileSize,
            completed: false,
        }
    }

    pub fn files_done(&self) -> u64 {
        self.files_done
    }

    pub fn bytes_done(&self) -> u64 {
        self.bytes_done
    }

    pub fn is_awaiting_size(&self) -> bool {
        self.state == FileState::AwaitingFileSize
    }

    /// Starts a file whose size is already known.
    pub fn begin_file(&mut self, size: u64) -> TransferProgress {
        self.state = FileState::AwaitingProgressOrEof { size };
        self.report(self.bytes_done, InnerProgress::Percent(0))
    }

    pub fn ingest(&mut self, signal: ProgressSignal) -> Ingest {
        match (signal, self.state) {
            (ProgressSignal::Value(size), FileState::AwaitingFileSize) => {
                trace!(size, "file size");
                Ingest::Progress(self.begin_file(size))
            }
            (ProgressSignal::Value(done), FileState::AwaitingProgressOrEof { size }) => {
                let inner = InnerProgress::Percent(percent(done, size));
                Ingest::Progress(self.report(self.bytes_done.saturating_add(done), inner))
            }
            (ProgressSignal::EndOfFile, state) => {
                if let FileState::AwaitingProgressOrEof { size } = state {
                    self.bytes_done = self.bytes_done.saturating_add(size);
                }
                self.files_done += 1;
                self.state = FileState::AwaitingFileSize;
                Ingest::FileDone(self.report(self.bytes_done, InnerProgress::AwaitingSize))
            }
            (ProgressSignal::EndOfFiles, state) => {
                if state != FileState::AwaitingFileSize || self.files_done < self.files_total {
                    debug!(
                        files_done = self.files_done,
                        files_total = self.files_total,
                        "end of files before the announced file count"
                    );
                }
                if self.completed {
                    return Ingest::Finished(None);
                }
                self.completed = true;
                Ingest::Finished(Some(TransferProgress {
                    outer: 100,
                    inner: InnerProgress::AwaitingSize,
                    files_done: self.files_done,
                    files_total: self.files_total,
                }))
            }
        }
    }

    /// Outer progress stays below 100 until every file has completed, and
    /// at 100 afterwards even if the peer keeps sending files.
    fn report(&mut self, bytes: u64, inner: InnerProgress) -> TransferProgress {
        let all_files_done = self.files_done >= self.files_total
            && self.state == FileState::AwaitingFileSize;
        let outer = if self.completed || all_files_done {
            self.completed = true;
            100
        } else {
            percent(bytes, self.bytes_total).min(99)
        };
        TransferProgress {
            outer,
            inner,
            files_done: self.files_done,
            files_total: self.files_total,
        }
    }
}
