//! Upload and download orchestration over pooled roothelper sessions.
//!
//! A transfer is either a list of source/destination path pairs handled
//! entirely by the roothelpers, or a batch of local content handles whose
//! descriptors are passed to the local roothelper one at a time. Either way
//! the roothelper streams progress back on the same session.

pub mod error;
pub mod orchestrator;
pub mod progress;
pub mod resolver;
pub mod types;

pub use error::TransferFailure;
pub use orchestrator::Orchestrator;
pub use progress::{
    InnerProgress, Ingest, NoProgress, ProgressSink, ProgressState, TransferProgress, percent,
};
pub use resolver::{ContentResolver, FsContentResolver};
pub use types::{
    Location, PathIdentity, TransferAction, TransferItems, TransferOutcome, join_path,
};
