//! Request shapes, locations and result codes.

use std::fmt;

use rhremote_protocol::ControlCode;

/// The view of a location the orchestrator needs: where to route and which
/// directory string to put on the wire.
pub trait PathIdentity {
    /// Host of the remote roothelper holding this location, if it is remote.
    fn remote_host(&self) -> Option<&str>;

    /// Directory path on the host that owns the location.
    fn dir(&self) -> &str;
}

/// A directory either on this device or on a remote roothelper host.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    Local { dir: String },
    Remote { host: String, dir: String },
}

impl Location {
    pub fn local(dir: impl Into<String>) -> Self {
        Location::Local { dir: dir.into() }
    }

    pub fn remote(host: impl Into<String>, dir: impl Into<String>) -> Self {
        Location::Remote {
            host: host.into(),
            dir: dir.into(),
        }
    }
}

impl PathIdentity for Location {
    fn remote_host(&self) -> Option<&str> {
        match self {
            Location::Local { .. } => None,
            Location::Remote { host, .. } => Some(host),
        }
    }

    fn dir(&self) -> &str {
        match self {
            Location::Local { dir } | Location::Remote { dir, .. } => dir,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Local { dir } => f.write_str(dir),
            Location::Remote { host, dir } => write!(f, "{host}:{dir}"),
        }
    }
}

/// Joins a directory and an entry name with exactly one separator.
pub fn join_path(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}

/// What to transfer. The shape decides the wire format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferItems<P, H> {
    /// Entries named relative to a common parent, sent as source/destination
    /// path pairs.
    Paths { parent: P, names: Vec<String> },
    /// Local content handles whose descriptors are streamed to the peer.
    /// Upload only.
    ContentHandles(Vec<H>),
}

impl<P, H> TransferItems<P, H> {
    pub fn len(&self) -> usize {
        match self {
            TransferItems::Paths { names, .. } => names.len(),
            TransferItems::ContentHandles(handles) => handles.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Direction of a transfer relative to this device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferAction {
    Upload,
    Download,
}

impl TransferAction {
    pub fn code(self) -> ControlCode {
        match self {
            TransferAction::Upload => ControlCode::Upload,
            TransferAction::Download => ControlCode::Download,
        }
    }
}

impl fmt::Display for TransferAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferAction::Upload => f.write_str("upload"),
            TransferAction::Download => f.write_str("download"),
        }
    }
}

/// Result of a whole transfer. There is no partial success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    Ok,
    ConnectionError,
    TransferError,
    Cancelled,
    DestinationExists,
}

impl TransferOutcome {
    pub fn is_ok(self) -> bool {
        self == TransferOutcome::Ok
    }

    /// User-facing message.
    pub fn message(self) -> &'static str {
        match self {
            TransferOutcome::Ok => "Transfer completed",
            TransferOutcome::ConnectionError => "Connection error",
            TransferOutcome::TransferError => "Transfer error",
            TransferOutcome::Cancelled => "Transfer cancelled",
            TransferOutcome::DestinationExists => "Destination file already exists",
        }
    }
}

impl fmt::Display for TransferOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}
