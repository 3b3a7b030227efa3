//! Shared types for the session layer.

use std::fmt;
use std::time::Duration;

use rhremote_protocol::{DEFAULT_REMOTE_PORT, SessionFingerprint};

/// Default budget for the whole connect handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Which pool a session lives in.
///
/// Short interactive operations use the fast pool; bulk transfers use the
/// long-term pool so they never queue behind (or block) a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolKind {
    Fast,
    LongTerm,
}

impl fmt::Display for PoolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolKind::Fast => f.write_str("fast"),
            PoolKind::LongTerm => f.write_str("long-term"),
        }
    }
}

/// Parameters of the connect handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Port of the remote roothelper server, sent in the connect request.
    pub remote_port: u16,
    pub connect_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            remote_port: DEFAULT_REMOTE_PORT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

/// Snapshot of one pooled session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub kind: PoolKind,
    pub host: String,
    pub fingerprint: SessionFingerprint,
}

/// Pool membership changes, for observers such as a session list UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolEvent {
    /// A handshake succeeded and the session joined a pool.
    Opened(SessionInfo),
    /// A session left a pool after a failure or an explicit close.
    Closed { kind: PoolKind, host: String },
    /// Every session in both pools was closed.
    AllClosed,
}
