//! Error types for remote sessions.

use rhremote_protocol::ProtocolError;

/// Errors produced while opening or using a remote session.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("remote connect rejected with status 0x{status:02x}")]
    Rejected { status: u8 },

    #[error("connection timed out")]
    Timeout,

    #[error("session closed")]
    Closed,
}
