//! Failure causes behind a non-OK [`TransferOutcome`].

use rhremote_protocol::ProtocolError;
use rhremote_session::SessionError;

use crate::types::TransferOutcome;

/// Why a transfer stopped after its session was obtained.
#[derive(Debug, thiserror::Error)]
pub enum TransferFailure {
    #[error("session error: {0}")]
    Session(SessionError),

    #[error("protocol error: {0}")]
    Protocol(ProtocolError),

    #[error("cannot resolve {handle}: {source}")]
    Resolver {
        handle: String,
        source: std::io::Error,
    },

    #[error("cancelled")]
    Cancelled,
}

impl TransferFailure {
    pub fn outcome(&self) -> TransferOutcome {
        match self {
            TransferFailure::Cancelled => TransferOutcome::Cancelled,
            _ => TransferOutcome::TransferError,
        }
    }
}

impl From<SessionError> for TransferFailure {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Protocol(e) if !e.is_io() => TransferFailure::Protocol(e),
            other => TransferFailure::Session(other),
        }
    }
}

impl From<ProtocolError> for TransferFailure {
    fn from(err: ProtocolError) -> Self {
        TransferFailure::Protocol(err)
    }
}
