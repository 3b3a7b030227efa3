//! One authenticated session to a remote host.
//!
//! Opening a session sends a connect request to the local roothelper, which
//! dials the remote roothelper over TLS and answers with a status byte and,
//! on success, the 32-byte session fingerprint.

use std::fmt;
use std::os::fd::OwnedFd;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use rhremote_protocol::codec::{read_fingerprint, read_status};
use rhremote_protocol::progress::{read_signal, read_value};
use rhremote_protocol::{ConnectRequest, ProgressSignal, STATUS_OK, SessionFingerprint};

use crate::error::SessionError;
use crate::transport::{Connector, Transport};
use crate::types::SessionConfig;

/// A live session to one remote host.
///
/// Requests on a session are strictly sequential: [`Connection::lock`]
/// grants exclusive use of the stream until the guard is dropped.
pub struct Connection<T> {
    host: String,
    fingerprint: SessionFingerprint,
    io: Mutex<Option<T>>,
    closed: CancellationToken,
}

impl<T: Transport> Connection<T> {
    /// Opens a transport and performs the connect handshake for `host`.
    ///
    /// The whole exchange is bounded by `config.connect_timeout`. A non-zero
    /// status drops the transport and yields [`SessionError::Rejected`].
    pub async fn connect<C>(
        connector: &C,
        host: &str,
        config: &SessionConfig,
    ) -> Result<Self, SessionError>
    where
        C: Connector<Transport = T>,
    {
        let request = ConnectRequest {
            host,
            port: config.remote_port,
        }
        .encode()?;

        let handshake = async {
            let mut transport = connector.open().await?;
            transport.write_all(&request).await?;
            transport.flush().await?;

            let status = read_status(&mut transport).await?;
            if status != STATUS_OK {
                return Err(SessionError::Rejected { status });
            }
            let fingerprint = read_fingerprint(&mut transport).await?;
            Ok::<_, SessionError>((transport, fingerprint))
        };

        let (transport, fingerprint) =
            match tokio::time::timeout(config.connect_timeout, handshake).await {
                Ok(Ok(pair)) => pair,
                Ok(Err(e)) => {
                    warn!(host, error = %e, "remote connect failed");
                    return Err(e);
                }
                Err(_) => {
                    warn!(host, timeout = ?config.connect_timeout, "remote connect timed out");
                    return Err(SessionError::Timeout);
                }
            };

        debug!(host, %fingerprint, "remote session established");
        Ok(Self {
            host: host.to_string(),
            fingerprint,
            io: Mutex::new(Some(transport)),
            closed: CancellationToken::new(),
        })
    }

    /// Acquires exclusive use of the session.
    ///
    /// Fails with [`SessionError::Closed`] if the session was closed, either
    /// before or while waiting.
    pub async fn lock(&self) -> Result<ConnectionGuard<'_, T>, SessionError> {
        let io = tokio::select! {
            biased;
            _ = self.closed.cancelled() => return Err(SessionError::Closed),
            guard = self.io.lock() => guard,
        };
        if io.is_none() {
            return Err(SessionError::Closed);
        }
        Ok(ConnectionGuard {
            io,
            closed: &self.closed,
        })
    }

    /// Closes the session. Idempotent.
    ///
    /// Operations in flight on a [`ConnectionGuard`] fail with
    /// [`SessionError::Closed`]; the transport is released when the last
    /// user lets go of it.
    pub fn close(&self) {
        if self.closed.is_cancelled() {
            return;
        }
        self.closed.cancel();
        if let Ok(mut io) = self.io.try_lock() {
            io.take();
        }
        debug!(host = %self.host, "remote session closed");
    }
}

impl<T> Connection<T> {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn fingerprint(&self) -> SessionFingerprint {
        self.fingerprint
    }

    pub fn is_closed(&self) -> bool {
        self.closed.is_cancelled()
    }
}

impl<T> fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("host", &self.host)
            .field("fingerprint", &self.fingerprint)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Exclusive access to a session's stream.
///
/// Every operation races against the session being closed.
pub struct ConnectionGuard<'a, T> {
    io: MutexGuard<'a, Option<T>>,
    closed: &'a CancellationToken,
}

impl<T: Transport> ConnectionGuard<'_, T> {
    fn transport(&mut self) -> Result<&mut T, SessionError> {
        self.io.as_mut().ok_or(SessionError::Closed)
    }

    /// Writes `bytes` and flushes.
    pub async fn write_all(&mut self, bytes: &[u8]) -> Result<(), SessionError> {
        let closed = self.closed;
        let transport = self.transport()?;
        tokio::select! {
            biased;
            _ = closed.cancelled() => Err(SessionError::Closed),
            result = write_flush(transport, bytes) => result.map_err(SessionError::from),
        }
    }

    /// Hands `fd` to the roothelper after everything written so far.
    pub async fn send_descriptor(&mut self, fd: OwnedFd) -> Result<(), SessionError> {
        let closed = self.closed;
        let transport = self.transport()?;
        tokio::select! {
            biased;
            _ = closed.cancelled() => Err(SessionError::Closed),
            result = transport.send_descriptor(fd) => result.map_err(SessionError::from),
        }
    }

    /// Reads one raw 8-byte value.
    pub async fn read_value(&mut self, field: &'static str) -> Result<u64, SessionError> {
        let closed = self.closed;
        let transport = self.transport()?;
        tokio::select! {
            biased;
            _ = closed.cancelled() => Err(SessionError::Closed),
            result = read_value(transport, field) => result.map_err(SessionError::from),
        }
    }

    /// Reads one progress value, classified against the sentinels.
    pub async fn read_signal(&mut self) -> Result<ProgressSignal, SessionError> {
        let closed = self.closed;
        let transport = self.transport()?;
        tokio::select! {
            biased;
            _ = closed.cancelled() => Err(SessionError::Closed),
            result = read_signal(transport) => result.map_err(SessionError::from),
        }
    }
}

impl<T> Drop for ConnectionGuard<'_, T> {
    fn drop(&mut self) {
        if self.closed.is_cancelled() {
            self.io.take();
        }
    }
}

async fn write_flush<W: AsyncWrite + Unpin>(writer: &mut W, bytes: &[u8]) -> std::io::Result<()> {
    writer.write_all(bytes).await?;
    writer.flush().await
}
