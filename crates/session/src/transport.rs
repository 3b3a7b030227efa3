//! Byte stream plus descriptor channel to the local roothelper.

use std::future::Future;
use std::io;
use std::os::fd::OwnedFd;

use tokio::io::{AsyncRead, AsyncWrite};

/// A bidirectional stream to the local roothelper that can also hand over
/// open file descriptors.
///
/// A descriptor is sent in order with the stream bytes: everything written
/// before `send_descriptor` reaches the peer before the descriptor does.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send + 'static {
    /// Passes `fd` to the peer on the auxiliary channel.
    ///
    /// The local copy is closed once the peer holds its own.
    fn send_descriptor(&mut self, fd: OwnedFd) -> impl Future<Output = io::Result<()>> + Send;
}

/// Opens fresh transports to the local roothelper.
pub trait Connector: Send + Sync + 'static {
    type Transport: Transport;

    fn open(&self) -> impl Future<Output = io::Result<Self::Transport>> + Send;
}
