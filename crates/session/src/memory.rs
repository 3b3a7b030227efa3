//! In-process transport pair.
//!
//! [`MemoryConnector`] hands the far end of every transport it opens to the
//! caller as a [`MemoryPeer`], which can then play the roothelper. Used by
//! tests and by hosts that embed the roothelper in-process.

use std::io;
use std::os::fd::OwnedFd;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, DuplexStream, ReadBuf};
use tokio::sync::mpsc;

use rhremote_protocol::codec::{Width, read_str, read_unsigned};
use rhremote_protocol::{ControlCode, ProtocolError, STATUS_OK, SessionFingerprint};

use crate::DESCRIPTOR_MARKER;
use crate::transport::{Connector, Transport};

const DUPLEX_BUFFER: usize = 64 * 1024;

/// Creates a connected transport and peer.
pub fn pair() -> (MemoryTransport, MemoryPeer) {
    let (near, far) = tokio::io::duplex(DUPLEX_BUFFER);
    let (tx, rx) = mpsc::unbounded_channel();
    (
        MemoryTransport {
            stream: near,
            descriptors: tx,
        },
        MemoryPeer {
            stream: far,
            descriptors: rx,
        },
    )
}

/// Client end of an in-process pair.
#[derive(Debug)]
pub struct MemoryTransport {
    stream: DuplexStream,
    descriptors: mpsc::UnboundedSender<OwnedFd>,
}

impl AsyncRead for MemoryTransport {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for MemoryTransport {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().stream).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_shutdown(cx)
    }
}

impl Transport for MemoryTransport {
    async fn send_descriptor(&mut self, fd: OwnedFd) -> io::Result<()> {
        self.stream.write_all(&[DESCRIPTOR_MARKER]).await?;
        self.descriptors
            .send(fd)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "peer dropped"))
    }
}

/// Roothelper end of an in-process pair.
#[derive(Debug)]
pub struct MemoryPeer {
    stream: DuplexStream,
    descriptors: mpsc::UnboundedReceiver<OwnedFd>,
}

impl MemoryPeer {
    /// Reads a connect request, returning the requested host and port.
    pub async fn read_connect(&mut self) -> Result<(String, u16), ProtocolError> {
        let code = read_unsigned(&mut self.stream, Width::One, "control code").await? as u8;
        if code != ControlCode::RemoteConnect.value() {
            return Err(ProtocolError::Io(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("expected connect request, got 0x{code:02x}"),
            )));
        }
        let host = read_str(&mut self.stream, Width::One, "host").await?;
        let port = read_unsigned(&mut self.stream, Width::Two, "port").await? as u16;
        Ok((host, port))
    }

    /// Reads a connect request and accepts it with `fingerprint`.
    pub async fn accept_connect(
        &mut self,
        fingerprint: SessionFingerprint,
    ) -> Result<String, ProtocolError> {
        let (host, _) = self.read_connect().await?;
        self.stream.write_all(&[STATUS_OK]).await?;
        self.stream.write_all(fingerprint.as_bytes()).await?;
        Ok(host)
    }

    /// Reads a connect request and refuses it with `status`.
    pub async fn reject_connect(&mut self, status: u8) -> Result<String, ProtocolError> {
        let (host, _) = self.read_connect().await?;
        self.stream.write_all(&[status]).await?;
        Ok(host)
    }

    /// Writes 8-byte big-endian values back to the client.
    pub async fn send_values(&mut self, values: &[u64]) -> io::Result<()> {
        for v in values {
            self.stream.write_all(&v.to_be_bytes()).await?;
        }
        self.stream.flush().await
    }

    /// Waits for the next descriptor, consuming its marker byte first.
    pub async fn recv_descriptor(&mut self) -> io::Result<OwnedFd> {
        let marker = self.stream.read_u8().await?;
        if marker != DESCRIPTOR_MARKER {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("expected descriptor marker, got 0x{marker:02x}"),
            ));
        }
        self.descriptors
            .recv()
            .await
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no descriptor"))
    }
}

impl AsyncRead for MemoryPeer {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for MemoryPeer {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        Pin::new(&mut self.get_mut().stream).poll_write(cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_shutdown(cx)
    }
}

/// Opens in-process transports, delivering each peer on a channel.
///
/// Once the receiving side is dropped, `open` fails with
/// `ConnectionRefused`.
#[derive(Debug)]
pub struct MemoryConnector {
    peers: mpsc::UnboundedSender<MemoryPeer>,
    opened: AtomicUsize,
}

impl MemoryConnector {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<MemoryPeer>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                peers: tx,
                opened: AtomicUsize::new(0),
            },
            rx,
        )
    }

    /// Number of transports opened so far.
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

impl Connector for MemoryConnector {
    type Transport = MemoryTransport;

    async fn open(&self) -> io::Result<MemoryTransport> {
        let (transport, peer) = pair();
        self.peers
            .send(peer)
            .map_err(|_| io::Error::new(io::ErrorKind::ConnectionRefused, "no roothelper"))?;
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(transport)
    }
}
