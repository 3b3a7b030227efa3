//! Unix domain socket transport to the local roothelper.
//!
//! Descriptors travel as `SCM_RIGHTS` ancillary data attached to a single
//! marker byte, so they stay ordered with the rest of the stream.

use std::io;
use std::mem;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, Interest, ReadBuf};
use tokio::net::UnixStream;
use tracing::trace;

use crate::DESCRIPTOR_MARKER;
use crate::transport::{Connector, Transport};

const FD_SIZE: usize = mem::size_of::<RawFd>();

#[cfg(any(target_os = "linux", target_os = "android"))]
const SEND_FLAGS: libc::c_int = libc::MSG_NOSIGNAL;
#[cfg(not(any(target_os = "linux", target_os = "android")))]
const SEND_FLAGS: libc::c_int = 0;

/// Control message buffer, aligned for `cmsghdr`.
#[repr(C, align(8))]
struct ControlBuffer([u8; 64]);

/// Connects to the roothelper listening on a filesystem socket path.
#[derive(Debug, Clone)]
pub struct UnixConnector {
    path: PathBuf,
}

impl UnixConnector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Connector for UnixConnector {
    type Transport = UnixTransport;

    async fn open(&self) -> io::Result<UnixTransport> {
        let stream = UnixStream::connect(&self.path).await?;
        trace!(path = %self.path.display(), "roothelper socket connected");
        Ok(UnixTransport { stream })
    }
}

/// An open connection to the local roothelper socket.
#[derive(Debug)]
pub struct UnixTransport {
    stream: UnixStream,
}

impl AsyncRead for UnixTransport {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().stream).poll_read(cx, buf)
    }
}

impl AsyncWrite for UnixTransport {
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

impl Transport for UnixTransport {
    async fn send_descriptor(&mut self, fd: OwnedFd) -> io::Result<()> {
        let socket = self.stream.as_raw_fd();
        let raw = fd.as_raw_fd();
        self.stream
            .async_io(Interest::WRITABLE, || send_fd(socket, raw))
            .await?;
        drop(fd);
        trace!(fd = raw, "descriptor handed to roothelper");
        Ok(())
    }
}

/// Sends one marker byte carrying `fd` as `SCM_RIGHTS`.
fn send_fd(socket: RawFd, fd: RawFd) -> io::Result<()> {
    let mut payload = [DESCRIPTOR_MARKER];
    let mut iov = libc::iovec {
        iov_base: payload.as_mut_ptr().cast(),
        iov_len: payload.len(),
    };
    let mut control = ControlBuffer([0; 64]);
    // SAFETY: CMSG_SPACE only does arithmetic on its argument.
    let control_len = unsafe { libc::CMSG_SPACE(FD_SIZE as u32) } as usize;

    // SAFETY: msghdr is plain data; zero is a valid bit pattern for it.
    let mut msg: libc::msghdr = unsafe { mem::zeroed() };
    msg.msg_iov = &mut iov;
    msg.msg_iovlen = 1;
    msg.msg_control = control.0.as_mut_ptr().cast();
    msg.msg_controllen = control_len as _;

    // SAFETY: `control` is aligned and larger than CMSG_SPACE(FD_SIZE), so
    // the first header and its payload lie inside it.
    unsafe {
        let cmsg = libc::CMSG_FIRSTHDR(&msg);
        (*cmsg).cmsg_level = libc::SOL_SOCKET;
        (*cmsg).cmsg_type = libc::SCM_RIGHTS;
        (*cmsg).cmsg_len = libc::CMSG_LEN(FD_SIZE as u32) as _;
        std::ptr::write_unaligned(libc::CMSG_DATA(cmsg).cast::<RawFd>(), fd);
    }

    // SAFETY: every pointer in `msg` refers to a live local above.
    let sent = unsafe { libc::sendmsg(socket, &msg, SEND_FLAGS) };
    match sent {
        n if n < 0 => Err(io::Error::last_os_error()),
        0 => Err(io::Error::new(
            io::ErrorKind::WriteZero,
            "descriptor marker not sent",
        )),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::os::fd::FromRawFd;
    use tokio::io::AsyncWriteExt;
    use tokio::net::UnixListener;

    /// Receives one marker byte and the descriptor attached to it.
    fn recv_fd(socket: RawFd) -> io::Result<(u8, OwnedFd)> {
        let mut payload = [0u8; 1];
        let mut iov = libc::iovec {
            iov_base: payload.as_mut_ptr().cast(),
            iov_len: 1,
        };
        let mut control = ControlBuffer([0; 64]);
        let mut msg: libc::msghdr = unsafe { mem::zeroed() };
        msg.msg_iov = &mut iov;
        msg.msg_iovlen = 1;
        msg.msg_control = control.0.as_mut_ptr().cast();
        msg.msg_controllen = control.0.len() as _;

        let n = unsafe { libc::recvmsg(socket, &mut msg, 0) };
        if n < 0 {
            return Err(io::Error::last_os_error());
        }
        let cmsg = unsafe { libc::CMSG_FIRSTHDR(&msg) };
        assert!(!cmsg.is_null(), "no control message received");
        let fd = unsafe { std::ptr::read_unaligned(libc::CMSG_DATA(cmsg).cast::<RawFd>()) };
        Ok((payload[0], unsafe { OwnedFd::from_raw_fd(fd) }))
    }

    #[tokio::test]
    async fn descriptor_follows_stream_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let socket_path = dir.path().join("roothelper.sock");
        let file_path = dir.path().join("payload.txt");
        std::fs::File::create(&file_path)
            .unwrap()
            .write_all(b"hello")
            .unwrap();

        let listener = UnixListener::bind(&socket_path).unwrap();
        let connector = UnixConnector::new(&socket_path);

        let (client, accepted) = tokio::join!(connector.open(), listener.accept());
        let mut client = client.unwrap();
        let (server, _) = accepted.unwrap();

        client.write_all(b"hdr").await.unwrap();
        let fd = OwnedFd::from(std::fs::File::open(&file_path).unwrap());
        client.send_descriptor(fd).await.unwrap();

        let server = server.into_std().unwrap();
        server.set_nonblocking(false).unwrap();
        let (header, marker, contents) = tokio::task::spawn_blocking(move || {
            let mut server = server;
            let mut header = [0u8; 3];
            server.read_exact(&mut header).unwrap();
            let (marker, fd) = recv_fd(server.as_raw_fd()).unwrap();
            let mut contents = String::new();
            std::fs::File::from(fd).read_to_string(&mut contents).unwrap();
            (header, marker, contents)
        })
        .await
        .unwrap();

        assert_eq!(&header, b"hdr");
        assert_eq!(marker, DESCRIPTOR_MARKER);
        assert_eq!(contents, "hello");
    }

    #[tokio::test]
    async fn connect_to_missing_socket_fails() {
        let dir = tempfile::tempdir().unwrap();
        let connector = UnixConnector::new(dir.path().join("absent.sock"));
        assert!(connector.open().await.is_err());
    }
}
