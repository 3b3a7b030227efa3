//! Request layouts sent over the control stream.
//!
//! # Wire format
//!
//! ```text
//! CONNECT:
//!   [1 byte: REMOTE_CONNECT]
//!   [1 byte: host_len][host_len bytes: host UTF-8]
//!   [2 bytes BE: port]
//!   <- [1 byte: status, 0 = OK]
//!   <- [32 bytes: TLS session fingerprint]        (only when status == 0)
//!
//! LIST OF PATH PAIRS (download / upload between providers):
//!   [1 byte: action code]
//!   PER PAIR:
//!     [2 bytes BE: src_len][src_len bytes: source path]
//!     [2 bytes BE: dst_len][dst_len bytes: destination path]
//!   [2 bytes: 0x0000 end of list]
//!
//! CONTENT HANDLE UPLOAD:
//!   [1 byte: UPLOAD | 0b111 << 5]
//!   [8 bytes BE: total size]
//!   PER ITEM:
//!     [2 bytes BE: path_len][path_len bytes: destination path]
//!     [8 bytes BE: size]
//!     (descriptor passed on the auxiliary channel)
//!     <- progress values until EOF
//!   [2 bytes: 0x0000 end of list]
//!
//! EXISTS:
//!   [1 byte: EXISTS | flags << 5]
//!   [2 bytes BE: path_len][path_len bytes: path]
//! ```

use crate::codec::{Width, put_str, put_unsigned};
use crate::codes::{CONTENT_HANDLE_BATCH, ControlCode, ExistsFlags};
use crate::ProtocolError;

/// Two zero bytes closing a list (an empty path length).
pub const END_OF_LIST: [u8; 2] = [0, 0];

/// Handshake asking the local roothelper to open a TLS session to `host`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest<'a> {
    pub host: &'a str,
    pub port: u16,
}

impl ConnectRequest<'_> {
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut buf = Vec::with_capacity(1 + 1 + self.host.len() + 2);
        buf.push(ControlCode::RemoteConnect.value());
        put_str(&mut buf, self.host, Width::One, "host")?;
        put_unsigned(&mut buf, self.port as u64, Width::Two)?;
        Ok(buf)
    }
}

/// A source path and the destination it is transferred to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPair {
    pub source: String,
    pub destination: String,
}

impl PathPair {
    pub fn new(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }
}

/// Provider-to-provider transfer of a list of path pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPairsRequest {
    pub code: ControlCode,
    pub pairs: Vec<PathPair>,
}

impl PathPairsRequest {
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut buf = vec![self.code.value()];
        for pair in &self.pairs {
            put_str(&mut buf, &pair.source, Width::Two, "source path")?;
            put_str(&mut buf, &pair.destination, Width::Two, "destination path")?;
        }
        buf.extend_from_slice(&END_OF_LIST);
        Ok(buf)
    }
}

/// Opening of a content-handle upload batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadBatchHeader {
    pub total_size: u64,
}

impl UploadBatchHeader {
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(9);
        buf.push(ControlCode::Upload.with_flags(CONTENT_HANDLE_BATCH));
        buf.extend_from_slice(&self.total_size.to_be_bytes());
        buf
    }
}

/// Per-item header preceding a descriptor hand-off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadItemHeader {
    pub destination: String,
    pub size: u64,
}

impl UploadItemHeader {
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut buf = Vec::with_capacity(2 + self.destination.len() + 8);
        put_str(&mut buf, &self.destination, Width::Two, "destination path")?;
        buf.extend_from_slice(&self.size.to_be_bytes());
        Ok(buf)
    }
}

/// Existence / type probe for a single path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExistsRequest {
    pub path: String,
    pub flags: ExistsFlags,
}

impl ExistsRequest {
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        let mut buf = vec![ControlCode::Exists.with_flags(self.flags.bits())];
        put_str(&mut buf, &self.path, Width::Two, "path")?;
        Ok(buf)
    }
}
