//! Binary wire codec for the roothelper remote transfer protocol.
//!
//! The control stream carries single control-code bytes, fixed-width
//! big-endian unsigned integers and length-prefixed UTF-8 strings.
//! Progress telemetry flows back on the same stream as bare `u64` values,
//! two of which are reserved sentinels.
//!
//! # Wire format
//!
//! See [`codec`] for field primitives and [`requests`] for the request
//! layouts built on top of them.

pub mod codec;
pub mod codes;
pub mod error;
pub mod progress;
pub mod requests;

pub use codec::Width;
pub use codes::{ControlCode, ExistsFlags};
pub use error::ProtocolError;
pub use progress::{EOF, EOFS, ProgressSignal};
pub use requests::{
    ConnectRequest, ExistsRequest, PathPair, PathPairsRequest, UploadBatchHeader,
    UploadItemHeader,
};

/// Default TCP port the remote roothelper server listens on.
pub const DEFAULT_REMOTE_PORT: u16 = 11111;

/// Length of the TLS session fingerprint sent after a successful connect.
pub const FINGERPRINT_LEN: usize = 32;

/// Connect response status: accepted.
pub const STATUS_OK: u8 = 0x00;

/// Hash of the TLS master secret shared by the local and remote roothelper.
///
/// Shown to the user for out-of-band comparison with the remote side.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionFingerprint(pub [u8; FINGERPRINT_LEN]);

impl SessionFingerprint {
    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.0
    }

    /// Lowercase hex rendering.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl std::fmt::Debug for SessionFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SessionFingerprint({})", self.to_hex())
    }
}

impl std::fmt::Display for SessionFingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}
