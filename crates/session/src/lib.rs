//! Sessions to remote roothelper hosts.
//!
//! Every session is a stream to the local roothelper on which a connect
//! handshake has named the remote host; the local roothelper relays the
//! stream over TLS. [`PoolManager`] keeps one session per host in each of
//! two pools so interactive requests never wait behind a bulk transfer.

pub mod connection;
pub mod error;
pub mod manager;
#[cfg(any(test, feature = "memory"))]
pub mod memory;
pub mod pool;
pub mod transport;
pub mod types;
pub mod unix;

pub use connection::{Connection, ConnectionGuard};
pub use error::SessionError;
pub use manager::{PoolManager, SharedConnection};
pub use pool::ConnectionPool;
pub use transport::{Connector, Transport};
pub use types::{DEFAULT_CONNECT_TIMEOUT, PoolEvent, PoolKind, SessionConfig, SessionInfo};
pub use unix::{UnixConnector, UnixTransport};

/// Stream byte that carries a passed descriptor.
pub const DESCRIPTOR_MARKER: u8 = 0x01;
