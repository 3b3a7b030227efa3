//! Error types for the wire codec.

/// Errors produced while encoding or decoding protocol fields.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("truncated {field}: expected {expected} bytes")]
    Truncated { field: &'static str, expected: usize },

    #[error("value {value} does not fit in {width} byte(s)")]
    ValueOverflow { value: u64, width: usize },

    #[error("{field} too long: {len} bytes (max {max})")]
    StringTooLong {
        field: &'static str,
        len: usize,
        max: u64,
    },

    #[error("invalid UTF-8 in {field}: {source}")]
    InvalidUtf8 {
        field: &'static str,
        source: std::string::FromUtf8Error,
    },

    #[error("unknown control code 0x{0:02x}")]
    UnknownControlCode(u8),
}

impl ProtocolError {
    /// Maps an I/O error raised while reading `field`, turning an early EOF
    /// into [`ProtocolError::Truncated`].
    pub(crate) fn from_read(err: std::io::Error, field: &'static str, expected: usize) -> Self {
        if err.kind() == std::io::ErrorKind::UnexpectedEof {
            Self::Truncated { field, expected }
        } else {
            Self::Io(err)
        }
    }

    /// True when the underlying cause is a transport failure rather than
    /// malformed bytes.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io(_))
    }
}
