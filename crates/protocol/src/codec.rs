//! Field primitives of the control stream.
//!
//! # Wire format
//!
//! ```text
//! UNSIGNED:  [1 | 2 | 8 bytes BE]
//! STRING:    [1 or 2 bytes BE: len][len bytes: UTF-8]
//! ```
//!
//! Host names use a 1-byte length, paths a 2-byte length. Sizes and
//! progress values are always 8 bytes.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::{FINGERPRINT_LEN, ProtocolError, SessionFingerprint};

/// Width of a fixed-size unsigned field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    One = 1,
    Two = 2,
    Eight = 8,
}

impl Width {
    pub const fn bytes(self) -> usize {
        self as usize
    }

    /// Largest value representable in this width.
    pub const fn max_value(self) -> u64 {
        match self {
            Width::One => u8::MAX as u64,
            Width::Two => u16::MAX as u64,
            Width::Eight => u64::MAX,
        }
    }
}

/// Encodes `value` as exactly `width` big-endian bytes.
pub fn encode_unsigned(value: u64, width: Width) -> Result<Vec<u8>, ProtocolError> {
    let mut out = Vec::with_capacity(width.bytes());
    put_unsigned(&mut out, value, width)?;
    Ok(out)
}

/// Appends `value` as exactly `width` big-endian bytes.
pub fn put_unsigned(buf: &mut Vec<u8>, value: u64, width: Width) -> Result<(), ProtocolError> {
    if value > width.max_value() {
        return Err(ProtocolError::ValueOverflow {
            value,
            width: width.bytes(),
        });
    }
    let be = value.to_be_bytes();
    buf.extend_from_slice(&be[be.len() - width.bytes()..]);
    Ok(())
}

/// Decodes the first `width` bytes of `bytes` as a big-endian unsigned value.
pub fn decode_unsigned(bytes: &[u8], width: Width) -> Result<u64, ProtocolError> {
    let n = width.bytes();
    if bytes.len() < n {
        return Err(ProtocolError::Truncated {
            field: "unsigned",
            expected: n,
        });
    }
    let mut be = [0u8; 8];
    be[8 - n..].copy_from_slice(&bytes[..n]);
    Ok(u64::from_be_bytes(be))
}

/// Appends `s` with a length prefix of the given width.
///
/// `field` names the value in the error when it is too long.
pub fn put_str(
    buf: &mut Vec<u8>,
    s: &str,
    width: Width,
    field: &'static str,
) -> Result<(), ProtocolError> {
    let bytes = s.as_bytes();
    if bytes.len() as u64 > width.max_value() {
        return Err(ProtocolError::StringTooLong {
            field,
            len: bytes.len(),
            max: width.max_value(),
        });
    }
    put_unsigned(buf, bytes.len() as u64, width)?;
    buf.extend_from_slice(bytes);
    Ok(())
}

/// Reads a fixed-width unsigned value.
pub async fn read_unsigned<R: AsyncRead + Unpin>(
    reader: &mut R,
    width: Width,
    field: &'static str,
) -> Result<u64, ProtocolError> {
    let mut buf = [0u8; 8];
    let n = width.bytes();
    reader
        .read_exact(&mut buf[..n])
        .await
        .map_err(|e| ProtocolError::from_read(e, field, n))?;
    decode_unsigned(&buf[..n], width)
}

/// Reads a length-prefixed UTF-8 string.
pub async fn read_str<R: AsyncRead + Unpin>(
    reader: &mut R,
    width: Width,
    field: &'static str,
) -> Result<String, ProtocolError> {
    let len = read_unsigned(reader, width, field).await? as usize;
    let mut raw = vec![0u8; len];
    reader
        .read_exact(&mut raw)
        .await
        .map_err(|e| ProtocolError::from_read(e, field, len))?;
    String::from_utf8(raw).map_err(|source| ProtocolError::InvalidUtf8 { field, source })
}

/// Reads the single status byte answering a request.
pub async fn read_status<R: AsyncRead + Unpin>(reader: &mut R) -> Result<u8, ProtocolError> {
    Ok(read_unsigned(reader, Width::One, "status").await? as u8)
}

/// Reads the 32-byte TLS session fingerprint.
pub async fn read_fingerprint<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<SessionFingerprint, ProtocolError> {
    let mut raw = [0u8; FINGERPRINT_LEN];
    reader
        .read_exact(&mut raw)
        .await
        .map_err(|e| ProtocolError::from_read(e, "fingerprint", FINGERPRINT_LEN))?;
    Ok(SessionFingerprint(raw))
}
