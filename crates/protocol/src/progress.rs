//! Progress telemetry read back from the control stream.
//!
//! Every value is a bare 8-byte unsigned integer. Its meaning depends on
//! where the reader is in the transfer; only the two sentinels below carry
//! a fixed meaning.

use tokio::io::AsyncRead;

use crate::ProtocolError;
use crate::codec::{Width, read_unsigned};

/// End of the file currently in flight.
pub const EOF: u64 = u64::MAX;

/// End of all files in the request.
pub const EOFS: u64 = u64::MAX - 1;

/// A decoded progress value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressSignal {
    /// A count, a size or a progress offset, depending on context.
    Value(u64),
    EndOfFile,
    EndOfFiles,
}

impl From<u64> for ProgressSignal {
    fn from(raw: u64) -> Self {
        match raw {
            EOF => ProgressSignal::EndOfFile,
            EOFS => ProgressSignal::EndOfFiles,
            v => ProgressSignal::Value(v),
        }
    }
}

impl From<ProgressSignal> for u64 {
    fn from(signal: ProgressSignal) -> Self {
        match signal {
            ProgressSignal::Value(v) => v,
            ProgressSignal::EndOfFile => EOF,
            ProgressSignal::EndOfFiles => EOFS,
        }
    }
}

/// Reads one raw 8-byte value (file count, total size).
pub async fn read_value<R: AsyncRead + Unpin>(
    reader: &mut R,
    field: &'static str,
) -> Result<u64, ProtocolError> {
    read_unsigned(reader, Width::Eight, field).await
}

/// Reads one value and classifies it against the sentinels.
pub async fn read_signal<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<ProgressSignal, ProtocolError> {
    Ok(read_value(reader, "progress").await?.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_are_distinct() {
        assert_ne!(EOF, EOFS);
        assert_eq!(ProgressSignal::from(EOF), ProgressSignal::EndOfFile);
        assert_eq!(ProgressSignal::from(EOFS), ProgressSignal::EndOfFiles);
        assert_eq!(ProgressSignal::from(0), ProgressSignal::Value(0));
        assert_eq!(
            ProgressSignal::from(u64::MAX - 2),
            ProgressSignal::Value(u64::MAX - 2)
        );
    }

    #[tokio::test]
    async fn read_sequence() {
        let mut data = Vec::new();
        for v in [2u64, 300, EOF, EOFS] {
            data.extend_from_slice(&v.to_be_bytes());
        }
        let mut cursor = &data[..];
        assert_eq!(read_value(&mut cursor, "count").await.unwrap(), 2);
        assert_eq!(
            read_signal(&mut cursor).await.unwrap(),
            ProgressSignal::Value(300)
        );
        assert_eq!(
            read_signal(&mut cursor).await.unwrap(),
            ProgressSignal::EndOfFile
        );
        assert_eq!(
            read_signal(&mut cursor).await.unwrap(),
            ProgressSignal::EndOfFiles
        );
        assert!(read_signal(&mut cursor).await.is_err());
    }
}
