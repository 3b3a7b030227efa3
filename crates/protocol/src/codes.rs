//! Control codes and request flag bits.
//!
//! A request byte packs the operation code in its low [`CODE_BITS`] bits
//! and up to [`FLAG_BITS`] boolean flags in the high bits:
//!
//! ```text
//!   7   6   5   4   3   2   1   0
//! [ f2  f1  f0 | c4  c3  c2  c1  c0 ]
//! ```

use crate::ProtocolError;

/// Number of low bits holding the operation code.
pub const CODE_BITS: u32 = 5;

/// Number of high bits available for request flags.
pub const FLAG_BITS: u32 = 3;

/// Mask selecting the operation code from a request byte.
pub const CODE_MASK: u8 = (1 << CODE_BITS) - 1;

/// Upload flags marking a batch of local content handles whose descriptors
/// follow on the auxiliary channel.
pub const CONTENT_HANDLE_BATCH: u8 = 0b111;

/// Operation identifiers understood by the roothelper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ControlCode {
    Ls = 0x01,
    Move = 0x02,
    Copy = 0x03,
    Delete = 0x04,
    Stats = 0x05,
    Compress = 0x06,
    Extract = 0x07,
    Exists = 0x08,
    Create = 0x09,
    Hash = 0x0A,
    Find = 0x0B,
    Kill = 0x0C,
    GetPid = 0x0D,
    Fork = 0x0E,
    FileIo = 0x0F,
    RemoteServerManagement = 0x10,
    RemoteConnect = 0x11,
    Upload = 0x12,
    Download = 0x13,
}

impl ControlCode {
    /// Raw 5-bit code value.
    pub const fn value(self) -> u8 {
        self as u8
    }

    /// Request byte with `flags` placed in the high bits.
    ///
    /// Only the lowest [`FLAG_BITS`] bits of `flags` are used.
    pub const fn with_flags(self, flags: u8) -> u8 {
        self.value() ^ ((flags & 0b111) << CODE_BITS)
    }
}

impl TryFrom<u8> for ControlCode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        use ControlCode::*;
        Ok(match value {
            0x01 => Ls,
            0x02 => Move,
            0x03 => Copy,
            0x04 => Delete,
            0x05 => Stats,
            0x06 => Compress,
            0x07 => Extract,
            0x08 => Exists,
            0x09 => Create,
            0x0A => Hash,
            0x0B => Find,
            0x0C => Kill,
            0x0D => GetPid,
            0x0E => Fork,
            0x0F => FileIo,
            0x10 => RemoteServerManagement,
            0x11 => RemoteConnect,
            0x12 => Upload,
            0x13 => Download,
            other => return Err(ProtocolError::UnknownControlCode(other)),
        })
    }
}

/// Flag triple carried by an exists request: which properties to test.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExistsFlags {
    pub exists: bool,
    pub is_file: bool,
    pub is_dir: bool,
}

impl ExistsFlags {
    /// Packs the flags into the 3-bit field, `exists` in bit 0.
    pub const fn bits(self) -> u8 {
        (self.exists as u8) | ((self.is_file as u8) << 1) | ((self.is_dir as u8) << 2)
    }

    pub const fn from_bits(bits: u8) -> Self {
        Self {
            exists: bits & 0b001 != 0,
            is_file: bits & 0b010 != 0,
            is_dir: bits & 0b100 != 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_batch_byte() {
        let byte = ControlCode::Upload.with_flags(CONTENT_HANDLE_BATCH);
        assert_eq!(byte, 0x12 | 0b1110_0000);
        assert_eq!(
            ControlCode::try_from(byte & CODE_MASK).unwrap(),
            ControlCode::Upload
        );
        assert_eq!(byte >> CODE_BITS, CONTENT_HANDLE_BATCH);
    }

    #[test]
    fn no_flags_is_plain_code() {
        assert_eq!(ControlCode::RemoteConnect.with_flags(0), 0x11);
        assert_eq!(ControlCode::Download.with_flags(0), 0x13);
    }

    #[test]
    fn flags_are_masked_to_three_bits() {
        assert_eq!(
            ControlCode::Copy.with_flags(0xFF),
            ControlCode::Copy.with_flags(0b111)
        );
    }

    #[test]
    fn every_code_fits_in_five_bits() {
        for raw in 0u8..=CODE_MASK {
            if let Ok(code) = ControlCode::try_from(raw) {
                assert_eq!(code.value(), raw);
                assert_eq!(code.value() & !CODE_MASK, 0);
            }
        }
    }

    #[test]
    fn unknown_code_rejected() {
        assert!(matches!(
            ControlCode::try_from(0x00),
            Err(ProtocolError::UnknownControlCode(0x00))
        ));
        assert!(ControlCode::try_from(0x1F).is_err());
    }

    #[test]
    fn exists_flags_bits() {
        let flags = ExistsFlags {
            exists: true,
            is_file: false,
            is_dir: true,
        };
        assert_eq!(flags.bits(), 0b101);
        assert_eq!(ExistsFlags::from_bits(0b101), flags);
        assert_eq!(
            ControlCode::Exists.with_flags(flags.bits()),
            0x08 | 0b1010_0000
        );
    }
}
