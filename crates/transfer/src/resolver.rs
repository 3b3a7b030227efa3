//! Access to local content handles for descriptor-streaming uploads.

use std::fmt;
use std::fs::File;
use std::io;
use std::os::fd::OwnedFd;
use std::path::PathBuf;

/// Resolves opaque content handles into a name, a size and an open
/// descriptor.
pub trait ContentResolver: Send + Sync {
    type Handle: fmt::Debug + Send + Sync;

    /// Name the content is stored under at the destination.
    fn display_name(&self, handle: &Self::Handle) -> io::Result<String>;

    fn size(&self, handle: &Self::Handle) -> io::Result<u64>;

    /// Opens the content for reading.
    fn open(&self, handle: &Self::Handle) -> io::Result<OwnedFd>;
}

/// Resolves handles that are plain filesystem paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsContentResolver;

impl ContentResolver for FsContentResolver {
    type Handle = PathBuf;

    fn display_name(&self, handle: &PathBuf) -> io::Result<String> {
        handle
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("{} has no file name", handle.display()),
                )
            })
    }

    fn size(&self, handle: &PathBuf) -> io::Result<u64> {
        Ok(std::fs::metadata(handle)?.len())
    }

    fn open(&self, handle: &PathBuf) -> io::Result<OwnedFd> {
        Ok(OwnedFd::from(File::open(handle)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn fs_resolver_reports_name_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("photo.jpg");
        File::create(&path).unwrap().write_all(&[0u8; 1234]).unwrap();

        let resolver = FsContentResolver;
        assert_eq!(resolver.display_name(&path).unwrap(), "photo.jpg");
        assert_eq!(resolver.size(&path).unwrap(), 1234);
        assert!(resolver.open(&path).is_ok());
    }

    #[test]
    fn fs_resolver_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gone");
        let resolver = FsContentResolver;
        assert_eq!(
            resolver.size(&path).unwrap_err().kind(),
            io::ErrorKind::NotFound
        );
        assert!(resolver.open(&path).is_err());
    }

    #[test]
    fn fs_resolver_rejects_root() {
        assert!(FsContentResolver.display_name(&PathBuf::from("/")).is_err());
    }
}
