//! Unified error types for the filesystem core.
//!
//! Every operation returns `FsResult<T>`. Errors are surfaced to the caller
//! immediately; nothing is retried, since the backing store is a local file.
//!
//! ## Usage Examples
//!
//! Propagating from the device layer:
//! ```ignore
//! let block = device.read_block(index)?;
//! ```
//!
//! Translating for an OS-facing adapter:
//! ```ignore
//! match fs.getattr(path) {
//!     Ok(meta) => reply(meta),
//!     Err(err) => reply_error(err.errno()),
//! }
//! ```

use thiserror::Error;

/// Result type alias used by every filesystem operation.
pub type FsResult<T> = Result<T, FsError>;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("no such file or directory")]
    NotFound,
    #[error("entry already exists")]
    AlreadyExists,
    #[error("name exceeds the 8.3 limits")]
    NameTooLong,
    #[error("record table is full")]
    CapacityExceeded,
    #[error("no free block left in the FAT")]
    DiskFull,
    #[error("offset {offset} is past the end of a {size}-byte file")]
    OffsetBeyondEnd { offset: u64, size: u64 },
    #[error("malformed path: {0}")]
    InvalidPath(String),
    #[error("is a directory")]
    IsDirectory,
    #[error("corrupted filesystem: {0}")]
    Corrupted(String),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

// POSIX errno values for Linux.
const ENOENT: i32 = 2;
const EIO: i32 = 5;
const EEXIST: i32 = 17;
const EISDIR: i32 = 21;
const EINVAL: i32 = 22;
const EFBIG: i32 = 27;
const ENOSPC: i32 = 28;
const ENAMETOOLONG: i32 = 36;

impl FsError {
    /// Nearest OS error code, as a positive errno.
    pub fn errno(&self) -> i32 {
        match self {
            FsError::NotFound => ENOENT,
            FsError::AlreadyExists => EEXIST,
            FsError::NameTooLong => ENAMETOOLONG,
            FsError::CapacityExceeded | FsError::DiskFull => ENOSPC,
            FsError::OffsetBeyondEnd { .. } => EFBIG,
            FsError::InvalidPath(_) => EINVAL,
            FsError::IsDirectory => EISDIR,
            FsError::Corrupted(_) | FsError::Io(_) => EIO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_mapping() {
        assert_eq!(FsError::NotFound.errno(), ENOENT);
        assert_eq!(FsError::DiskFull.errno(), ENOSPC);
        assert_eq!(FsError::CapacityExceeded.errno(), ENOSPC);
        assert_eq!(FsError::OffsetBeyondEnd { offset: 9, size: 3 }.errno(), EFBIG);
        let io = std::io::Error::new(std::io::ErrorKind::Other, "gone");
        assert_eq!(FsError::from(io).errno(), EIO);
    }

    #[test]
    fn display_includes_detail() {
        let err = FsError::OffsetBeyondEnd { offset: 12, size: 4 };
        assert_eq!(err.to_string(), "offset 12 is past the end of a 4-byte file");
    }
}
