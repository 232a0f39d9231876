//! fat83fs - a two-level FAT filesystem stored in a flat image file.
//!
//! Block 0 holds the root directory, the last 40 blocks hold the file
//! allocation table, and everything in between is allocated on demand to
//! directory blocks and file data. Names follow the 8.3 convention and the
//! hierarchy is exactly `/DIR/NAME.EXT`.
//!
//! [`Fat83Fs`] exposes the path-based operations a userspace filesystem
//! adapter needs; the modules under [`fs`] implement the layers beneath it.

pub mod config;
pub mod error;
pub mod fs;
mod sync;

pub use error::{FsError, FsResult};
pub use fs::{BlockDevice, Fat83Fs, FileDisk, FileMode, FileType, Metadata, RamDisk, format};
