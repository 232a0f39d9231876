use std::path::PathBuf;

use bitflags::bitflags;
use log::debug;

use crate::error::{FsError, FsResult};
use crate::fs::Volume;
use crate::fs::disk::{BlockDevice, FileDisk};
use crate::fs::path::FsPath;
use crate::sync::Mutex;

bitflags! {
    /// `st_mode` bits reported by `getattr`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FileMode: u32 {
        const DIRECTORY = 0o040000;
        const REGULAR = 0o100000;
        const OWNER_READ = 0o400;
        const OWNER_WRITE = 0o200;
        const OWNER_EXEC = 0o100;
        const GROUP_READ = 0o040;
        const GROUP_WRITE = 0o020;
        const GROUP_EXEC = 0o010;
        const OTHER_READ = 0o004;
        const OTHER_WRITE = 0o002;
        const OTHER_EXEC = 0o001;
    }
}

impl FileMode {
    /// `drwxr-xr-x`
    pub fn directory() -> Self {
        Self::DIRECTORY
            | Self::OWNER_READ
            | Self::OWNER_WRITE
            | Self::OWNER_EXEC
            | Self::GROUP_READ
            | Self::GROUP_EXEC
            | Self::OTHER_READ
            | Self::OTHER_EXEC
    }

    /// `-rw-rw-rw-`
    pub fn regular() -> Self {
        Self::REGULAR
            | Self::OWNER_READ
            | Self::OWNER_WRITE
            | Self::GROUP_READ
            | Self::GROUP_WRITE
            | Self::OTHER_READ
            | Self::OTHER_WRITE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Root,
    Directory,
    File,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    pub file_type: FileType,
    pub mode: FileMode,
    pub nlink: u32,
    /// Byte size for files, 0 for directories.
    pub size: u64,
}

impl Metadata {
    fn directory(file_type: FileType) -> Self {
        Self {
            file_type,
            mode: FileMode::directory(),
            nlink: 2,
            size: 0,
        }
    }

    fn file(size: u64) -> Self {
        Self {
            file_type: FileType::File,
            mode: FileMode::regular(),
            nlink: 2,
            size,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.file_type != FileType::File
    }
}

/// The path-based operations an OS filesystem adapter dispatches into.
///
/// Each call takes the device lock for its whole duration, so callers on
/// different threads are serialized; within a call every block is re-read
/// from the device.
pub struct Fat83Fs<D: BlockDevice> {
    device: Mutex<D>,
}

impl Fat83Fs<FileDisk> {
    /// Mounts an existing image file.
    pub fn open_image(path: impl Into<PathBuf>) -> FsResult<Self> {
        Ok(Self::new(FileDisk::open(path)?))
    }
}

impl<D: BlockDevice> Fat83Fs<D> {
    pub fn new(device: D) -> Self {
        Self {
            device: Mutex::new(device),
        }
    }

    pub fn into_inner(self) -> D {
        self.device.into_inner()
    }

    fn with_volume<T>(&self, op: impl FnOnce(&mut Volume<'_, D>) -> FsResult<T>) -> FsResult<T> {
        let mut device = self.device.lock();
        let mut volume = Volume::new(&mut *device)?;
        op(&mut volume)
    }

    pub fn getattr(&self, path: &str) -> FsResult<Metadata> {
        debug!("getattr {}", path);
        let target = FsPath::parse(path)?;
        self.with_volume(|v| match target {
            FsPath::Root => Ok(Metadata::directory(FileType::Root)),
            FsPath::Directory { dir } => {
                if v.directory_exists(&dir)? {
                    Ok(Metadata::directory(FileType::Directory))
                } else {
                    Err(FsError::NotFound)
                }
            }
            FsPath::File { dir, name, ext } => v
                .file_exists(&dir, &name, &ext)?
                .map(Metadata::file)
                .ok_or(FsError::NotFound),
        })
    }

    /// Entry names of the root or a directory, `.` and `..` first.
    pub fn readdir(&self, path: &str) -> FsResult<Vec<String>> {
        debug!("readdir {}", path);
        let target = FsPath::parse(path)?;
        self.with_volume(|v| {
            let mut names = vec![String::from("."), String::from("..")];
            match target {
                FsPath::Root => names.extend(
                    v.load_root()?
                        .dirs
                        .into_iter()
                        .filter(|d| !d.name.is_empty())
                        .map(|d| d.name),
                ),
                FsPath::Directory { dir } => names.extend(
                    v.load_directory(&dir)?
                        .0
                        .files
                        .iter()
                        .filter(|f| !f.name.is_empty())
                        .map(|f| f.display_name()),
                ),
                FsPath::File { .. } => return Err(FsError::NotFound),
            }
            Ok(names)
        })
    }

    pub fn mkdir(&self, path: &str) -> FsResult<()> {
        debug!("mkdir {}", path);
        match FsPath::parse(path)? {
            FsPath::Root => Err(FsError::AlreadyExists),
            FsPath::Directory { dir } => self.with_volume(|v| v.create_directory(&dir).map(|_| ())),
            FsPath::File { .. } => Err(FsError::InvalidPath(String::from(path))),
        }
    }

    pub fn mknod(&self, path: &str) -> FsResult<()> {
        debug!("mknod {}", path);
        match FsPath::parse(path)? {
            FsPath::File { dir, name, ext } => {
                self.with_volume(|v| v.create_file(&dir, &name, &ext).map(|_| ()))
            }
            _ => Err(FsError::InvalidPath(String::from(path))),
        }
    }

    pub fn read(&self, path: &str, offset: u64, length: usize) -> FsResult<Vec<u8>> {
        debug!("read {} offset={} length={}", path, offset, length);
        match FsPath::parse(path)? {
            FsPath::File { dir, name, ext } => {
                self.with_volume(|v| v.read_file(&dir, &name, &ext, offset, length))
            }
            other => Err(self.not_a_file(other)),
        }
    }

    pub fn write(&self, path: &str, offset: u64, data: &[u8]) -> FsResult<usize> {
        debug!("write {} offset={} length={}", path, offset, data.len());
        match FsPath::parse(path)? {
            FsPath::File { dir, name, ext } => {
                self.with_volume(|v| v.write_file(&dir, &name, &ext, offset, data))
            }
            other => Err(self.not_a_file(other)),
        }
    }

    fn not_a_file(&self, target: FsPath) -> FsError {
        match target {
            FsPath::Directory { dir } => match self.with_volume(|v| v.directory_exists(&dir)) {
                Ok(true) => FsError::IsDirectory,
                Ok(false) => FsError::NotFound,
                Err(err) => err,
            },
            _ => FsError::IsDirectory,
        }
    }

    /// Free blocks left in the FAT.
    pub fn free_blocks(&self) -> FsResult<u32> {
        self.with_volume(|v| v.fat().free_count(v.device()))
    }

    // Required by the adapter contract; none of these change anything.

    pub fn open(&self, path: &str) -> FsResult<()> {
        debug!("open {}", path);
        Ok(())
    }

    pub fn flush(&self, path: &str) -> FsResult<()> {
        debug!("flush {}", path);
        Ok(())
    }

    pub fn unlink(&self, path: &str) -> FsResult<()> {
        debug!("unlink {} ignored", path);
        Ok(())
    }

    pub fn rmdir(&self, path: &str) -> FsResult<()> {
        debug!("rmdir {} ignored", path);
        Ok(())
    }

    pub fn truncate(&self, path: &str, size: u64) -> FsResult<()> {
        debug!("truncate {} to {} ignored", path, size);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::disk::RamDisk;

    fn fs() -> Fat83Fs<RamDisk> {
        Fat83Fs::new(RamDisk::new(128).unwrap())
    }

    #[test]
    fn modes_match_unix_octal() {
        assert_eq!(FileMode::directory().bits(), 0o040755);
        assert_eq!(FileMode::regular().bits(), 0o100666);
    }

    #[test]
    fn getattr_classifies() {
        let fs = fs();
        assert_eq!(fs.getattr("/").unwrap().file_type, FileType::Root);
        assert!(matches!(fs.getattr("/docs"), Err(FsError::NotFound)));
        fs.mkdir("/docs").unwrap();
        let meta = fs.getattr("/docs").unwrap();
        assert_eq!(meta.file_type, FileType::Directory);
        assert!(meta.is_dir());

        fs.mknod("/docs/a.txt").unwrap();
        fs.write("/docs/a.txt", 0, b"abc").unwrap();
        let meta = fs.getattr("/docs/a.txt").unwrap();
        assert_eq!(meta.file_type, FileType::File);
        assert_eq!(meta.size, 3);
        assert_eq!(meta.nlink, 2);
        assert!(matches!(fs.getattr("/docs/a"), Err(FsError::NotFound)));
        assert!(matches!(fs.getattr("relative"), Err(FsError::InvalidPath(_))));
    }

    #[test]
    fn path_shape_errors() {
        let fs = fs();
        assert!(matches!(fs.mkdir("/"), Err(FsError::AlreadyExists)));
        assert!(matches!(fs.mkdir("/a/b.txt"), Err(FsError::InvalidPath(_))));
        assert!(matches!(fs.mknod("/"), Err(FsError::InvalidPath(_))));
        assert!(matches!(fs.mknod("/docs"), Err(FsError::InvalidPath(_))));
        assert!(matches!(fs.mknod("/docs/a.txt"), Err(FsError::NotFound)));
        assert!(matches!(fs.readdir("/docs/a.txt"), Err(FsError::NotFound)));
    }

    #[test]
    fn dot_entries_are_not_directories() {
        let fs = fs();
        assert!(matches!(fs.mkdir("/."), Err(FsError::InvalidPath(_))));
        assert!(matches!(fs.mkdir("/.."), Err(FsError::InvalidPath(_))));
        assert!(matches!(fs.mknod("/../a.txt"), Err(FsError::InvalidPath(_))));
        assert_eq!(fs.readdir("/").unwrap(), vec![".", ".."]);
    }

    #[test]
    fn data_ops_on_directories() {
        let fs = fs();
        fs.mkdir("/docs").unwrap();
        assert!(matches!(fs.read("/", 0, 1), Err(FsError::IsDirectory)));
        assert!(matches!(fs.read("/docs", 0, 1), Err(FsError::IsDirectory)));
        assert!(matches!(fs.write("/docs", 0, b"x"), Err(FsError::IsDirectory)));
        assert!(matches!(fs.read("/nodir", 0, 1), Err(FsError::NotFound)));
    }

    #[test]
    fn stubs_succeed_and_change_nothing() {
        let fs = fs();
        fs.mkdir("/docs").unwrap();
        fs.mknod("/docs/a.txt").unwrap();
        fs.write("/docs/a.txt", 0, b"keep").unwrap();

        fs.open("/docs/a.txt").unwrap();
        fs.flush("/docs/a.txt").unwrap();
        fs.truncate("/docs/a.txt", 0).unwrap();
        fs.unlink("/docs/a.txt").unwrap();
        fs.rmdir("/docs").unwrap();
        fs.open("/missing/file").unwrap();

        assert_eq!(fs.read("/docs/a.txt", 0, 10).unwrap(), b"keep");
        assert_eq!(fs.readdir("/").unwrap(), vec![".", "..", "docs"]);
    }

    #[test]
    fn free_blocks_drop_with_use() {
        let fs = fs();
        let before = fs.free_blocks().unwrap();
        assert_eq!(before, 128 - 40 - 1);
        fs.mkdir("/docs").unwrap();
        fs.mknod("/docs/a").unwrap();
        assert_eq!(fs.free_blocks().unwrap(), before - 2);
    }
}
