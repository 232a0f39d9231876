//! Root and directory blocks: lookup and creation.
//!
//! Nothing is cached; every call reads the authoritative blocks again.

use log::debug;

use crate::config::{BLOCK_SIZE, MAX_EXTENSION, MAX_FILENAME, ROOT_BLOCK};
use crate::error::{FsError, FsResult};
use crate::fs::Volume;
use crate::fs::disk::{BlockDevice, BlockId};
use crate::fs::layout::{DirRecord, DirectoryBlock, FileRecord, RootBlock};

impl<D: BlockDevice> Volume<'_, D> {
    pub fn load_root(&self) -> FsResult<RootBlock> {
        RootBlock::decode(&self.device.read_block(ROOT_BLOCK)?)
    }

    pub fn directory_exists(&self, name: &str) -> FsResult<bool> {
        Ok(self.load_root()?.find(name).is_some())
    }

    /// The directory block of `name` and the block it lives in.
    pub fn load_directory(&self, name: &str) -> FsResult<(DirectoryBlock, BlockId)> {
        let start = self.load_root()?.find(name).ok_or(FsError::NotFound)?.start;
        let dir = DirectoryBlock::decode(&self.device.read_block(start)?)?;
        Ok((dir, start))
    }

    pub fn create_directory(&mut self, name: &str) -> FsResult<BlockId> {
        check_name(name, MAX_FILENAME)?;
        let mut root = self.load_root()?;
        if root.find(name).is_some() {
            return Err(FsError::AlreadyExists);
        }
        if root.is_full() {
            return Err(FsError::CapacityExceeded);
        }

        let start = self.fat.allocate(&mut *self.device)?;
        // The directory block goes down before the root references it.
        self.device.write_block(start, &DirectoryBlock::default().encode())?;
        root.dirs.push(DirRecord {
            name: String::from(name),
            start,
        });
        self.device.write_block(ROOT_BLOCK, &root.encode())?;
        debug!("mkdir {} at block {}", name, start);
        Ok(start)
    }

    /// The recorded size of the file, if it exists.
    pub fn file_exists(&self, dir: &str, name: &str, ext: &str) -> FsResult<Option<u64>> {
        let Some(record) = self.load_root()?.find(dir).cloned() else {
            return Ok(None);
        };
        let block = DirectoryBlock::decode(&self.device.read_block(record.start)?)?;
        Ok(block.find(name, ext).map(|f| f.size))
    }

    pub fn lookup_file(&self, dir: &str, name: &str, ext: &str) -> FsResult<FileRecord> {
        let (block, _) = self.load_directory(dir)?;
        block.find(name, ext).cloned().ok_or(FsError::NotFound)
    }

    pub fn create_file(&mut self, dir: &str, name: &str, ext: &str) -> FsResult<BlockId> {
        check_name(name, MAX_FILENAME)?;
        if ext.len() > MAX_EXTENSION {
            return Err(FsError::NameTooLong);
        }
        let (mut block, dir_start) = self.load_directory(dir)?;
        if block.find(name, ext).is_some() {
            return Err(FsError::AlreadyExists);
        }
        if block.is_full() {
            return Err(FsError::CapacityExceeded);
        }

        let start = self.fat.allocate(&mut *self.device)?;
        self.device.write_block(start, &[0u8; BLOCK_SIZE])?;
        block.files.push(FileRecord {
            name: String::from(name),
            ext: String::from(ext),
            size: 0,
            start,
        });
        self.device.write_block(dir_start, &block.encode())?;
        debug!("mknod {}/{}.{} at block {}", dir, name, ext, start);
        Ok(start)
    }

    pub fn set_file_size(&mut self, dir: &str, name: &str, ext: &str, size: u64) -> FsResult<()> {
        let (mut block, dir_start) = self.load_directory(dir)?;
        block.find_mut(name, ext).ok_or(FsError::NotFound)?.size = size;
        self.device.write_block(dir_start, &block.encode())
    }
}

fn check_name(name: &str, max: usize) -> FsResult<()> {
    if name.is_empty() {
        return Err(FsError::InvalidPath(String::from("empty name")));
    }
    if name.len() > max {
        return Err(FsError::NameTooLong);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MAX_DIRS_IN_ROOT, MAX_FILES_IN_DIR};
    use crate::fs::disk::RamDisk;

    fn with_volume(test: impl FnOnce(&mut Volume<'_, RamDisk>)) {
        let mut disk = RamDisk::new(200).unwrap();
        let mut volume = Volume::new(&mut disk).unwrap();
        test(&mut volume);
    }

    #[test]
    fn create_directory_uses_first_free_block() {
        with_volume(|v| {
            assert_eq!(v.create_directory("docs").unwrap(), 1);
            assert_eq!(v.fat.entry(&*v.device, 1).unwrap(), -1);
            let root = v.load_root().unwrap();
            assert_eq!(root.dirs, vec![DirRecord { name: String::from("docs"), start: 1 }]);
            let (dir, start) = v.load_directory("docs").unwrap();
            assert!(dir.files.is_empty());
            assert_eq!(start, 1);
        });
    }

    #[test]
    fn create_directory_errors() {
        with_volume(|v| {
            assert!(matches!(v.create_directory("ninechars"), Err(FsError::NameTooLong)));
            v.create_directory("docs").unwrap();
            assert!(matches!(v.create_directory("docs"), Err(FsError::AlreadyExists)));
            assert!(matches!(v.create_directory(""), Err(FsError::InvalidPath(_))));
            assert!(!v.directory_exists("ninechars").unwrap());
        });
    }

    #[test]
    fn root_capacity_is_enforced() {
        with_volume(|v| {
            for i in 0..MAX_DIRS_IN_ROOT {
                v.create_directory(&format!("d{}", i)).unwrap();
            }
            assert!(matches!(v.create_directory("extra"), Err(FsError::CapacityExceeded)));
            assert_eq!(v.load_root().unwrap().dirs.len(), MAX_DIRS_IN_ROOT);
        });
    }

    #[test]
    fn create_file_records_zero_size() {
        with_volume(|v| {
            v.create_directory("docs").unwrap();
            let start = v.create_file("docs", "a", "txt").unwrap();
            assert_eq!(start, 2);
            assert_eq!(v.file_exists("docs", "a", "txt").unwrap(), Some(0));
            assert_eq!(v.file_exists("docs", "a", "").unwrap(), None);
            assert_eq!(v.file_exists("nodir", "a", "txt").unwrap(), None);

            v.create_file("docs", "a", "").unwrap();
            assert_eq!(v.file_exists("docs", "a", "").unwrap(), Some(0));
        });
    }

    #[test]
    fn create_file_errors() {
        with_volume(|v| {
            assert!(matches!(v.create_file("docs", "a", "txt"), Err(FsError::NotFound)));
            v.create_directory("docs").unwrap();
            assert!(matches!(v.create_file("docs", "ninechars", "txt"), Err(FsError::NameTooLong)));
            assert!(matches!(v.create_file("docs", "a", "text"), Err(FsError::NameTooLong)));
            v.create_file("docs", "a", "txt").unwrap();
            assert!(matches!(v.create_file("docs", "a", "txt"), Err(FsError::AlreadyExists)));

            for i in 1..MAX_FILES_IN_DIR {
                v.create_file("docs", &format!("f{}", i), "").unwrap();
            }
            assert!(matches!(v.create_file("docs", "full", ""), Err(FsError::CapacityExceeded)));
        });
    }

    #[test]
    fn set_file_size_persists() {
        with_volume(|v| {
            v.create_directory("docs").unwrap();
            v.create_file("docs", "a", "txt").unwrap();
            v.set_file_size("docs", "a", "txt", 1234).unwrap();
            assert_eq!(v.lookup_file("docs", "a", "txt").unwrap().size, 1234);
            assert!(matches!(v.set_file_size("docs", "b", "txt", 1), Err(FsError::NotFound)));
        });
    }
}
