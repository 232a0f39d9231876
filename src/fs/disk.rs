//! Block-addressed access to the backing store.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use log::{debug, error};

use crate::config::{BLOCK_SIZE, FAT_BLOCK_COUNT, ROOT_BLOCK};
use crate::error::{FsError, FsResult};

/// Index of a block on the device. Byte offsets only exist inside device
/// implementations.
pub type BlockId = u32;

pub type Block = [u8; BLOCK_SIZE];

/// A fixed-size array of blocks. Transfers are always whole blocks.
pub trait BlockDevice {
    fn read_block(&self, index: BlockId) -> FsResult<Block>;
    fn write_block(&mut self, index: BlockId, block: &Block) -> FsResult<()>;
    /// Total number of blocks, FAT region included.
    fn block_count(&self) -> FsResult<u32>;
}

/// A flat image file. Every transfer opens the file, moves exactly one
/// block and closes it again; no handle survives between calls.
#[derive(Debug, Clone)]
pub struct FileDisk {
    path: PathBuf,
}

impl FileDisk {
    /// Attaches to an existing image.
    pub fn open(path: impl Into<PathBuf>) -> FsResult<Self> {
        let disk = Self { path: path.into() };
        let blocks = disk.block_count()?;
        check_geometry(blocks)?;
        debug!("attached {} ({} blocks)", disk.path.display(), blocks);
        Ok(disk)
    }

    /// Creates a zero-filled image of `size` bytes, replacing any existing
    /// file at `path`. A zeroed image is already a valid empty filesystem.
    pub fn create(path: impl Into<PathBuf>, size: u64) -> FsResult<Self> {
        let path = path.into();
        if size % BLOCK_SIZE as u64 != 0 {
            return Err(invalid_image(format!(
                "image size {} is not a multiple of {}",
                size, BLOCK_SIZE
            )));
        }
        check_geometry(blocks_in(size)?)?;
        let file = File::create(&path)?;
        file.set_len(size)?;
        debug!("created {} ({} bytes)", path.display(), size);
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open_at(&self, index: BlockId, write: bool) -> io::Result<File> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(write)
            .open(&self.path)?;
        file.seek(SeekFrom::Start(index as u64 * BLOCK_SIZE as u64))?;
        Ok(file)
    }
}

impl BlockDevice for FileDisk {
    fn read_block(&self, index: BlockId) -> FsResult<Block> {
        let mut block = [0u8; BLOCK_SIZE];
        let result = self
            .open_at(index, false)
            .and_then(|mut file| file.read_exact(&mut block));
        if let Err(e) = result {
            error!("read of block {} from {} failed: {}", index, self.path.display(), e);
            return Err(e.into());
        }
        Ok(block)
    }

    fn write_block(&mut self, index: BlockId, block: &Block) -> FsResult<()> {
        if index >= self.block_count()? {
            return Err(FsError::Corrupted(format!("block {} is past the end of the image", index)));
        }
        let result = self
            .open_at(index, true)
            .and_then(|mut file| file.write_all(block));
        if let Err(e) = result {
            error!("write of block {} to {} failed: {}", index, self.path.display(), e);
            return Err(e.into());
        }
        Ok(())
    }

    fn block_count(&self) -> FsResult<u32> {
        blocks_in(std::fs::metadata(&self.path)?.len())
    }
}

/// An image held in memory.
#[derive(Debug, Clone)]
pub struct RamDisk {
    data: Vec<u8>,
}

impl RamDisk {
    pub fn new(blocks: u32) -> FsResult<Self> {
        check_geometry(blocks)?;
        Ok(Self {
            data: vec![0; blocks as usize * BLOCK_SIZE],
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    fn range(&self, index: BlockId) -> FsResult<std::ops::Range<usize>> {
        let start = index as usize * BLOCK_SIZE;
        if start + BLOCK_SIZE > self.data.len() {
            return Err(FsError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("block {} is past the end of the image", index),
            )));
        }
        Ok(start..start + BLOCK_SIZE)
    }
}

impl BlockDevice for RamDisk {
    fn read_block(&self, index: BlockId) -> FsResult<Block> {
        let range = self.range(index)?;
        let mut block = [0u8; BLOCK_SIZE];
        block.copy_from_slice(&self.data[range]);
        Ok(block)
    }

    fn write_block(&mut self, index: BlockId, block: &Block) -> FsResult<()> {
        let range = self.range(index)?;
        self.data[range].copy_from_slice(block);
        Ok(())
    }

    fn block_count(&self) -> FsResult<u32> {
        Ok((self.data.len() / BLOCK_SIZE) as u32)
    }
}

/// Writes an empty root block and clears the whole FAT region.
pub fn format<D: BlockDevice>(device: &mut D) -> FsResult<()> {
    let blocks = device.block_count()?;
    check_geometry(blocks)?;
    let zero = [0u8; BLOCK_SIZE];
    device.write_block(ROOT_BLOCK, &zero)?;
    for index in blocks - FAT_BLOCK_COUNT as u32..blocks {
        device.write_block(index, &zero)?;
    }
    debug!("formatted {} blocks", blocks);
    Ok(())
}

/// The root block, at least one allocable block and the FAT region must fit.
fn check_geometry(blocks: u32) -> FsResult<()> {
    if (blocks as usize) < FAT_BLOCK_COUNT + 2 {
        return Err(invalid_image(format!(
            "{} blocks cannot hold the root block, a data block and the FAT",
            blocks
        )));
    }
    Ok(())
}

fn blocks_in(bytes: u64) -> FsResult<u32> {
    u32::try_from(bytes / BLOCK_SIZE as u64)
        .map_err(|_| invalid_image(format!("image of {} bytes has too many blocks", bytes)))
}

fn invalid_image(msg: String) -> FsError {
    FsError::Io(io::Error::new(io::ErrorKind::InvalidInput, msg))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_disk_round_trips_blocks() {
        let dir = tempdir().unwrap();
        let mut disk = FileDisk::create(dir.path().join(".disk"), 64 * BLOCK_SIZE as u64).unwrap();
        assert_eq!(disk.block_count().unwrap(), 64);

        let mut block = [0u8; BLOCK_SIZE];
        block[0] = 0xAA;
        block[BLOCK_SIZE - 1] = 0x55;
        disk.write_block(3, &block).unwrap();

        assert_eq!(disk.read_block(3).unwrap(), block);
        assert_eq!(disk.read_block(2).unwrap(), [0u8; BLOCK_SIZE]);

        let raw = std::fs::read(disk.path()).unwrap();
        assert_eq!(raw[3 * BLOCK_SIZE], 0xAA);
        assert_eq!(raw[4 * BLOCK_SIZE - 1], 0x55);
    }

    #[test]
    fn file_disk_rejects_transfers_past_the_end() {
        let dir = tempdir().unwrap();
        let mut disk = FileDisk::create(dir.path().join(".disk"), 64 * BLOCK_SIZE as u64).unwrap();
        assert!(matches!(disk.read_block(64), Err(FsError::Io(_))));
        assert!(disk.write_block(64, &[0u8; BLOCK_SIZE]).is_err());
        assert_eq!(std::fs::metadata(disk.path()).unwrap().len(), 64 * BLOCK_SIZE as u64);
    }

    #[test]
    fn missing_image_is_an_io_error() {
        let dir = tempdir().unwrap();
        assert!(matches!(FileDisk::open(dir.path().join("nope")), Err(FsError::Io(_))));
    }

    #[test]
    fn create_rejects_bad_sizes() {
        let dir = tempdir().unwrap();
        assert!(FileDisk::create(dir.path().join("a"), 1000).is_err());
        assert!(FileDisk::create(dir.path().join("b"), 41 * BLOCK_SIZE as u64).is_err());

        let huge = BLOCK_SIZE as u64 * ((1u64 << 32) + 100);
        assert!(matches!(FileDisk::create(dir.path().join("c"), huge), Err(FsError::Io(_))));
        assert!(!dir.path().join("c").exists());
    }

    #[test]
    fn format_clears_root_and_fat() {
        let mut disk = RamDisk::new(50).unwrap();
        let dirty = [0xFFu8; BLOCK_SIZE];
        for index in 0..50 {
            disk.write_block(index, &dirty).unwrap();
        }
        format(&mut disk).unwrap();

        assert_eq!(disk.read_block(0).unwrap(), [0u8; BLOCK_SIZE]);
        assert_eq!(disk.read_block(1).unwrap(), dirty);
        assert_eq!(disk.read_block(9).unwrap(), dirty);
        for index in 10..50 {
            assert_eq!(disk.read_block(index).unwrap(), [0u8; BLOCK_SIZE]);
        }
    }
}
