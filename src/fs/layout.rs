//! Byte-exact encoding of the root and directory blocks.
//!
//! Both blocks start with a little-endian `i32` record count followed by a
//! packed array of fixed-width records; whatever is left of the block is
//! zero. Names are nul-padded. Start blocks are stored as `i64` and file
//! sizes as `u64`, matching an LP64 `long` and `size_t`.

use crate::config::{
    BLOCK_SIZE, COUNT_SIZE, DIR_RECORD_SIZE, EXT_FIELD_SIZE, FILE_RECORD_SIZE, MAX_DIRS_IN_ROOT,
    MAX_FILES_IN_DIR, NAME_FIELD_SIZE, POINTER_SIZE, SIZE_FIELD_SIZE,
};
use crate::error::{FsError, FsResult};
use crate::fs::disk::{Block, BlockId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirRecord {
    pub name: String,
    pub start: BlockId,
}

/// Block 0: the list of subdirectories, in creation order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RootBlock {
    pub dirs: Vec<DirRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub name: String,
    pub ext: String,
    pub size: u64,
    pub start: BlockId,
}

impl FileRecord {
    /// `NAME.EXT`, or just `NAME` without an extension.
    pub fn display_name(&self) -> String {
        if self.ext.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.name, self.ext)
        }
    }
}

/// The first block of a subdirectory: the files it holds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryBlock {
    pub files: Vec<FileRecord>,
}

impl RootBlock {
    pub fn find(&self, name: &str) -> Option<&DirRecord> {
        self.dirs.iter().find(|d| d.name == name)
    }

    pub fn is_full(&self) -> bool {
        self.dirs.len() >= MAX_DIRS_IN_ROOT
    }

    pub fn encode(&self) -> Block {
        let mut block = [0u8; BLOCK_SIZE];
        put_count(&mut block, self.dirs.len());
        for (i, dir) in self.dirs.iter().take(MAX_DIRS_IN_ROOT).enumerate() {
            let at = COUNT_SIZE + i * DIR_RECORD_SIZE;
            put_name(&mut block[at..at + NAME_FIELD_SIZE], &dir.name);
            put_start(&mut block[at + NAME_FIELD_SIZE..at + DIR_RECORD_SIZE], dir.start);
        }
        block
    }

    pub fn decode(block: &Block) -> FsResult<Self> {
        let count = get_count(block, MAX_DIRS_IN_ROOT)?;
        let mut dirs = Vec::with_capacity(count);
        for i in 0..count {
            let at = COUNT_SIZE + i * DIR_RECORD_SIZE;
            dirs.push(DirRecord {
                name: get_name(&block[at..at + NAME_FIELD_SIZE])?,
                start: get_start(&block[at + NAME_FIELD_SIZE..at + DIR_RECORD_SIZE])?,
            });
        }
        Ok(Self { dirs })
    }
}

impl DirectoryBlock {
    pub fn find(&self, name: &str, ext: &str) -> Option<&FileRecord> {
        self.files.iter().find(|f| f.name == name && f.ext == ext)
    }

    pub fn find_mut(&mut self, name: &str, ext: &str) -> Option<&mut FileRecord> {
        self.files.iter_mut().find(|f| f.name == name && f.ext == ext)
    }

    pub fn is_full(&self) -> bool {
        self.files.len() >= MAX_FILES_IN_DIR
    }

    pub fn encode(&self) -> Block {
        let mut block = [0u8; BLOCK_SIZE];
        put_count(&mut block, self.files.len());
        for (i, file) in self.files.iter().take(MAX_FILES_IN_DIR).enumerate() {
            let name_at = COUNT_SIZE + i * FILE_RECORD_SIZE;
            let ext_at = name_at + NAME_FIELD_SIZE;
            let size_at = ext_at + EXT_FIELD_SIZE;
            let start_at = size_at + SIZE_FIELD_SIZE;
            put_name(&mut block[name_at..ext_at], &file.name);
            put_name(&mut block[ext_at..size_at], &file.ext);
            block[size_at..start_at].copy_from_slice(&file.size.to_le_bytes());
            put_start(&mut block[start_at..start_at + POINTER_SIZE], file.start);
        }
        block
    }

    pub fn decode(block: &Block) -> FsResult<Self> {
        let count = get_count(block, MAX_FILES_IN_DIR)?;
        let mut files = Vec::with_capacity(count);
        for i in 0..count {
            let name_at = COUNT_SIZE + i * FILE_RECORD_SIZE;
            let ext_at = name_at + NAME_FIELD_SIZE;
            let size_at = ext_at + EXT_FIELD_SIZE;
            let start_at = size_at + SIZE_FIELD_SIZE;
            let mut size = [0u8; SIZE_FIELD_SIZE];
            size.copy_from_slice(&block[size_at..start_at]);
            files.push(FileRecord {
                name: get_name(&block[name_at..ext_at])?,
                ext: get_name(&block[ext_at..size_at])?,
                size: u64::from_le_bytes(size),
                start: get_start(&block[start_at..start_at + POINTER_SIZE])?,
            });
        }
        Ok(Self { files })
    }
}

fn put_count(block: &mut Block, count: usize) {
    block[..COUNT_SIZE].copy_from_slice(&(count as i32).to_le_bytes());
}

fn get_count(block: &Block, capacity: usize) -> FsResult<usize> {
    let mut raw = [0u8; COUNT_SIZE];
    raw.copy_from_slice(&block[..COUNT_SIZE]);
    let count = i32::from_le_bytes(raw);
    if count < 0 || count as usize > capacity {
        return Err(FsError::Corrupted(format!(
            "record count {} outside 0..={}",
            count, capacity
        )));
    }
    Ok(count as usize)
}

/// Leaves at least one trailing nul in the field.
fn put_name(field: &mut [u8], name: &str) {
    let len = name.len().min(field.len() - 1);
    field[..len].copy_from_slice(&name.as_bytes()[..len]);
}

fn get_name(field: &[u8]) -> FsResult<String> {
    let len = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8(field[..len].to_vec())
        .map_err(|_| FsError::Corrupted(String::from("record name is not valid UTF-8")))
}

fn put_start(field: &mut [u8], start: BlockId) {
    field.copy_from_slice(&(start as i64).to_le_bytes());
}

fn get_start(field: &[u8]) -> FsResult<BlockId> {
    let mut raw = [0u8; POINTER_SIZE];
    raw.copy_from_slice(field);
    let start = i64::from_le_bytes(raw);
    BlockId::try_from(start)
        .map_err(|_| FsError::Corrupted(format!("start block {} out of range", start)))
}
