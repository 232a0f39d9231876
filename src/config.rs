//! On-disk layout constants.

pub const BLOCK_SIZE: usize = 512;

pub const MAX_FILENAME: usize = 8;
pub const MAX_EXTENSION: usize = 3;

/// Block 0 always holds the root directory.
pub const ROOT_BLOCK: u32 = 0;

pub const FAT_BLOCK_COUNT: usize = 40;
pub const FAT_REGION_SIZE: usize = FAT_BLOCK_COUNT * BLOCK_SIZE; // 20K
pub const FAT_ENTRY_SIZE: usize = 2;
pub const FAT_ENTRIES: usize = FAT_REGION_SIZE / FAT_ENTRY_SIZE - FAT_BLOCK_COUNT; // 10200
pub const FAT_ENTRIES_PER_BLOCK: usize = BLOCK_SIZE / FAT_ENTRY_SIZE;

pub const FAT_FREE: i16 = 0;
pub const FAT_END: i16 = -1;

/// Record header: a 4-byte signed entry count.
pub const COUNT_SIZE: usize = 4;
/// Width of a stored block index (LP64 `long`).
pub const POINTER_SIZE: usize = 8;
/// Width of a stored file size (LP64 `size_t`).
pub const SIZE_FIELD_SIZE: usize = 8;

pub const NAME_FIELD_SIZE: usize = MAX_FILENAME + 1;
pub const EXT_FIELD_SIZE: usize = MAX_EXTENSION + 1;

pub const DIR_RECORD_SIZE: usize = NAME_FIELD_SIZE + POINTER_SIZE; // 17
pub const FILE_RECORD_SIZE: usize =
    NAME_FIELD_SIZE + EXT_FIELD_SIZE + SIZE_FIELD_SIZE + POINTER_SIZE; // 29

pub const MAX_DIRS_IN_ROOT: usize = (BLOCK_SIZE - COUNT_SIZE) / DIR_RECORD_SIZE; // 29
pub const MAX_FILES_IN_DIR: usize = (BLOCK_SIZE - COUNT_SIZE) / FILE_RECORD_SIZE; // 17

pub const DEFAULT_IMAGE_SIZE: u64 = 5 * 1024 * 1024; // 5MB
