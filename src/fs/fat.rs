//! File allocation table.
//!
//! The table occupies the last `FAT_BLOCK_COUNT` blocks of the device and
//! holds one little-endian `i16` per allocable block: `0` is free, `-1` ends
//! a chain, and any positive value is the next block of the chain. Entry 0
//! belongs to the root block and is never handed out.

use log::{debug, trace};

use crate::config::{BLOCK_SIZE, FAT_BLOCK_COUNT, FAT_END, FAT_ENTRIES, FAT_ENTRIES_PER_BLOCK, FAT_ENTRY_SIZE, FAT_FREE};
use crate::error::{FsError, FsResult};
use crate::fs::disk::{Block, BlockDevice, BlockId};

#[derive(Debug, Clone, Copy)]
pub struct Fat {
    region_start: BlockId,
    usable: u32,
}

impl Fat {
    /// Locates the FAT region of `device`.
    pub fn new<D: BlockDevice>(device: &D) -> FsResult<Self> {
        let blocks = device.block_count()?;
        let data_blocks = blocks
            .checked_sub(FAT_BLOCK_COUNT as u32)
            .filter(|&n| n >= 2)
            .ok_or_else(|| FsError::Corrupted(format!("{} blocks leave no room for data", blocks)))?;
        Ok(Self {
            region_start: data_blocks,
            usable: data_blocks.min(FAT_ENTRIES as u32),
        })
    }

    /// Number of FAT entries that map onto real data blocks, entry 0 included.
    pub fn usable_entries(&self) -> u32 {
        self.usable
    }

    pub fn entry<D: BlockDevice>(&self, device: &D, index: BlockId) -> FsResult<i16> {
        self.check(index)?;
        let (block, at) = self.locate(index);
        Ok(get_entry(&device.read_block(block)?, at))
    }

    fn set_entry<D: BlockDevice>(&self, device: &mut D, index: BlockId, value: i16) -> FsResult<()> {
        self.check(index)?;
        let (block, at) = self.locate(index);
        let mut raw = device.read_block(block)?;
        raw[at..at + FAT_ENTRY_SIZE].copy_from_slice(&value.to_le_bytes());
        device.write_block(block, &raw)
    }

    /// Claims the lowest free block and marks it as the end of a chain.
    pub fn allocate<D: BlockDevice>(&self, device: &mut D) -> FsResult<BlockId> {
        for fat_block in 0..FAT_BLOCK_COUNT as u32 {
            let first = fat_block * FAT_ENTRIES_PER_BLOCK as u32;
            if first >= self.usable {
                break;
            }
            let mut raw = device.read_block(self.region_start + fat_block)?;
            for slot in 0..FAT_ENTRIES_PER_BLOCK {
                let index = first + slot as u32;
                if index == 0 {
                    continue;
                }
                if index >= self.usable {
                    break;
                }
                let at = slot * FAT_ENTRY_SIZE;
                if get_entry(&raw, at) == FAT_FREE {
                    raw[at..at + FAT_ENTRY_SIZE].copy_from_slice(&FAT_END.to_le_bytes());
                    device.write_block(self.region_start + fat_block, &raw)?;
                    debug!("allocated block {}", index);
                    return Ok(index);
                }
            }
        }
        Err(FsError::DiskFull)
    }

    /// Links the chain ending at `from` to the freshly allocated `to`.
    pub fn extend<D: BlockDevice>(&self, device: &mut D, from: BlockId, to: BlockId) -> FsResult<()> {
        self.check(to)?;
        trace!("link {} -> {}", from, to);
        self.set_entry(device, from, to as i16)
    }

    /// The block after `index` in its chain, or `None` at the end.
    pub fn next<D: BlockDevice>(&self, device: &D, index: BlockId) -> FsResult<Option<BlockId>> {
        match self.entry(device, index)? {
            FAT_END => Ok(None),
            FAT_FREE => Err(FsError::Corrupted(format!("block {} is free but part of a chain", index))),
            next if next > 0 => {
                let next = next as BlockId;
                self.check(next)?;
                Ok(Some(next))
            }
            other => Err(FsError::Corrupted(format!("block {} has FAT entry {}", index, other))),
        }
    }

    /// Every block of the chain starting at `start`, in order.
    pub fn chain<D: BlockDevice>(&self, device: &D, start: BlockId) -> FsResult<Vec<BlockId>> {
        let mut blocks = vec![start];
        let mut current = start;
        while let Some(next) = self.next(device, current)? {
            if blocks.len() >= self.usable as usize {
                return Err(FsError::Corrupted(format!("chain from block {} loops", start)));
            }
            blocks.push(next);
            current = next;
        }
        Ok(blocks)
    }

    pub fn free_count<D: BlockDevice>(&self, device: &D) -> FsResult<u32> {
        let mut free = 0;
        for fat_block in 0..FAT_BLOCK_COUNT as u32 {
            let first = fat_block * FAT_ENTRIES_PER_BLOCK as u32;
            if first >= self.usable {
                break;
            }
            let raw = device.read_block(self.region_start + fat_block)?;
            let last = (first + FAT_ENTRIES_PER_BLOCK as u32).min(self.usable);
            free += (first.max(1)..last)
                .filter(|index| get_entry(&raw, (index - first) as usize * FAT_ENTRY_SIZE) == FAT_FREE)
                .count() as u32;
        }
        Ok(free)
    }

    fn check(&self, index: BlockId) -> FsResult<()> {
        if index == 0 || index >= self.usable {
            return Err(FsError::Corrupted(format!("block {} is not allocable", index)));
        }
        Ok(())
    }

    fn locate(&self, index: BlockId) -> (BlockId, usize) {
        let byte = index as usize * FAT_ENTRY_SIZE;
        (self.region_start + (byte / BLOCK_SIZE) as u32, byte % BLOCK_SIZE)
    }
}

fn get_entry(raw: &Block, at: usize) -> i16 {
    i16::from_le_bytes([raw[at], raw[at + 1]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::disk::RamDisk;
    use std::collections::HashSet;

    fn disk(blocks: u32) -> (RamDisk, Fat) {
        let disk = RamDisk::new(blocks).unwrap();
        let fat = Fat::new(&disk).unwrap();
        (disk, fat)
    }

    #[test]
    fn allocation_starts_at_one() {
        let (mut disk, fat) = disk(100);
        assert_eq!(fat.allocate(&mut disk).unwrap(), 1);
        assert_eq!(fat.entry(&disk, 1).unwrap(), FAT_END);
        assert_eq!(fat.allocate(&mut disk).unwrap(), 2);
    }

    #[test]
    fn entries_live_at_the_start_of_the_fat_region() {
        let (mut disk, fat) = disk(100);
        let a = fat.allocate(&mut disk).unwrap();
        let b = fat.allocate(&mut disk).unwrap();
        fat.extend(&mut disk, a, b).unwrap();

        let region = &disk.as_bytes()[60 * BLOCK_SIZE..];
        assert_eq!(&region[..6], &[0, 0, 2, 0, 0xFF, 0xFF]);
    }

    #[test]
    fn exhaustion_yields_distinct_blocks_then_disk_full() {
        let (mut disk, fat) = disk(100);
        let mut seen = HashSet::new();
        for _ in 1..60 {
            assert!(seen.insert(fat.allocate(&mut disk).unwrap()));
        }
        assert_eq!(seen.len(), 59);
        assert!(seen.iter().all(|&b| b >= 1 && b < 60));
        assert!(matches!(fat.allocate(&mut disk), Err(FsError::DiskFull)));
        assert_eq!(fat.free_count(&disk).unwrap(), 0);
    }

    #[test]
    fn full_size_image_caps_at_fat_entries() {
        let (mut disk, fat) = disk(10240 + 100);
        assert_eq!(fat.usable_entries(), FAT_ENTRIES as u32);
        assert_eq!(fat.free_count(&disk).unwrap(), FAT_ENTRIES as u32 - 1);
        let mut last = 0;
        for _ in 1..FAT_ENTRIES {
            last = fat.allocate(&mut disk).unwrap();
        }
        assert_eq!(last, FAT_ENTRIES as u32 - 1);
        assert!(matches!(fat.allocate(&mut disk), Err(FsError::DiskFull)));
    }

    #[test]
    fn chains_follow_links() {
        let (mut disk, fat) = disk(100);
        let a = fat.allocate(&mut disk).unwrap();
        let _gap = fat.allocate(&mut disk).unwrap();
        let b = fat.allocate(&mut disk).unwrap();
        let c = fat.allocate(&mut disk).unwrap();
        fat.extend(&mut disk, a, b).unwrap();
        fat.extend(&mut disk, b, c).unwrap();

        assert_eq!(fat.next(&disk, a).unwrap(), Some(b));
        assert_eq!(fat.next(&disk, c).unwrap(), None);
        assert_eq!(fat.chain(&disk, a).unwrap(), vec![a, b, c]);
        assert_eq!(fat.free_count(&disk).unwrap(), 59 - 4);
    }

    #[test]
    fn cycles_and_free_links_are_corruption() {
        let (mut disk, fat) = disk(100);
        let a = fat.allocate(&mut disk).unwrap();
        let b = fat.allocate(&mut disk).unwrap();
        fat.extend(&mut disk, a, b).unwrap();
        fat.extend(&mut disk, b, a).unwrap();
        assert!(matches!(fat.chain(&disk, a), Err(FsError::Corrupted(_))));

        assert!(matches!(fat.next(&disk, 7), Err(FsError::Corrupted(_))));
        assert!(matches!(fat.entry(&disk, 0), Err(FsError::Corrupted(_))));
        assert!(matches!(fat.entry(&disk, 60), Err(FsError::Corrupted(_))));
    }
}
