pub mod disk;
pub mod layout;
pub mod path;

mod catalog;
mod fat;
mod io;
mod ops;

pub use disk::{Block, BlockDevice, BlockId, FileDisk, RamDisk, format};
pub use fat::Fat;
pub use ops::{Fat83Fs, FileMode, FileType, Metadata};
pub use path::FsPath;

use crate::error::FsResult;

/// One operation's view of a device: the device itself plus the location
/// of its FAT. Built fresh for every call, so nothing outlives it.
pub struct Volume<'a, D: BlockDevice> {
    device: &'a mut D,
    fat: Fat,
}

impl<'a, D: BlockDevice> Volume<'a, D> {
    pub fn new(device: &'a mut D) -> FsResult<Self> {
        let fat = Fat::new(&*device)?;
        Ok(Self { device, fat })
    }

    pub fn fat(&self) -> &Fat {
        &self.fat
    }

    pub fn device(&self) -> &D {
        &*self.device
    }
}
