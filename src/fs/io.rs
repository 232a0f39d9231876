//! Offset-aware reads and writes over FAT chains.
//!
//! Both directions run the same walk: skip whole blocks until the one that
//! holds the offset, then move bytes block by block, following the chain.
//! Writes may grow the chain when it runs out; reads stop at the recorded
//! file size.

use core::ops::Range;

use log::{debug, trace, warn};

use crate::config::BLOCK_SIZE;
use crate::error::{FsError, FsResult};
use crate::fs::Volume;
use crate::fs::disk::{BlockDevice, BlockId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Whole blocks still to skip before the offset is reached.
    Seeking { links: u64 },
    Transfer,
    /// Chain exhausted with bytes left to write.
    Extend,
    Done,
}

/// One block's worth of a transfer.
struct Span {
    block: BlockId,
    within: Range<usize>,
    buf: Range<usize>,
    /// Allocated by this walk; its old contents are meaningless.
    fresh: bool,
}

impl<D: BlockDevice> Volume<'_, D> {
    /// Reads up to `length` bytes at `offset`, stopping at end of file.
    pub fn read_file(
        &self,
        dir: &str,
        name: &str,
        ext: &str,
        offset: u64,
        length: usize,
    ) -> FsResult<Vec<u8>> {
        let file = self.lookup_file(dir, name, ext)?;
        if offset > file.size {
            return Err(FsError::OffsetBeyondEnd {
                offset,
                size: file.size,
            });
        }
        let want = (file.size - offset).min(length as u64) as usize;
        let mut out = vec![0u8; want];
        self.walk_chain(file.start, offset, want, |device, span| {
            let block = device.read_block(span.block)?;
            out[span.buf].copy_from_slice(&block[span.within]);
            Ok(())
        })?;
        trace!("read {}/{}.{} @{}: {} bytes", dir, name, ext, offset, want);
        Ok(out)
    }

    /// Writes all of `buf` at `offset`, growing the chain as needed.
    pub fn write_file(
        &mut self,
        dir: &str,
        name: &str,
        ext: &str,
        offset: u64,
        buf: &[u8],
    ) -> FsResult<usize> {
        let file = self.lookup_file(dir, name, ext)?;
        if offset > file.size {
            return Err(FsError::OffsetBeyondEnd {
                offset,
                size: file.size,
            });
        }
        if buf.is_empty() {
            return Ok(0);
        }

        self.grow_chain(file.start, offset, buf.len(), |device, span| {
            let mut block = if span.fresh || span.within.len() == BLOCK_SIZE {
                [0u8; BLOCK_SIZE]
            } else {
                device.read_block(span.block)?
            };
            block[span.within].copy_from_slice(&buf[span.buf]);
            device.write_block(span.block, &block)
        })?;

        let end = offset + buf.len() as u64;
        if end > file.size {
            self.set_file_size(dir, name, ext, end)?;
        }
        debug!(
            "write {}/{}.{} @{}: {} bytes, size {}",
            dir,
            name,
            ext,
            offset,
            buf.len(),
            end.max(file.size)
        );
        Ok(buf.len())
    }

    fn walk_chain<F>(&self, start: BlockId, offset: u64, len: usize, mut transfer: F) -> FsResult<()>
    where
        F: FnMut(&D, Span) -> FsResult<()>,
    {
        let mut cursor = Cursor::new(start, offset, len);
        loop {
            cursor.state = match cursor.state {
                State::Seeking { links: 0 } => State::Transfer,
                State::Seeking { links } => {
                    cursor.block = self.fat.next(&*self.device, cursor.block)?.ok_or_else(|| short_chain(start))?;
                    State::Seeking { links: links - 1 }
                }
                State::Transfer => {
                    transfer(&*self.device, cursor.span())?;
                    if cursor.consume() {
                        State::Done
                    } else {
                        cursor.block = self.fat.next(&*self.device, cursor.block)?.ok_or_else(|| short_chain(start))?;
                        State::Transfer
                    }
                }
                State::Extend => return Err(short_chain(start)),
                State::Done => return Ok(()),
            };
        }
    }

    fn grow_chain<F>(&mut self, start: BlockId, offset: u64, len: usize, mut transfer: F) -> FsResult<()>
    where
        F: FnMut(&mut D, Span) -> FsResult<()>,
    {
        let mut cursor = Cursor::new(start, offset, len);
        let mut grown = 0;
        loop {
            cursor.state = match cursor.state {
                State::Seeking { links: 0 } => State::Transfer,
                State::Seeking { links } => match self.fat.next(&*self.device, cursor.block)? {
                    Some(next) => {
                        cursor.block = next;
                        State::Seeking { links: links - 1 }
                    }
                    // Appending exactly at a block boundary.
                    None if links == 1 && cursor.pos == 0 => State::Extend,
                    None => return Err(short_chain(start)),
                },
                State::Transfer => {
                    transfer(&mut *self.device, cursor.span())?;
                    if cursor.consume() {
                        State::Done
                    } else {
                        match self.fat.next(&*self.device, cursor.block)? {
                            Some(next) => {
                                cursor.block = next;
                                State::Transfer
                            }
                            None => State::Extend,
                        }
                    }
                }
                State::Extend => {
                    let next = match self.fat.allocate(&mut *self.device) {
                        Ok(next) => next,
                        Err(err) => {
                            if grown > 0 {
                                warn!("chain from block {} grew by {} blocks before: {}", start, grown, err);
                            }
                            return Err(err);
                        }
                    };
                    self.fat.extend(&mut *self.device, cursor.block, next)?;
                    grown += 1;
                    cursor.block = next;
                    cursor.fresh = true;
                    State::Transfer
                }
                State::Done => return Ok(()),
            };
        }
    }
}

struct Cursor {
    state: State,
    block: BlockId,
    pos: usize,
    done: usize,
    len: usize,
    fresh: bool,
}

impl Cursor {
    fn new(start: BlockId, offset: u64, len: usize) -> Self {
        Self {
            state: if len == 0 {
                State::Done
            } else {
                State::Seeking {
                    links: offset / BLOCK_SIZE as u64,
                }
            },
            block: start,
            pos: (offset % BLOCK_SIZE as u64) as usize,
            done: 0,
            len,
            fresh: false,
        }
    }

    fn step(&self) -> usize {
        (BLOCK_SIZE - self.pos).min(self.len - self.done)
    }

    fn span(&self) -> Span {
        let n = self.step();
        Span {
            block: self.block,
            within: self.pos..self.pos + n,
            buf: self.done..self.done + n,
            fresh: self.fresh,
        }
    }

    /// Accounts for the current span; true once everything has moved.
    fn consume(&mut self) -> bool {
        self.done += self.step();
        self.pos = 0;
        self.fresh = false;
        self.done == self.len
    }
}

fn short_chain(start: BlockId) -> FsError {
    FsError::Corrupted(format!("chain from block {} is shorter than its file", start))
}
