//! First-fit free-list allocator over the pre-mapped arena.
//!
//! Blocks form a doubly linked list in ascending address order, spanning
//! the arena contiguously from its first byte up to the current break.
//! Allocation scans head-to-tail for the first free block that fits and
//! splits off any useful surplus; release coalesces with the successor and
//! then lets the predecessor coalesce forward, so no two address-adjacent
//! blocks are ever simultaneously free.

use std::ptr::{self, NonNull};

use thiserror::Error;

use super::arena::Arena;
use super::block::{BlockHeader, HEADER_SIZE};

/// Minimum number of bytes taken from the arena per extension.
pub const MIN_CHUNK: usize = 64 * 1024;

/// A release of a pointer whose header is not marked allocated.
///
/// Diagnostic only: the operation is a no-op and the block list is left
/// untouched, which is what keeps the coalescing invariant safe from
/// misuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid release of pointer {addr:#x}: block is not allocated")]
pub struct InvalidRelease {
    pub addr: usize,
}

/// One block as seen by [`BlockAllocator::spans`], in address order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSpan {
    /// Byte offset of the block header from the arena base.
    pub offset: usize,
    /// Total block size, header included.
    pub size: usize,
    pub allocated: bool,
}

/// A structural invariant broken somewhere in the block list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LayoutViolation {
    #[error("block at offset {0} does not start where the previous block ended")]
    Gap(usize),
    #[error("block list covers {end} bytes but the arena break is {brk}")]
    BreakMismatch { end: usize, brk: usize },
    #[error("block at offset {offset} has size {size}, not a positive multiple of the header size")]
    UnroundedSize { offset: usize, size: usize },
    #[error("adjacent free blocks at offsets {0} and {1}")]
    AdjacentFree(usize, usize),
    #[error("back-link of block at offset {0} does not reference its predecessor")]
    BrokenLink(usize),
    #[error("head pointer does not reference the lowest-address block")]
    StaleHead,
    #[error("tail pointer does not reference the highest-address block")]
    StaleTail,
}

/// First-fit allocator owning the arena and the block list.
///
/// Not safe for concurrent or reentrant use: the design assumes one
/// logical thread of control, and the raw block links carry no
/// synchronization.
#[derive(Debug)]
pub struct BlockAllocator {
    arena: Arena,
    head: *mut BlockHeader,
    tail: *mut BlockHeader,
}

impl BlockAllocator {
    /// Build an allocator over a freshly acquired arena.
    pub fn new(arena: Arena) -> Self {
        BlockAllocator {
            arena,
            head: ptr::null_mut(),
            tail: ptr::null_mut(),
        }
    }

    pub fn arena(&self) -> &Arena {
        &self.arena
    }

    /// Minimum block size able to hold `n` payload bytes: header included,
    /// rounded up to a header multiple. `None` when the arithmetic
    /// overflows, which reads as an unsatisfiable request.
    fn required_block_size(n: usize) -> Option<usize> {
        let total = n.checked_add(HEADER_SIZE)?;
        let rem = total % HEADER_SIZE;
        if rem == 0 {
            Some(total)
        } else {
            total.checked_add(HEADER_SIZE - rem)
        }
    }

    /// Take a new block from the arena and append it at the tail.
    fn append_block(&mut self, block_size: usize) -> Option<*mut BlockHeader> {
        let block_size = block_size.max(MIN_CHUNK);
        let region = self.arena.extend(block_size).ok()?;
        log::trace!("extended heap by {} bytes", block_size);
        let block = region.as_ptr().cast::<BlockHeader>();
        // SAFETY: the arena granted `block_size` writable bytes at `block`,
        // and every extension is a header multiple so the address stays
        // header-aligned.
        unsafe {
            BlockHeader::init_free(block, self.tail, ptr::null_mut(), block_size);
            if self.tail.is_null() {
                self.head = block;
            } else {
                (*self.tail).next = block;
            }
            self.tail = block;
        }
        Some(block)
    }

    /// Split `block` when its surplus beyond `required` can form a useful
    /// free block (anything larger than a bare header).
    fn split_if_necessary(&mut self, block: *mut BlockHeader, required: usize) {
        // SAFETY: `block` is a live header in the list and `required` never
        // exceeds its size; the excess header lands inside the same block.
        unsafe {
            let left_over = (*block).size - required;
            if left_over <= HEADER_SIZE {
                return;
            }
            (*block).size = required;
            let excess = block.cast::<u8>().add(required).cast::<BlockHeader>();
            BlockHeader::init_free(excess, block, (*block).next, left_over);
            if (*block).next.is_null() {
                self.tail = excess;
            } else {
                (*(*block).next).prev = excess;
            }
            (*block).next = excess;
        }
    }

    /// Merge `block` with its successor when both are free.
    fn coalesce_with_successor(&mut self, block: *mut BlockHeader) {
        if block.is_null() {
            return;
        }
        // SAFETY: list links only reference live headers inside the arena.
        unsafe {
            let next = (*block).next;
            if (*block).is_allocated() || next.is_null() || (*next).is_allocated() {
                return;
            }
            (*block).size += (*next).size;
            let after = (*next).next;
            (*block).next = after;
            if after.is_null() {
                self.tail = block;
            } else {
                (*after).prev = block;
            }
        }
    }

    /// Allocate `n` bytes. First-fit: the scan takes the first free block
    /// in address order that is large enough. Returns `None` when the
    /// arena cannot cover the request; the block list is left unchanged in
    /// that case.
    pub fn allocate(&mut self, n: usize) -> Option<NonNull<u8>> {
        let required = Self::required_block_size(n)?;

        let mut block = self.head;
        // SAFETY: traversal follows the list links, which stay inside the
        // arena.
        unsafe {
            while !block.is_null() {
                if !(*block).is_allocated() && (*block).size >= required {
                    break;
                }
                block = (*block).next;
            }
        }

        let block = if block.is_null() {
            self.append_block(required)?
        } else {
            block
        };

        self.split_if_necessary(block, required);
        // SAFETY: `block` is a live header chosen or appended above.
        unsafe {
            (*block).mark_allocated();
        }
        NonNull::new(BlockHeader::payload(block))
    }

    /// Release a pointer previously returned by [`allocate`].
    ///
    /// Null is an `Ok` no-op. A header not marked allocated yields
    /// [`InvalidRelease`] and no state change.
    pub fn release(&mut self, ptr: *mut u8) -> Result<(), InvalidRelease> {
        if ptr.is_null() {
            return Ok(());
        }
        let block = BlockHeader::from_payload(ptr);
        // SAFETY: callers hand back pointers produced by `allocate`, whose
        // headers sit immediately before the payload.
        unsafe {
            if !(*block).is_allocated() {
                return Err(InvalidRelease { addr: ptr as usize });
            }
            (*block).mark_free();
            let prev = (*block).prev;
            self.coalesce_with_successor(block);
            // Covers the case where the predecessor is also free.
            self.coalesce_with_successor(prev);
        }
        Ok(())
    }

    /// Allocate `count * size` bytes, zero-filled. Overflowing products
    /// read as unsatisfiable requests.
    pub fn allocate_zeroed(&mut self, count: usize, size: usize) -> Option<NonNull<u8>> {
        let total = count.checked_mul(size)?;
        let buf = self.allocate(total)?;
        // SAFETY: `allocate` returned at least `total` usable bytes.
        unsafe {
            ptr::write_bytes(buf.as_ptr(), 0, total);
        }
        Some(buf)
    }

    /// Resize an allocation. Null behaves as `allocate(new_size)`; zero
    /// size behaves as `release(ptr)` and yields `None`. Otherwise the
    /// block is always relocated: allocate new, copy the overlapping
    /// prefix, release old. On failure the original block is untouched.
    pub fn resize(&mut self, ptr: *mut u8, new_size: usize) -> Option<NonNull<u8>> {
        if ptr.is_null() {
            return self.allocate(new_size);
        }
        if new_size == 0 {
            if let Err(err) = self.release(ptr) {
                log::warn!("{err}");
            }
            return None;
        }

        let old = BlockHeader::from_payload(ptr);
        // SAFETY: the header precedes a live allocated payload.
        let old_payload = unsafe { (*old).size - HEADER_SIZE };

        let new_buf = self.allocate(new_size)?;
        let to_copy = old_payload.min(new_size);
        // SAFETY: both regions hold at least `to_copy` bytes and belong to
        // distinct blocks.
        unsafe {
            ptr::copy_nonoverlapping(ptr, new_buf.as_ptr(), to_copy);
        }
        if let Err(err) = self.release(ptr) {
            log::warn!("{err}");
        }
        Some(new_buf)
    }

    /// Snapshot of the block list in address order.
    pub fn spans(&self) -> Vec<BlockSpan> {
        let base = self.arena.base().as_ptr() as usize;
        let mut out = Vec::new();
        let mut block = self.head;
        // SAFETY: list links only reference live headers inside the arena.
        unsafe {
            while !block.is_null() {
                out.push(BlockSpan {
                    offset: block as usize - base,
                    size: (*block).size,
                    allocated: (*block).is_allocated(),
                });
                block = (*block).next;
            }
        }
        out
    }

    /// Walk the block list and check every structural invariant:
    /// contiguity over `[0, brk)` with no gaps or overlaps, sizes that are
    /// positive header multiples, link symmetry, correct head/tail, and no
    /// two adjacent free blocks.
    pub fn verify_layout(&self) -> Result<(), LayoutViolation> {
        if self.head.is_null() {
            if self.arena.brk() != 0 {
                return Err(LayoutViolation::BreakMismatch {
                    end: 0,
                    brk: self.arena.brk(),
                });
            }
            if !self.tail.is_null() {
                return Err(LayoutViolation::StaleTail);
            }
            return Ok(());
        }

        let base = self.arena.base().as_ptr() as usize;
        if self.head as usize != base {
            return Err(LayoutViolation::StaleHead);
        }

        let mut expected_offset = 0usize;
        let mut prev: *mut BlockHeader = ptr::null_mut();
        let mut prev_free_at: Option<usize> = None;
        let mut block = self.head;
        // SAFETY: traversal follows the list links; every field read is on
        // a header the list claims is live.
        unsafe {
            while !block.is_null() {
                let offset = block as usize - base;
                if offset != expected_offset {
                    return Err(LayoutViolation::Gap(offset));
                }
                if (*block).prev != prev {
                    return Err(LayoutViolation::BrokenLink(offset));
                }
                let size = (*block).size;
                if size == 0 || size % HEADER_SIZE != 0 {
                    return Err(LayoutViolation::UnroundedSize { offset, size });
                }
                if !(*block).is_allocated() {
                    if let Some(prev_offset) = prev_free_at {
                        return Err(LayoutViolation::AdjacentFree(prev_offset, offset));
                    }
                    prev_free_at = Some(offset);
                } else {
                    prev_free_at = None;
                }
                expected_offset += size;
                prev = block;
                block = (*block).next;
            }
        }

        if prev != self.tail {
            return Err(LayoutViolation::StaleTail);
        }
        if expected_offset != self.arena.brk() {
            return Err(LayoutViolation::BreakMismatch {
                end: expected_offset,
                brk: self.arena.brk(),
            });
        }
        Ok(())
    }
}
