//! Block headers embedded at the start of each heap block.

use std::mem;

/// Total size of the embedded header. Every block size is a multiple of
/// this, so header placement stays aligned across splits.
pub const HEADER_SIZE: usize = mem::size_of::<BlockHeader>();

const ALLOCATED: usize = 1;

/// Header found at the beginning of each block.
///
/// `prev`/`next` link the blocks in ascending address order; they are
/// navigation only and own nothing. `size` is the total block size in
/// bytes, header included.
#[repr(C)]
#[derive(Debug)]
pub struct BlockHeader {
    pub prev: *mut BlockHeader,
    pub next: *mut BlockHeader,
    pub size: usize,
    flags: usize,
}

impl BlockHeader {
    pub fn is_allocated(&self) -> bool {
        self.flags & ALLOCATED != 0
    }

    pub fn mark_allocated(&mut self) {
        self.flags |= ALLOCATED;
    }

    pub fn mark_free(&mut self) {
        self.flags &= !ALLOCATED;
    }

    /// Write a fresh free header at `at`.
    ///
    /// # Safety
    /// `at` must be header-aligned and point at least `size` writable bytes.
    pub unsafe fn init_free(
        at: *mut BlockHeader,
        prev: *mut BlockHeader,
        next: *mut BlockHeader,
        size: usize,
    ) {
        at.write(BlockHeader {
            prev,
            next,
            size,
            flags: 0,
        });
    }

    /// Payload region that follows a header.
    pub fn payload(header: *mut BlockHeader) -> *mut u8 {
        header.wrapping_add(1).cast()
    }

    /// Recover the header sitting immediately before a payload pointer
    /// handed out by the allocator.
    pub fn from_payload(ptr: *mut u8) -> *mut BlockHeader {
        ptr.cast::<BlockHeader>().wrapping_sub(1)
    }
}
