//! Arena acquisition and break bookkeeping.
//!
//! One contiguous region is mapped from the kernel exactly once, before the
//! syscall restriction activates. Everything after that point is arithmetic
//! over the pre-mapped range, so the allocator above never needs the kernel
//! again. The region is never unmapped or shrunk; the OS reclaims it with
//! the rest of the address space at process exit.

use std::ptr::NonNull;

use nix::errno::Errno;
use thiserror::Error;

use crate::config::types::{Result, SetupError};

/// The pre-mapped region cannot grant the requested extension.
///
/// A normal, recoverable allocator condition — the caller reports
/// allocation failure to the program instead of terminating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("arena exhausted: requested {requested} bytes with {remaining} remaining")]
pub struct ArenaExhausted {
    pub requested: usize,
    pub remaining: usize,
}

/// A fixed-capacity memory region with a monotonically advancing break.
#[derive(Debug)]
pub struct Arena {
    base: NonNull<u8>,
    capacity: usize,
    brk: usize,
}

impl Arena {
    /// Map `capacity` bytes of anonymous memory to serve as the process
    /// heap. Called exactly once per process in the preload path, during
    /// the unrestricted setup window; failure there is fatal with a
    /// reserved status, because an environment that cannot map the arena
    /// cannot be sandboxed at all.
    pub fn acquire(capacity: usize) -> Result<Arena> {
        // SAFETY: anonymous private mapping with no fixed address; the
        // kernel picks the placement and the region is exclusively ours.
        let raw = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                capacity,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if raw == libc::MAP_FAILED {
            return Err(SetupError::ArenaMap(Errno::last()));
        }
        let base =
            NonNull::new(raw.cast::<u8>()).ok_or(SetupError::ArenaMap(Errno::EINVAL))?;
        log::debug!("mapped {} byte heap arena at {:p}", capacity, raw);
        Ok(Arena {
            base,
            capacity,
            brk: 0,
        })
    }

    /// Wrap an externally provided region (tests and embedders).
    ///
    /// # Safety
    /// `base` must point at `capacity` writable bytes, aligned for block
    /// headers, that stay valid and exclusively owned for the lifetime of
    /// the arena.
    pub unsafe fn from_raw_parts(base: NonNull<u8>, capacity: usize) -> Arena {
        Arena {
            base,
            capacity,
            brk: 0,
        }
    }

    /// Advance the break by `increment` bytes and return the start of the
    /// granted range.
    ///
    /// Pure bookkeeping over the pre-mapped region; no kernel interaction.
    pub fn extend(&mut self, increment: usize) -> std::result::Result<NonNull<u8>, ArenaExhausted> {
        let remaining = self.capacity - self.brk;
        if increment > remaining {
            return Err(ArenaExhausted {
                requested: increment,
                remaining,
            });
        }
        // SAFETY: brk + increment <= capacity, so the offset stays inside
        // the mapped region.
        let granted = unsafe { NonNull::new_unchecked(self.base.as_ptr().add(self.brk)) };
        self.brk += increment;
        Ok(granted)
    }

    pub fn base(&self) -> NonNull<u8> {
        self.base
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Current break offset; `0 <= brk <= capacity`, non-decreasing for the
    /// arena's lifetime.
    pub fn brk(&self) -> usize {
        self.brk
    }
}
