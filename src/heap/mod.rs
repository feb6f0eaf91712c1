//! The self-contained heap.
//!
//! One contiguous arena is mapped from the kernel during the unrestricted
//! setup window; every later allocation is served out of it by a first-fit
//! free list with split-on-allocate and coalesce-on-release. Nothing in
//! this module performs a syscall after [`Arena::acquire`], which is what
//! keeps malloc/free/calloc/realloc legal under SECCOMP strict mode.
//!
//! Single-threaded by design: there is exactly one mutator (the protected
//! program) and no locking.

pub mod allocator;
pub mod arena;
pub mod block;

pub use allocator::{BlockAllocator, BlockSpan, InvalidRelease, LayoutViolation, MIN_CHUNK};
pub use arena::{Arena, ArenaExhausted};
pub use block::HEADER_SIZE;
