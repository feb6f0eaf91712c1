//! strictbox: a SECCOMP strict-mode sandbox runtime for untrusted C programs.
//!
//! Preloaded in front of glibc, the library captures the program entry
//! point, maps a fixed-capacity heap arena, warms up the stdio streams, and
//! enters SECCOMP strict mode before any of the protected program's own
//! initialization runs. After that point the process may only read, write,
//! and exit; the bundled allocator serves every heap request from the
//! pre-mapped arena, so no allocation ever needs the kernel again.
//!
//! # Architecture
//!
//! - [`heap`]: the self-contained allocator — [`heap::Arena`] (one `mmap`
//!   at startup, monotonic break) and [`heap::BlockAllocator`] (first-fit
//!   free list with split and coalesce).
//! - [`boot`]: the startup controller — a type-state chain
//!   `Uninitialized -> ArenaReady -> IoWarmed -> Restricted`, so the
//!   restriction can never be sequenced wrongly, plus the stdio warm-up.
//! - [`kernel`]: kernel-facing primitives — seccomp activation and the
//!   glibc stdio surface.
//! - [`terminate`]: process exit that stays inside the restricted syscall
//!   set.
//! - [`config`]: arena sizing from the environment; shared error types and
//!   reserved exit statuses.
//! - [`logging`]: an fd-2 sink for the `log` facade that remains legal
//!   after restriction.
//! - `abi` (feature `preload`): the `#[no_mangle]` interposition exports
//!   (`malloc`, `free`, `calloc`, `realloc`, `exit`, `__libc_start_main`).
//!
//! # Safety model
//!
//! The allocator and startup controller are single-threaded by design: the
//! protected program owns the only logical thread of control, and the
//! process-wide context is documented as not safe for concurrent or
//! reentrant use rather than carrying locks the design never needs.

#[cfg(feature = "preload")]
pub mod abi;
pub mod boot;
pub mod config;
pub mod heap;
pub mod kernel;
pub mod logging;
pub mod terminate;

pub use boot::{ModeState, RealEntryPoints, Startup};
pub use heap::{Arena, BlockAllocator};
pub use terminate::terminate;
