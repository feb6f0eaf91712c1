//! Startup mode controller.
//!
//! The window between process start and the first instruction of the
//! protected program's own initialization is the only time the sandbox may
//! talk to the kernel freely. The controller walks that window as a fixed
//! sequence — capture the real entry points, map the arena, warm up stdio,
//! activate the restriction — and hands the entry points back only once
//! the restriction is active.
//!
//! The sequence is a type-state chain: each transition consumes the prior
//! state and returns exactly one next state, so skipping or reordering a
//! step does not compile. A runtime [`ModeState`] mirrors the type state
//! for observability; it is monotonic and reaches [`ModeState::Restricted`]
//! exactly once per process.

pub mod warmup;

use std::marker::PhantomData;

use crate::config::types::Result;
use crate::heap::{Arena, BlockAllocator};
use crate::kernel::seccomp::Restrictor;
use warmup::StreamWarmup;

/// C runtime init hook: `void (*)(void)`.
pub type InitFn = unsafe extern "C" fn();

/// C runtime main: `int (*)(int, char **, char **)`.
pub type MainFn =
    unsafe extern "C" fn(libc::c_int, *mut *mut libc::c_char, *mut *mut libc::c_char) -> libc::c_int;

/// The real entry points captured from the runtime before interposition
/// takes over. `init` may be absent: modern glibc passes a null init hook
/// and runs constructors internally.
#[derive(Debug, Clone, Copy)]
pub struct RealEntryPoints {
    pub init: Option<InitFn>,
    pub main: MainFn,
}

/// Process-wide startup mode. Strictly ordered and forward-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ModeState {
    Uninitialized,
    ArenaReady,
    IoWarmed,
    Restricted,
}

/// Type-state marker: nothing set up yet.
pub struct Uninitialized;

/// Type-state marker: heap arena mapped, allocator handed out.
pub struct ArenaReady;

/// Type-state marker: stdio probes forced while unrestricted.
pub struct IoWarmed;

/// Type-state marker: syscall restriction active; only the captured entry
/// points remain to run.
pub struct Restricted;

/// Startup controller with type-state tracking.
///
/// The type parameter `S` is the current phase, so out-of-order
/// transitions fail to compile. Exactly one instance exists per process in
/// the preload path; not safe for concurrent or reentrant use.
pub struct Startup<S> {
    entries: RealEntryPoints,
    mode: ModeState,
    _state: PhantomData<S>,
}

impl<S> Startup<S> {
    /// Runtime mirror of the type state.
    pub fn mode(&self) -> ModeState {
        self.mode
    }
}

impl Startup<Uninitialized> {
    /// Capture the real entry points. This is the first thing that happens
    /// after the loader hands control to the sandbox.
    pub fn capture(entries: RealEntryPoints) -> Self {
        Startup {
            entries,
            mode: ModeState::Uninitialized,
            _state: PhantomData,
        }
    }

    /// Map the heap arena and hand out the allocator that will serve every
    /// later allocation without kernel interaction. In the preload path a
    /// failure here is fatal with a reserved status; there is no retry.
    pub fn acquire_arena(self, capacity: usize) -> Result<(Startup<ArenaReady>, BlockAllocator)> {
        let arena = Arena::acquire(capacity)?;
        Ok(self.with_arena(arena))
    }

    /// Same transition over a pre-mapped region (tests and embedders).
    pub fn with_arena(self, arena: Arena) -> (Startup<ArenaReady>, BlockAllocator) {
        log::debug!("arena ready: {} bytes", arena.capacity());
        let heap = BlockAllocator::new(arena);
        (
            Startup {
                entries: self.entries,
                mode: ModeState::ArenaReady,
                _state: PhantomData,
            },
            heap,
        )
    }
}

impl Startup<ArenaReady> {
    /// Force glibc's one-time stream probes while syscalls are still
    /// unrestricted. Warm-up trouble is logged and the transition proceeds.
    pub fn warm_up<W: StreamWarmup>(self, streams: &mut W) -> Startup<IoWarmed> {
        if let Err(err) = streams.warm_streams() {
            log::warn!("stdio warm-up incomplete: {err}");
        }
        Startup {
            entries: self.entries,
            mode: ModeState::IoWarmed,
            _state: PhantomData,
        }
    }
}

impl Startup<IoWarmed> {
    /// Activate the one-shot syscall restriction. Irreversible; fatal with
    /// a reserved status in the preload path if activation fails.
    pub fn restrict<R: Restrictor>(self, restrictor: &R) -> Result<Startup<Restricted>> {
        restrictor.activate()?;
        log::debug!("seccomp strict mode active");
        Ok(Startup {
            entries: self.entries,
            mode: ModeState::Restricted,
            _state: PhantomData,
        })
    }
}

impl Startup<Restricted> {
    /// The captured entry points, reachable only once restriction is
    /// active.
    pub fn entries(&self) -> RealEntryPoints {
        self.entries
    }

    pub fn into_entries(self) -> RealEntryPoints {
        self.entries
    }
}
