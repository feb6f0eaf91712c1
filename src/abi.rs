//! libc interposition surface.
//!
//! Built only with the `preload` feature: these `#[no_mangle]` exports are
//! the symbols the dynamic loader binds in place of glibc's when the
//! library is preloaded in front of an untrusted program. The flow mirrors
//! the startup controller: `__libc_start_main` is interposed, captures the
//! real entry points, maps the arena (before `dlopen`, which already
//! allocates), resolves glibc's own start-main, and delegates to it with
//! wrapper init/main functions that complete the restriction before any
//! program logic runs.
//!
//! Everything in this module assumes the single-threaded protected
//! program: the process context below has exactly one mutator and is not
//! safe for concurrent or reentrant use.

use std::cell::UnsafeCell;
use std::ffi::c_void;
use std::mem;
use std::ptr;

use crate::boot::warmup::LibcStdio;
use crate::boot::{ArenaReady, InitFn, MainFn, ModeState, RealEntryPoints, Startup, Uninitialized};
use crate::config;
use crate::config::types::status;
use crate::heap::BlockAllocator;
use crate::kernel::seccomp::SeccompStrict;
use crate::terminate::terminate;

type FiniFn = unsafe extern "C" fn();

type StartMainFn = unsafe extern "C" fn(
    MainFn,
    libc::c_int,
    *mut *mut libc::c_char,
    Option<InitFn>,
    Option<FiniFn>,
    Option<FiniFn>,
    *mut c_void,
) -> libc::c_int;

/// Process-wide mutable sandbox state: the heap, the mode, the staged
/// startup controller, and the captured real entry points. Single
/// instance, initialized once in `__libc_start_main`, never reset.
struct SandboxContext {
    heap: Option<BlockAllocator>,
    mode: ModeState,
    pending: Option<Startup<ArenaReady>>,
    real_init: Option<InitFn>,
    real_main: Option<MainFn>,
}

struct ContextCell(UnsafeCell<SandboxContext>);

// The protected program is single-threaded by design: there is exactly one
// mutator and no locking.
unsafe impl Sync for ContextCell {}

static CONTEXT: ContextCell = ContextCell(UnsafeCell::new(SandboxContext {
    heap: None,
    mode: ModeState::Uninitialized,
    pending: None,
    real_init: None,
    real_main: None,
}));

/// # Safety
/// The caller must be the only active user of the context — guaranteed
/// here because the protected program owns the single thread of control.
unsafe fn context() -> &'static mut SandboxContext {
    &mut *CONTEXT.0.get()
}

// ============================================================================
// Allocation family
// ============================================================================

#[no_mangle]
pub unsafe extern "C" fn malloc(size: libc::size_t) -> *mut c_void {
    match context().heap.as_mut().and_then(|heap| heap.allocate(size)) {
        Some(buf) => buf.as_ptr().cast(),
        None => ptr::null_mut(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn free(ptr: *mut c_void) {
    let Some(heap) = context().heap.as_mut() else {
        return;
    };
    if let Err(err) = heap.release(ptr.cast()) {
        log::warn!("{err}");
    }
}

#[no_mangle]
pub unsafe extern "C" fn calloc(nmemb: libc::size_t, size: libc::size_t) -> *mut c_void {
    match context()
        .heap
        .as_mut()
        .and_then(|heap| heap.allocate_zeroed(nmemb, size))
    {
        Some(buf) => buf.as_ptr().cast(),
        None => ptr::null_mut(),
    }
}

#[no_mangle]
pub unsafe extern "C" fn realloc(ptr: *mut c_void, size: libc::size_t) -> *mut c_void {
    match context()
        .heap
        .as_mut()
        .and_then(|heap| heap.resize(ptr.cast(), size))
    {
        Some(buf) => buf.as_ptr().cast(),
        None => ptr::null_mut(),
    }
}

// ============================================================================
// Termination
// ============================================================================

/// Replacement for glibc `exit`: same signature, but leaves through the
/// termination shim so neither `exit_group` nor runtime teardown runs.
#[no_mangle]
pub extern "C" fn exit(status: libc::c_int) -> ! {
    terminate(status)
}

// ============================================================================
// Entry-point trampoline
// ============================================================================

/// Complete the `ArenaReady -> IoWarmed -> Restricted` transitions exactly
/// once. Reached from the init hook normally, or from the main wrapper if
/// the runtime never invoked the init hook.
unsafe fn ensure_restricted() {
    let ctx = context();
    if ctx.mode == ModeState::Restricted {
        return;
    }
    let Some(startup) = ctx.pending.take() else {
        // No startup staged means __libc_start_main never ran.
        libc::_exit(status::UNREACHABLE);
    };
    let startup = startup.warm_up(&mut LibcStdio);
    let startup = match startup.restrict(&SeccompStrict) {
        Ok(restricted) => restricted,
        Err(err) => {
            log::error!("cannot enter seccomp mode: {err}");
            libc::_exit(status::RESTRICTION_FAILED);
        }
    };
    ctx.mode = startup.mode();
}

/// Runs as the init hook, before any constructor of the protected program:
/// completes the restriction, then calls the real init.
unsafe extern "C" fn wrapper_init() {
    ensure_restricted();
    if let Some(init) = context().real_init {
        init();
    }
}

/// Runs as the program main: the real main's return value leaves through
/// the termination shim, never through glibc's exit path.
unsafe extern "C" fn wrapper_main(
    argc: libc::c_int,
    argv: *mut *mut libc::c_char,
    envp: *mut *mut libc::c_char,
) -> libc::c_int {
    // Covers runtimes that never invoke the init hook: the restriction
    // must be active before any program logic runs.
    ensure_restricted();
    let Some(real_main) = context().real_main else {
        libc::_exit(status::UNREACHABLE);
    };
    let code = real_main(argc, argv, envp);
    terminate(code)
}

/// The interposed program entry.
///
/// Captures the real entry points, maps the arena, resolves glibc's own
/// `__libc_start_main`, and delegates to it with the wrapper init/main.
#[no_mangle]
pub unsafe extern "C" fn __libc_start_main(
    main: MainFn,
    argc: libc::c_int,
    ubp_av: *mut *mut libc::c_char,
    init: Option<InitFn>,
    fini: Option<FiniFn>,
    rtld_fini: Option<FiniFn>,
    stack_end: *mut c_void,
) -> libc::c_int {
    let ctx = context();
    ctx.real_init = init;
    ctx.real_main = Some(main);

    // Arena first: the dlopen/dlsym below already call malloc, and those
    // allocations must come from the pre-mapped region.
    let startup = Startup::<Uninitialized>::capture(RealEntryPoints { init, main });
    let (startup, heap) = match startup.acquire_arena(config::arena_size_from_env()) {
        Ok(parts) => parts,
        Err(_) => libc::_exit(status::ARENA_MAP_FAILED),
    };
    ctx.heap = Some(heap);
    ctx.mode = startup.mode();
    ctx.pending = Some(startup);

    crate::logging::install();

    let libc_handle = libc::dlopen(c"libc.so.6".as_ptr(), libc::RTLD_LOCAL | libc::RTLD_LAZY);
    if libc_handle.is_null() {
        libc::_exit(status::ENTRY_RESOLUTION_FAILED);
    }
    let sym = libc::dlsym(libc_handle, c"__libc_start_main".as_ptr());
    if sym.is_null() {
        libc::_exit(status::ENTRY_RESOLUTION_FAILED);
    }
    // SAFETY of the transmute: the symbol resolved from libc has the
    // start-main signature.
    let real_start_main: StartMainFn = mem::transmute(sym);

    real_start_main(
        wrapper_main,
        argc,
        ubp_av,
        Some(wrapper_init),
        fini,
        rtld_fini,
        stack_end,
    )
}
