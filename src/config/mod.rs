//! Runtime configuration for the preload sandbox.

pub mod types;

use std::ffi::CStr;

/// Environment variable selecting the arena capacity in bytes.
pub const ARENA_SIZE_ENV: &str = "STRICTBOX_HEAPSIZE";

/// Default arena capacity: 8 MiB.
pub const DEFAULT_ARENA_BYTES: usize = 8 * 1024 * 1024;

/// Read the arena capacity from the environment.
///
/// Runs before the heap arena exists, so it must not allocate: the lookup
/// goes through `libc::getenv` and the value is parsed in place. Absent,
/// unparsable, or zero values fall back to [`DEFAULT_ARENA_BYTES`].
pub fn arena_size_from_env() -> usize {
    const NAME: &CStr = c"STRICTBOX_HEAPSIZE";
    // SAFETY: getenv returns either null or a pointer into the process
    // environment, NUL-terminated and valid until the environment changes.
    let raw = unsafe { libc::getenv(NAME.as_ptr()) };
    if raw.is_null() {
        return DEFAULT_ARENA_BYTES;
    }
    // SAFETY: non-null getenv results point at a NUL-terminated string.
    let value = unsafe { CStr::from_ptr(raw) };
    match value.to_str().ok().and_then(|s| s.parse::<usize>().ok()) {
        Some(bytes) if bytes > 0 => bytes,
        _ => DEFAULT_ARENA_BYTES,
    }
}
