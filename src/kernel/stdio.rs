//! Minimal glibc stdio FFI surface.
//!
//! The warm-up phase and the termination shim operate on the *C* stdio
//! streams: the protected program is a C program, and its buffered output
//! lives in glibc's `FILE` objects, not in Rust's stdout handle. The
//! symbols are declared here directly.

use libc::{c_char, c_int, FILE};

pub const EOF: c_int = -1;

extern "C" {
    pub static mut stdin: *mut FILE;
    pub static mut stdout: *mut FILE;
    pub static mut stderr: *mut FILE;

    pub fn fflush(stream: *mut FILE) -> c_int;
    pub fn fputs(s: *const c_char, stream: *mut FILE) -> c_int;
    pub fn fgetc(stream: *mut FILE) -> c_int;
    pub fn ungetc(c: c_int, stream: *mut FILE) -> c_int;
}

/// Flush both C output streams.
///
/// Used during warm-up and by the termination shim; legal under SECCOMP
/// strict mode, where flushing only issues `write`.
pub fn flush_standard_streams() {
    // SAFETY: glibc's stream objects are valid for the process lifetime.
    unsafe {
        fflush(stdout);
        fflush(stderr);
    }
}
