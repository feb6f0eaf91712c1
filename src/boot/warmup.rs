//! Unrestricted-phase stdio warm-up.
//!
//! glibc probes each stream with `fstat` the first time it is really used;
//! deferred into SECCOMP strict mode, that probe kills the process. The
//! warm-up forces every probe while syscalls are still unrestricted: a
//! flushed write on each output stream, plus one non-blocking read on
//! stdin with the original flags restored afterward.

use std::ffi::CStr;

use nix::errno::Errno;

use crate::config::types::{Result, SetupError};
use crate::kernel::stdio::{self, EOF};

/// Banner written to both output streams during warm-up. A write that
/// produces no bytes does not trigger the probe, so some visible output is
/// unavoidable; the fixed text keeps it trivial to strip downstream.
pub const WARMUP_BANNER: &str = "<<entering SECCOMP mode>>\n";

const BANNER: &CStr = c"<<entering SECCOMP mode>>\n";

/// Stream operations the controller performs while still unrestricted.
///
/// A trait seam so simulated startups can record the warm-up instead of
/// touching the process's real streams.
pub trait StreamWarmup {
    fn warm_streams(&mut self) -> Result<()>;
}

/// Production warm-up against the process's real glibc streams.
pub struct LibcStdio;

impl StreamWarmup for LibcStdio {
    fn warm_streams(&mut self) -> Result<()> {
        // SAFETY: BANNER is NUL-terminated and glibc's stream objects are
        // valid for the process lifetime.
        unsafe {
            stdio::fputs(BANNER.as_ptr(), stdio::stdout);
            stdio::fflush(stdio::stdout);
            stdio::fputs(BANNER.as_ptr(), stdio::stderr);
            stdio::fflush(stdio::stderr);
        }

        // One real read triggers the stdin probe; non-blocking so it cannot
        // stall when no input is pending. A consumed character is pushed
        // back.
        // SAFETY: fcntl on fd 0 with F_GETFL/F_SETFL; fgetc/ungetc operate
        // on glibc's stdin stream.
        unsafe {
            let flags = libc::fcntl(libc::STDIN_FILENO, libc::F_GETFL, 0);
            if flags < 0 {
                return Err(SetupError::Warmup(format!(
                    "fcntl(F_GETFL) on stdin failed: {}",
                    Errno::last()
                )));
            }
            if libc::fcntl(libc::STDIN_FILENO, libc::F_SETFL, flags | libc::O_NONBLOCK) < 0 {
                return Err(SetupError::Warmup(format!(
                    "fcntl(F_SETFL) on stdin failed: {}",
                    Errno::last()
                )));
            }
            let c = stdio::fgetc(stdio::stdin);
            if c != EOF {
                stdio::ungetc(c, stdio::stdin);
            }
            if libc::fcntl(libc::STDIN_FILENO, libc::F_SETFL, flags) < 0 {
                return Err(SetupError::Warmup(format!(
                    "failed to restore stdin flags: {}",
                    Errno::last()
                )));
            }
        }
        Ok(())
    }
}
