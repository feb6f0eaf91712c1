//! Process termination for restricted mode.
//!
//! glibc's `exit` tears the runtime down and finishes with `exit_group`,
//! which SECCOMP strict mode does not permit. This shim flushes the C
//! stdio streams and leaves through the plain thread-exit syscall instead.
//! Every real-main return and every unexpected real-init return is routed
//! here; control must never fall back into the runtime's own teardown.

use crate::kernel::stdio;

/// Flush both output streams, then end the process with `status`.
///
/// Never returns. The exit syscall is re-issued in a loop: were it ever to
/// come back, falling through would reach teardown code that performs
/// forbidden syscalls.
pub fn terminate(status: libc::c_int) -> ! {
    stdio::flush_standard_streams();
    loop {
        // SAFETY: SYS_exit takes only the status value.
        unsafe {
            libc::syscall(libc::SYS_exit, status as libc::c_long);
        }
    }
}
