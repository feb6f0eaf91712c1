//! Termination shim behavior, observed from a forked child.
//!
//! One test, alone in this file: `terminate` is exercised in a forked
//! child, and forking is only safe while the test process has a single
//! thread.

use std::os::unix::io::RawFd;

use strictbox::kernel::stdio;
use strictbox::terminate;

fn read_all(fd: RawFd) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = [0u8; 256];
    loop {
        // SAFETY: `buf` is writable for its full length.
        let n = unsafe { libc::read(fd, buf.as_mut_ptr().cast(), buf.len()) };
        if n <= 0 {
            break;
        }
        out.extend_from_slice(&buf[..n as usize]);
    }
    out
}

#[test]
fn terminate_flushes_buffered_output_and_exits_with_status() {
    let mut fds = [0 as RawFd; 2];
    // SAFETY: `fds` holds space for both pipe ends.
    assert_eq!(unsafe { libc::pipe(fds.as_mut_ptr()) }, 0);
    let [read_fd, write_fd] = fds;

    // SAFETY: single-threaded at this point; the child only touches fds
    // and exits through `terminate`.
    let pid = unsafe { libc::fork() };
    assert!(pid >= 0, "fork failed");

    if pid == 0 {
        // Child: stdout goes to the pipe; leave a line buffered so only
        // the shim's flush can surface it.
        unsafe {
            libc::close(read_fd);
            libc::dup2(write_fd, libc::STDOUT_FILENO);
            stdio::fputs(c"buffered before terminate".as_ptr(), stdio::stdout);
        }
        terminate(42);
    }

    // SAFETY: closing our copy of the write end.
    unsafe { libc::close(write_fd) };
    let output = read_all(read_fd);
    // SAFETY: closing the read end after EOF.
    unsafe { libc::close(read_fd) };

    let mut status = 0;
    // SAFETY: `status` is an out-parameter for the child's exit status.
    let waited = unsafe { libc::waitpid(pid, &mut status, 0) };
    assert_eq!(waited, pid);
    assert!(libc::WIFEXITED(status), "child did not exit normally");
    assert_eq!(libc::WEXITSTATUS(status), 42);

    assert!(
        output.ends_with(b"buffered before terminate"),
        "buffered output lost: {:?}",
        String::from_utf8_lossy(&output)
    );
}
