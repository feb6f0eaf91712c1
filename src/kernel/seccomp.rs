//! SECCOMP strict-mode activation.

use std::sync::atomic::{AtomicBool, Ordering};

use nix::errno::Errno;

use crate::config::types::{Result, SetupError};

/// One-shot, whole-process syscall restriction.
///
/// Activation is irreversible for the remainder of the process.
/// Implementations must fail a second activation attempt instead of
/// repeating it.
pub trait Restrictor {
    fn activate(&self) -> Result<()>;
}

static ACTIVATED: AtomicBool = AtomicBool::new(false);

/// Claim the single activation slot for this process.
fn claim_activation() -> bool {
    !ACTIVATED.swap(true, Ordering::SeqCst)
}

/// `prctl(PR_SET_SECCOMP, SECCOMP_MODE_STRICT)`: after activation only
/// `read`, `write`, `exit`, and `sigreturn` are permitted; any other
/// syscall kills the process.
pub struct SeccompStrict;

impl Restrictor for SeccompStrict {
    fn activate(&self) -> Result<()> {
        if !claim_activation() {
            return Err(SetupError::AlreadyRestricted);
        }
        // SAFETY: prctl with PR_SET_SECCOMP takes no out-pointers; the
        // remaining arguments are required to be zero.
        let rc = unsafe {
            libc::prctl(
                libc::PR_SET_SECCOMP,
                libc::SECCOMP_MODE_STRICT as libc::c_ulong,
                0,
                0,
                0,
            )
        };
        if rc != 0 {
            return Err(SetupError::Restriction(Errno::last()));
        }
        Ok(())
    }
}
