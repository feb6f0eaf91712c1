//! Shared error types and reserved exit statuses.

use nix::errno::Errno;
use thiserror::Error;

/// Failures of the unrestricted setup window.
///
/// Every variant is fatal in the preload path: the sandbox cannot safely
/// proceed without the arena, the real entry point, and the restriction all
/// in place, so there is no retry tier. Library embedders get the error
/// back and decide for themselves.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SetupError {
    #[error("failed to map heap arena: {0}")]
    ArenaMap(Errno),

    #[error("could not resolve the real runtime entry point: {0}")]
    EntryResolution(&'static str),

    #[error("seccomp activation failed: {0}")]
    Restriction(Errno),

    #[error("seccomp restriction already active")]
    AlreadyRestricted,

    #[error("stdio warm-up failed: {0}")]
    Warmup(String),
}

pub type Result<T> = std::result::Result<T, SetupError>;

/// Reserved process exit statuses for unrecoverable setup failures.
///
/// Normal program termination never produces these; a real main's return
/// value passes through the termination shim unchanged.
pub mod status {
    /// The real `__libc_start_main` could not be resolved.
    pub const ENTRY_RESOLUTION_FAILED: i32 = 120;
    /// `prctl(PR_SET_SECCOMP, SECCOMP_MODE_STRICT)` failed.
    pub const RESTRICTION_FAILED: i32 = 121;
    /// A path that is unreachable by construction was hit.
    pub const UNREACHABLE: i32 = 122;
    /// The heap arena could not be mapped.
    pub const ARENA_MAP_FAILED: i32 = 123;
}

#[cfg(test)]
mod tests {
    use super::status;

    #[test]
    fn reserved_statuses_are_distinct() {
        let codes = [
            status::ENTRY_RESOLUTION_FAILED,
            status::RESTRICTION_FAILED,
            status::UNREACHABLE,
            status::ARENA_MAP_FAILED,
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in codes.iter().skip(i + 1) {
                assert_ne!(a, b);
            }
            // Outside the 0-119 range ordinary programs use for their own
            // exit codes in this deployment.
            assert!(*a >= 120 && *a <= 125);
        }
    }
}
