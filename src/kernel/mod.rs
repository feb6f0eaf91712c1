//! Kernel-facing primitives: seccomp activation and the glibc stdio
//! surface shared by warm-up and termination.

pub mod seccomp;
pub mod stdio;
