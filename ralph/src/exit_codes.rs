//! Stable exit codes for `ralph` CLI commands.

/// Command succeeded (or `status` found an active loop).
pub const OK: i32 = 0;
/// Command failed due to a missing plan, unknown task, I/O or other errors.
pub const INVALID: i32 = 1;
/// `ralph status` found no active loop.
pub const INACTIVE: i32 = 2;
/// A start command was refused (loop already active, nothing left to do).
pub const REJECTED: i32 = 3;
