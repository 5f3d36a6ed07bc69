//! Stable exit codes for corrector CLI commands.

/// Command succeeded, or the workflow accepted a result.
pub const OK: i32 = 0;
/// Command failed due to invalid input/config or other errors.
pub const INVALID: i32 = 1;
/// The workflow ended without an accepted result (retries exhausted or cancelled).
pub const FAILED: i32 = 2;
