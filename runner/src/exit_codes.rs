//! Stable exit codes for sctest CLI commands.

/// Command succeeded; every run passed.
pub const OK: i32 = 0;
/// A test run failed.
pub const FAILED: i32 = 1;
/// Invalid configuration, arguments or other setup errors.
pub const INVALID: i32 = 2;
