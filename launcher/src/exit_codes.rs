//! Stable exit codes for the launcher binary.
//!
//! When the validator step is reached, the launcher exits with the
//! validator's own code instead; these cover the cases where it cannot.

/// Validator exited cleanly.
pub const OK: i32 = 0;
/// Launcher configuration was unreadable or invalid, or another launcher fault.
pub const INVALID: i32 = 1;
/// Validator program exists but could not be executed.
pub const NOT_EXECUTABLE: i32 = 126;
/// Validator program was not found.
pub const NOT_FOUND: i32 = 127;
/// Added to the signal number when the validator is killed by a signal.
pub const SIGNAL_BASE: i32 = 128;
