//! Stable exit codes for act CLI commands.

/// Command succeeded; the cycle limit was reached or the config was written.
pub const OK: i32 = 0;
/// Command failed due to an invalid scenario, config, or other errors.
pub const INVALID: i32 = 1;
/// `act run` stopped on the terminate instruction.
pub const TERMINATED: i32 = 2;
