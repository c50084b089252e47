//! Stable exit codes for dispatcher CLI commands.

/// Every stage that ran finished without error and its changes were pushed.
pub const OK: i32 = 0;
/// A mutation stage errored, a push failed, or plumbing (clone, API) broke.
pub const FAILED: i32 = 1;
/// The event, configuration or pull request state was rejected before mutating.
pub const INVALID: i32 = 2;
