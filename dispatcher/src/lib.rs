//! Pull request dispatch bot for conda-forge style feedstocks.
//!
//! A `repository_dispatch` event names an action and a pull request. The bot
//! clones the pull request's head branch, applies the action (rerender or
//! version update), pushes the result back and reports on the pull request.
//!
//! - **[`core`]**: Pure, deterministic logic (requests, outcomes, notices,
//!   version ordering, recipe text). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (git, HTTP, GitHub API, subprocesses).
//!   Isolated behind traits to enable fakes in tests.
//!
//! Orchestration modules ([`pipeline`], [`rerender`], [`update`], [`notify`])
//! combine core logic with I/O to implement one dispatch run.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod notify;
pub mod pipeline;
pub mod rerender;
pub mod resolve;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod update;
pub mod workflow_guard;
