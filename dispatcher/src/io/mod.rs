//! I/O adapters for dispatch runs.

pub mod config;
pub mod event;
pub mod forge_config;
pub mod generator;
pub mod git;
pub mod github;
pub mod http;
pub mod patcher;
pub mod process;
pub mod publish;
pub mod sources;
pub mod workspace;
