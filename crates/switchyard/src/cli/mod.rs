//! CLI command modules for the switchyard binary.
//!
//! Each module carries its clap args and a `run` function returning the
//! process exit code; `main` only parses, loads config, and dispatches.

pub mod approve;
pub mod init;
pub mod ledger_cmd;
pub mod output;
pub mod review;
pub mod route;
pub mod task;
