//! Dispatch engine for Switchyard.
//!
//! Ties routing, contracts, agents, and the ledger together: one
//! [`DispatchEngine::dispatch`] call takes a validated request through the
//! gate, the governance checks, the generate/validate/repair loop, and the
//! atomic ledger commit, and returns the report document callers print.

mod engine;
mod error;
mod parse;

pub use engine::{DispatchEngine, DispatchOptions};
pub use error::DispatchError;
