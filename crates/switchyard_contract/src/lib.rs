//! Per-agent output contracts and the generated-document validator.
//!
//! A contract declares what an agent's output must and must not contain.
//! The store ships compiled-in contracts for every known agent and can be
//! overridden from a TOML file; validation collects every violation in one
//! pass so the repair prompt can list them all.

mod error;
mod store;
mod validate;

pub use error::{ContractError, Result};
pub use store::{AgentContract, ContractStore, KNOWN_AGENTS};
pub use validate::{
    flatten_text, validate_document, ContractViolation, CLASSIFICATION_LEVELS, CODE_BAD_TYPE,
    CODE_FORBIDDEN_TOKEN, CODE_MISSING_FIELD, CODE_OUT_OF_RANGE, CODE_UNKNOWN_TABLE,
    CODE_UNKNOWN_VALUE, KNOWN_LEDGER_TABLES, STRUCTURED_CONTENT_MAX_CHARS, SUMMARY_MAX_CHARS,
};
