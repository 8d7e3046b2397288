//! Audit ledger for Switchyard.
//!
//! This crate is the single source of truth for ledger persistence. All
//! interfaces (CLI, dispatch engine) go through [`Ledger`]; no other crate
//! issues raw SQL.
//!
//! # Usage
//!
//! ```rust,ignore
//! use switchyard_ledger::Ledger;
//!
//! let ledger = Ledger::open("~/.switchyard/ledger.sqlite3").await?;
//! ledger.ensure_session("sess-1", Initiator::User).await?;
//! let task = ledger.pop_next_task(false).await?;
//! ```

mod error;
mod schema;
mod types;

// Method implementations organized by domain
mod audit;
mod tasks;

pub use error::{LedgerError, Result};
pub use tasks::ReviewVerdict;
pub use types::{
    override_subject, ActionRecord, ArtifactRecord, DecisionRecord, SessionRecord, TaskMeta,
    TaskRecord,
};

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::path::Path;
use tracing::info;

/// The Switchyard audit ledger.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct Ledger {
    pool: SqlitePool,
}

impl Ledger {
    /// Open or create a ledger at the given path.
    ///
    /// Creates the parent directory and all tables if they don't exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.display());

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;

        let ledger = Self { pool };
        ledger.ensure_schema().await?;

        info!(path = %path.display(), "Ledger opened");

        Ok(ledger)
    }

    /// Open an in-memory ledger. Used by tests and dry runs.
    pub async fn open_in_memory() -> Result<Self> {
        // One connection: each new :memory: connection is a fresh database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await?;

        let ledger = Self { pool };
        ledger.ensure_schema().await?;
        Ok(ledger)
    }

    /// The underlying pool (escape hatch for the test suite).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the ledger connection.
    pub async fn close(self) {
        self.pool.close().await;
    }
}
