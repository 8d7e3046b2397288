//! Error types for the ledger layer.

use switchyard_protocol::TaskStatus;
use thiserror::Error;

/// Ledger operation result type.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Ledger errors.
#[derive(Error, Debug)]
pub enum LedgerError {
    /// SQLx error (connection, query, etc.)
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// IO error (creating the ledger directory)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error (meta/payload JSON columns)
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Row lookup failed
    #[error("Not found: {0}")]
    NotFound(String),

    /// A stored enum column no longer parses
    #[error("Corrupt ledger row: {column} = '{value}'")]
    CorruptRow { column: String, value: String },

    /// Stop-loss fired twice for the same task
    #[error("Stop-loss already triggered for task {0}")]
    StopLossAlreadyTriggered(String),

    /// Task is not in a reviewable hold
    #[error("Task {task_id} is not reviewable: {reason}")]
    NotReviewable { task_id: String, reason: String },

    /// A rejected review is terminal; no further review verdicts apply
    #[error("Task {0} has a rejected review; no further review is possible")]
    ReviewRejected(String),

    /// Retry verdict repeated on a task that already has one
    #[error("Retry already approved for task {0}")]
    RetryAlreadyApproved(String),

    /// Task transition attempted from the wrong status
    #[error("Task {task_id} cannot {attempted} from status '{status}'")]
    InvalidTaskState {
        task_id: String,
        status: TaskStatus,
        attempted: &'static str,
    },
}

impl LedgerError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub(crate) fn corrupt(column: &str, value: impl Into<String>) -> Self {
        Self::CorruptRow {
            column: column.to_string(),
            value: value.into(),
        }
    }
}
