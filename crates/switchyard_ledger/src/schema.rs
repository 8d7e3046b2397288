//! Ledger schema creation.
//!
//! All CREATE TABLE statements live here - single source of truth.

use crate::error::Result;
use crate::Ledger;
use tracing::info;

impl Ledger {
    /// Ensure all ledger tables exist.
    pub(crate) async fn ensure_schema(&self) -> Result<()> {
        // WAL keeps readers out of the writers' way
        sqlx::query("PRAGMA journal_mode=WAL")
            .execute(self.pool())
            .await?;
        sqlx::query("PRAGMA synchronous=NORMAL")
            .execute(self.pool())
            .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS sy_sessions (
                id TEXT PRIMARY KEY,
                initiator TEXT NOT NULL DEFAULT 'user' CHECK (initiator IN ('user','system')),
                status TEXT NOT NULL DEFAULT 'open' CHECK (status IN ('open','closed')),
                created_at TEXT NOT NULL,
                last_active_at TEXT NOT NULL,
                request_count INTEGER NOT NULL DEFAULT 0
            )"#,
        )
        .execute(self.pool())
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS sy_actions (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL REFERENCES sy_sessions(id),
                request_id TEXT,
                kind TEXT NOT NULL,
                intent TEXT,
                state TEXT,
                payload TEXT,
                created_at TEXT NOT NULL
            )"#,
        )
        .execute(self.pool())
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS sy_decisions (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL REFERENCES sy_sessions(id),
                action_id TEXT,
                kind TEXT NOT NULL CHECK (kind IN ('defer','approve','reject')),
                subject TEXT NOT NULL,
                reason TEXT,
                decided_by TEXT NOT NULL,
                created_at TEXT NOT NULL
            )"#,
        )
        .execute(self.pool())
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS sy_artifacts (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL REFERENCES sy_sessions(id),
                action_id TEXT,
                agent TEXT NOT NULL,
                kind TEXT NOT NULL,
                title TEXT,
                content TEXT NOT NULL,
                classification TEXT,
                repaired INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            )"#,
        )
        .execute(self.pool())
        .await?;

        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS sy_tasks (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL REFERENCES sy_sessions(id),
                title TEXT NOT NULL,
                detail TEXT,
                status TEXT NOT NULL DEFAULT 'todo' CHECK (status IN ('todo','doing','done','blocked')),
                meta TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )"#,
        )
        .execute(self.pool())
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_actions_session ON sy_actions(session_id, created_at)")
            .execute(self.pool())
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_decisions_session ON sy_decisions(session_id)")
            .execute(self.pool())
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_decisions_subject ON sy_decisions(subject)")
            .execute(self.pool())
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_artifacts_session ON sy_artifacts(session_id)")
            .execute(self.pool())
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_tasks_status ON sy_tasks(status, created_at)")
            .execute(self.pool())
            .await?;

        info!("Ledger schema verified");
        Ok(())
    }
}
