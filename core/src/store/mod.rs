//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! Callers use store methods; they never execute SQL directly.

use crate::error::{CoreError, CoreResult};
use rusqlite::Connection;

mod chargeback;
mod quote;

pub struct CoreStore {
    conn: Connection,
}

impl CoreStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &str) -> CoreResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode only matters for real files; in-memory ignores it.
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> CoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> CoreResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_quotes.sql"))?;
        Ok(())
    }
}

fn corrupt_row(what: &str, detail: impl std::fmt::Display) -> CoreError {
    CoreError::Other(anyhow::anyhow!("store: corrupt {what}: {detail}"))
}
