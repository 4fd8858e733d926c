//! # accrue-db
//!
//! SQLite persistence for the reward ledger.
//!
//! ## Schema
//!
//! - WAL mode, foreign keys enforced
//! - Timestamps are Unix epoch seconds
//! - `rewards_per_vote` snapshots are stored as decimal TEXT (128-bit)
//! - Schema version stored in `PRAGMA user_version`
//!
//! [`store::SqliteStore`] implements the ledger's record store and
//! [`store::SqliteOutbox`] its transfer primitive. Both borrow one
//! connection, so a caller holding a transaction commits ledger records and
//! queued payouts together.

pub mod migrations;
pub mod queries;
pub mod schema;
pub mod store;

use rusqlite::Connection;
use std::path::Path;

pub use store::{SqliteOutbox, SqliteStore};

/// Current schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Database error types.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("migration failed: {0}")]
    Migration(String),

    #[error("corrupt record: {0}")]
    Corrupt(String),

    #[error("invalid stored value: {0}")]
    Type(#[from] accrue_types::TypeError),
}

pub type Result<T> = std::result::Result<T, DbError>;

impl From<DbError> for accrue_ledger::LedgerError {
    fn from(err: DbError) -> Self {
        accrue_ledger::LedgerError::Storage(err.to_string())
    }
}

/// Open or create the ledger database at the given path.
///
/// Configures WAL mode, foreign keys, and runs any pending migrations.
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    configure(&conn)?;
    migrations::run(&conn)?;
    Ok(conn)
}

/// Open an in-memory database (for testing).
pub fn open_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    migrations::run(&conn)?;
    Ok(conn)
}

/// Configure SQLite pragmas.
fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA foreign_keys = ON;
         PRAGMA busy_timeout = 5000;
         PRAGMA synchronous = NORMAL;",
    )?;
    Ok(())
}
