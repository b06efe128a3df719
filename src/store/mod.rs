//! Persistence for conversations, chat turns and agent turns
//!
//! SQLite behind an r2d2 pool. File databases run in WAL mode with a busy
//! timeout so concurrent writers queue on SQLite's write lock instead of
//! failing.

mod conversation;
mod schema;
mod types;

use std::path::Path;
use std::time::Duration;

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::error::Result;

pub use conversation::ConversationStore;
pub use schema::SCHEMA_VERSION;
pub use types::{AgentTurn, ChatTurn, Conversation, Sender, TurnType};

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Pooled database connection
pub type DbConn = PooledConnection<SqliteConnectionManager>;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

fn configure_connection(conn: &mut Connection) -> rusqlite::Result<()> {
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.pragma_update(None, "foreign_keys", true)?;
    Ok(())
}

/// Open (creating if needed) a database file and run migrations.
///
/// # Errors
///
/// Returns error if database cannot be opened or initialized
pub fn init<P: AsRef<Path>>(path: P) -> Result<DbPool> {
    if let Some(parent) = path.as_ref().parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let manager = SqliteConnectionManager::file(path.as_ref()).with_init(|conn| {
        configure_connection(conn)?;
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
            row.get::<_, String>(0)
        })?;
        Ok(())
    });
    let pool = Pool::builder().max_size(4).build(manager)?;

    let conn = pool.get()?;
    schema::init(&conn)?;

    tracing::info!(
        version = SCHEMA_VERSION,
        path = %path.as_ref().display(),
        "database initialized"
    );
    Ok(pool)
}

/// Initialize an in-memory database (for testing)
///
/// Single connection, since every in-memory connection is its own database.
///
/// # Errors
///
/// Returns error if database cannot be initialized
pub fn init_memory() -> Result<DbPool> {
    let manager = SqliteConnectionManager::memory().with_init(configure_connection);
    let pool = Pool::builder().max_size(1).build(manager)?;

    let conn = pool.get()?;
    schema::init(&conn)?;

    Ok(pool)
}
