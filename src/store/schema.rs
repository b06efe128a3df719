//! Database schema and migrations

use rusqlite::Connection;

use crate::error::Result;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Bring the database up to [`SCHEMA_VERSION`].
///
/// # Errors
///
/// Returns error if a migration fails
pub fn init(conn: &Connection) -> Result<()> {
    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        migrate_v1(conn)?;
    }

    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- One row per bounded exchange with a customer
        CREATE TABLE IF NOT EXISTS conversations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            customer_id TEXT NOT NULL,
            start_time INTEGER NOT NULL,
            end_time INTEGER,
            intent TEXT
        );

        -- At most one open conversation per customer
        CREATE UNIQUE INDEX IF NOT EXISTS idx_conversations_open
            ON conversations(customer_id) WHERE end_time IS NULL;
        CREATE INDEX IF NOT EXISTS idx_conversations_customer
            ON conversations(customer_id, start_time);

        -- What the customer saw
        CREATE TABLE IF NOT EXISTS chat_messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            conversation_id INTEGER NOT NULL REFERENCES conversations(id),
            sender TEXT NOT NULL CHECK(sender IN ('customer', 'bot')),
            timestamp INTEGER NOT NULL,
            message TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_chat_messages_conversation
            ON chat_messages(conversation_id);

        -- What the model saw, including tool calls and results
        CREATE TABLE IF NOT EXISTS agent_messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            conversation_id INTEGER NOT NULL REFERENCES conversations(id),
            type TEXT NOT NULL CHECK(type IN ('text', 'function_call', 'function_response')),
            sender TEXT NOT NULL CHECK(sender IN ('customer', 'bot')),
            data TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_agent_messages_conversation
            ON agent_messages(conversation_id);

        PRAGMA user_version = 1;
        ",
    )?;

    tracing::info!("migrated to schema v1");
    Ok(())
}
