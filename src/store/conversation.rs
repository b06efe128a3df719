//! Conversation repository
//!
//! Every method takes a pooled connection, runs one statement (or one
//! transaction) and returns once SQLite has committed it. Calls are
//! synchronous; they are short and the pool keeps them off a shared lock.

use std::path::Path;

use rusqlite::{params, OptionalExtension, Row, TransactionBehavior};

use super::types::{AgentTurn, ChatTurn, Conversation, Sender, TurnType};
use super::{init, init_memory, DbConn, DbPool};
use crate::error::{GatewayError, Result};

const CONVERSATION_COLUMNS: &str = "id, customer_id, start_time, end_time, intent";

/// Durable record of conversations and their turns.
#[derive(Clone)]
pub struct ConversationStore {
    pool: DbPool,
}

impl ConversationStore {
    /// Wrap an existing pool. Migrations must already have run.
    #[must_use]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Open a database file, creating and migrating it as needed.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(init(path)?))
    }

    /// Fresh in-memory database.
    pub fn in_memory() -> Result<Self> {
        Ok(Self::new(init_memory()?))
    }

    fn conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    // ------------------------------------------------------------------
    // Conversations
    // ------------------------------------------------------------------

    /// Insert a new open conversation.
    ///
    /// # Errors
    ///
    /// `ConstraintViolation` if the customer already has an open conversation.
    pub fn create_conversation(&self, customer_id: &str, start_time: i64) -> Result<Conversation> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO conversations (customer_id, start_time) VALUES (?1, ?2)",
            params![customer_id, start_time],
        )?;
        let id = conn.last_insert_rowid();

        tracing::debug!(conversation_id = id, customer_id, "conversation created");
        Ok(Conversation {
            id,
            customer_id: customer_id.to_string(),
            start_time,
            end_time: None,
            intent: None,
        })
    }

    /// The customer's open conversation, if any.
    pub fn get_active_conversation(&self, customer_id: &str) -> Result<Option<Conversation>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM conversations
             WHERE customer_id = ?1 AND end_time IS NULL
             ORDER BY start_time DESC, id DESC LIMIT 1",
            CONVERSATION_COLUMNS
        );
        Ok(conn
            .query_row(&sql, [customer_id], map_conversation)
            .optional()?)
    }

    /// Reuse the open conversation or insert one, atomically.
    ///
    /// Returns the conversation and whether it was created by this call.
    pub fn get_or_create_conversation(
        &self,
        customer_id: &str,
        start_time: i64,
    ) -> Result<(Conversation, bool)> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let sql = format!(
            "SELECT {} FROM conversations
             WHERE customer_id = ?1 AND end_time IS NULL
             ORDER BY start_time DESC, id DESC LIMIT 1",
            CONVERSATION_COLUMNS
        );
        let existing = tx
            .query_row(&sql, [customer_id], map_conversation)
            .optional()?;
        if let Some(conversation) = existing {
            tx.commit()?;
            return Ok((conversation, false));
        }

        tx.execute(
            "INSERT INTO conversations (customer_id, start_time) VALUES (?1, ?2)",
            params![customer_id, start_time],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        tracing::debug!(conversation_id = id, customer_id, "conversation created");
        Ok((
            Conversation {
                id,
                customer_id: customer_id.to_string(),
                start_time,
                end_time: None,
                intent: None,
            },
            true,
        ))
    }

    /// Close an open conversation.
    ///
    /// # Errors
    ///
    /// `NotFound` if no open conversation has this id.
    pub fn end_conversation(
        &self,
        conversation_id: i64,
        end_time: i64,
        intent: Option<&str>,
    ) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE conversations SET end_time = ?2, intent = ?3
             WHERE id = ?1 AND end_time IS NULL",
            params![conversation_id, end_time, intent],
        )?;
        if updated == 0 {
            return Err(GatewayError::NotFound(format!(
                "open conversation {}",
                conversation_id
            )));
        }
        tracing::debug!(conversation_id, ?intent, "conversation ended");
        Ok(())
    }

    pub fn get_conversation(&self, conversation_id: i64) -> Result<Option<Conversation>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM conversations WHERE id = ?1",
            CONVERSATION_COLUMNS
        );
        Ok(conn
            .query_row(&sql, [conversation_id], map_conversation)
            .optional()?)
    }

    /// All conversations of a customer, oldest first.
    pub fn list_conversations(&self, customer_id: &str) -> Result<Vec<Conversation>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM conversations WHERE customer_id = ?1 ORDER BY start_time, id",
            CONVERSATION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map([customer_id], map_conversation)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // ------------------------------------------------------------------
    // Turns
    // ------------------------------------------------------------------

    pub fn append_chat_turn(
        &self,
        conversation_id: i64,
        sender: Sender,
        timestamp: i64,
        message: &str,
    ) -> Result<ChatTurn> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO chat_messages (conversation_id, sender, timestamp, message)
             VALUES (?1, ?2, ?3, ?4)",
            params![conversation_id, sender.as_str(), timestamp, message],
        )?;
        Ok(ChatTurn {
            id: conn.last_insert_rowid(),
            conversation_id,
            sender,
            timestamp,
            message: message.to_string(),
        })
    }

    pub fn append_agent_turn(
        &self,
        conversation_id: i64,
        sender: Sender,
        turn_type: TurnType,
        data: &str,
    ) -> Result<AgentTurn> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO agent_messages (conversation_id, type, sender, data)
             VALUES (?1, ?2, ?3, ?4)",
            params![conversation_id, turn_type.as_str(), sender.as_str(), data],
        )?;
        Ok(AgentTurn {
            id: conn.last_insert_rowid(),
            conversation_id,
            turn_type,
            sender,
            data: data.to_string(),
        })
    }

    /// Agent turns in insertion order.
    pub fn list_agent_turns(&self, conversation_id: i64) -> Result<Vec<AgentTurn>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, conversation_id, type, sender, data
             FROM agent_messages WHERE conversation_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map([conversation_id], |row| {
            Ok(AgentTurn {
                id: row.get(0)?,
                conversation_id: row.get(1)?,
                turn_type: parse_column(row, 2, TurnType::parse)?,
                sender: parse_column(row, 3, Sender::parse)?,
                data: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Chat turns in insertion order.
    pub fn list_chat_turns(&self, conversation_id: i64) -> Result<Vec<ChatTurn>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, conversation_id, sender, timestamp, message
             FROM chat_messages WHERE conversation_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map([conversation_id], |row| {
            Ok(ChatTurn {
                id: row.get(0)?,
                conversation_id: row.get(1)?,
                sender: parse_column(row, 2, Sender::parse)?,
                timestamp: row.get(3)?,
                message: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

fn map_conversation(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    Ok(Conversation {
        id: row.get(0)?,
        customer_id: row.get(1)?,
        start_time: row.get(2)?,
        end_time: row.get(3)?,
        intent: row.get(4)?,
    })
}

fn parse_column<T>(row: &Row<'_>, idx: usize, parse: fn(&str) -> Option<T>) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            format!("unexpected value '{}'", raw).into(),
        )
    })
}
