//! Conversation listing and transcript commands.

use anyhow::{bail, Context, Result};
use chrono::DateTime;

use wagate::config::Config;
use wagate::store::ConversationStore;

fn fmt_time(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| ts.to_string())
}

fn open_store(config: &Config) -> Result<ConversationStore> {
    let path = config.db_path();
    if !path.exists() {
        bail!("No database at {}", path.display());
    }
    ConversationStore::open(&path).with_context(|| format!("Failed to open {}", path.display()))
}

/// List a customer's conversations, oldest first.
pub(crate) fn cmd_conversations(config: &Config, customer_id: &str) -> Result<()> {
    let store = open_store(config)?;
    let conversations = store.list_conversations(customer_id)?;
    if conversations.is_empty() {
        println!("No conversations for {}", customer_id);
        return Ok(());
    }

    println!("{:>6}  {:<19}  {:<19}  INTENT", "ID", "STARTED", "ENDED");
    for c in conversations {
        let ended = c
            .end_time
            .map(fmt_time)
            .unwrap_or_else(|| "(open)".to_string());
        println!(
            "{:>6}  {:<19}  {:<19}  {}",
            c.id,
            fmt_time(c.start_time),
            ended,
            c.intent.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

/// Print the chat transcript, or the agent turns with `agent`.
pub(crate) fn cmd_transcript(config: &Config, conversation_id: i64, agent: bool) -> Result<()> {
    let store = open_store(config)?;
    let Some(conversation) = store.get_conversation(conversation_id)? else {
        bail!("Conversation {} not found", conversation_id);
    };
    println!(
        "Conversation {} with {} ({})",
        conversation.id,
        conversation.customer_id,
        if conversation.is_open() { "open" } else { "closed" }
    );

    if agent {
        for turn in store.list_agent_turns(conversation_id)? {
            println!(
                "#{} {} {}: {}",
                turn.id,
                turn.sender.as_str(),
                turn.turn_type.as_str(),
                turn.data
            );
        }
    } else {
        for turn in store.list_chat_turns(conversation_id)? {
            println!(
                "[{}] {}: {}",
                fmt_time(turn.timestamp),
                turn.sender.as_str(),
                turn.message
            );
        }
    }
    Ok(())
}
