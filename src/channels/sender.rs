//! Outbound sender: delivers a reply and records it in the chat transcript.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::Result;
use crate::events::ReplyMessage;
use crate::store::{ConversationStore, Sender};

use super::{SendReceipt, Transport};

/// Sends replies through a [`Transport`] and appends a bot `ChatTurn` for
/// every delivered message.
#[derive(Clone)]
pub struct OutboundSender {
    transport: Arc<dyn Transport>,
    store: ConversationStore,
}

impl OutboundSender {
    pub fn new(transport: Arc<dyn Transport>, store: ConversationStore) -> Self {
        Self { transport, store }
    }

    /// Deliver `reply` and record it against `conversation_id`.
    ///
    /// Nothing is recorded when delivery fails; the error is returned as is.
    pub async fn send(&self, conversation_id: i64, reply: ReplyMessage) -> Result<SendReceipt> {
        let transcript = reply.transcript_text();
        let to = reply.to.clone();

        let receipt = match self.transport.send(reply).await {
            Ok(receipt) => receipt,
            Err(e) => {
                warn!(conversation_id, to = %to, error = %e, "Reply delivery failed");
                return Err(e);
            }
        };

        let now = chrono::Utc::now().timestamp();
        self.store
            .append_chat_turn(conversation_id, Sender::Bot, now, &transcript)?;
        debug!(
            conversation_id,
            to = %to,
            message_id = receipt.message_id.as_deref().unwrap_or(""),
            "Reply recorded"
        );
        Ok(receipt)
    }
}
