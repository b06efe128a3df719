//! Conversation service - the top-level message handler
//!
//! Composes the [`ConversationEngine`] (which talks to the model) with the
//! [`OutboundSender`] (which talks to the messaging platform). Neither knows
//! about the other; this type sequences them for each inbound message.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::agent::{ConversationEngine, EngineReply};
use crate::bus::InboundMessage;
use crate::channels::OutboundSender;
use crate::dispatcher::MessageHandler;
use crate::error::Result;
use crate::events::ReplyMessage;
use crate::store::Sender;

/// Handles one customer message end to end.
pub struct ConversationService {
    engine: Arc<ConversationEngine>,
    sender: OutboundSender,
}

impl ConversationService {
    pub fn new(engine: Arc<ConversationEngine>, sender: OutboundSender) -> Self {
        Self { engine, sender }
    }

    pub fn engine(&self) -> &ConversationEngine {
        &self.engine
    }

    /// Run `msg` through the engine and deliver the reply.
    ///
    /// Returns `Ok(None)` for messages with nothing to say to the model.
    /// A conversation the model closed is ended even when the reply could
    /// not be delivered; the delivery error is still returned.
    pub async fn handle(&self, msg: &InboundMessage) -> Result<Option<EngineReply>> {
        let Some(prompt) = msg.prompt_text() else {
            debug!(message_id = %msg.message_id, "Message has no usable content");
            return Ok(None);
        };

        let conversation = self
            .engine
            .resolve_conversation(&msg.correspondent_id, msg.timestamp)?;
        let mut session = self.engine.open_session(conversation).await?;
        let conversation_id = session.conversation_id();

        self.engine.store().append_chat_turn(
            conversation_id,
            Sender::Customer,
            msg.timestamp,
            &prompt,
        )?;

        let reply = self.engine.respond(&session, &prompt).await?;

        let delivered = if reply.text.trim().is_empty() {
            debug!(conversation_id, "Nothing to send");
            Ok(())
        } else {
            self.sender
                .send(
                    conversation_id,
                    ReplyMessage::text(&msg.correspondent_id, &reply.text),
                )
                .await
                .map(|_| ())
        };

        if reply.closed {
            if delivered.is_err() {
                warn!(conversation_id, "Closing conversation although the reply was not delivered");
            }
            self.engine
                .end_conversation(&mut session, reply.intent.as_deref())?;
        }
        self.engine.close_session(session);

        delivered?;
        info!(
            conversation_id,
            iterations = reply.iterations,
            tool_calls = reply.tool_calls,
            closed = reply.closed,
            "Reply delivered"
        );
        Ok(Some(reply))
    }
}

#[async_trait]
impl MessageHandler for ConversationService {
    async fn on_message(&self, msg: InboundMessage) -> Result<()> {
        self.handle(&msg).await.map(|_| ())
    }
}
