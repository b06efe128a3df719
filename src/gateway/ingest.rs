//! Ingestion pipeline: webhook body → normalized messages on the bus.

use std::sync::Arc;

use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};

use crate::bus::{ContactProfile, InboundMessage, MediaAttachment, MessageBus};
use crate::channels::MediaSource;
use crate::error::Result;
use crate::events::{ChangeValue, MessageEvent, MessageType, WebhookEvent};
use crate::log_component;
use crate::utils::string::preview;

use super::IdempotencyStore;

/// Query parameters of the subscription handshake.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct VerifyParams {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// What one webhook body produced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestOutcome {
    /// Messages pushed onto the bus
    pub enqueued: usize,
    /// Redeliveries dropped by deduplication
    pub duplicates: usize,
    /// Messages of kinds the gateway does not handle
    pub skipped: usize,
    /// Delivery/read receipts seen (never enqueued)
    pub statuses: usize,
    /// The body was not a WhatsApp Business notification
    pub ignored: bool,
}

/// Validates webhook traffic and feeds the message bus.
pub struct IngestPipeline {
    bus: Arc<MessageBus>,
    verify_token: String,
    media: Option<Arc<dyn MediaSource>>,
    dedup: Option<IdempotencyStore>,
}

impl IngestPipeline {
    pub fn new(bus: Arc<MessageBus>, verify_token: &str) -> Self {
        Self {
            bus,
            verify_token: verify_token.to_string(),
            media: None,
            dedup: None,
        }
    }

    /// Download media attachments through `media` before enqueueing.
    pub fn with_media_source(mut self, media: Arc<dyn MediaSource>) -> Self {
        self.media = Some(media);
        self
    }

    /// Drop redeliveries of message ids seen recently.
    pub fn with_dedup(mut self, dedup: IdempotencyStore) -> Self {
        self.dedup = Some(dedup);
        self
    }

    pub fn bus(&self) -> &Arc<MessageBus> {
        &self.bus
    }

    pub fn dedup(&self) -> Option<&IdempotencyStore> {
        self.dedup.as_ref()
    }

    /// Subscription handshake: the challenge to echo, or `None` to refuse.
    pub fn verify(&self, params: &VerifyParams) -> Option<String> {
        if params.mode.as_deref() != Some("subscribe") {
            return None;
        }
        let presented = params.verify_token.as_deref()?;
        if self.verify_token.is_empty() {
            warn!("Webhook verification refused: no verify token configured");
            return None;
        }
        let matches: bool = presented
            .as_bytes()
            .ct_eq(self.verify_token.as_bytes())
            .into();
        if !matches {
            warn!("Webhook verification failed: token mismatch");
            return None;
        }
        let challenge = params.challenge.clone()?;
        info!("Webhook verified");
        Some(challenge)
    }

    /// Parse a notification body and enqueue every message it carries.
    ///
    /// # Errors
    ///
    /// `MalformedEvent` when the body does not parse, `BusClosed` when the
    /// queue no longer accepts messages. Media download failures are not
    /// errors; the message is enqueued without a local file.
    pub async fn ingest(&self, body: &[u8]) -> Result<IngestOutcome> {
        let event = WebhookEvent::parse(body)?;
        let mut outcome = IngestOutcome::default();

        if !event.is_whatsapp() {
            debug!(object = %event.object, "Ignoring non-WhatsApp notification");
            outcome.ignored = true;
            return Ok(outcome);
        }

        for value in event.message_changes() {
            for status in &value.statuses {
                debug!(
                    id = %status.id,
                    status = %status.status,
                    recipient = %status.recipient_id,
                    "Status update"
                );
                outcome.statuses += 1;
            }

            for message in &value.messages {
                if let Some(dedup) = &self.dedup {
                    if !dedup.check_and_record(&message.id) {
                        log_component!(
                            info,
                            "ingest",
                            "Duplicate delivery dropped",
                            message_id = message.id.as_str()
                        );
                        outcome.duplicates += 1;
                        continue;
                    }
                }

                match self.normalize(value, message).await {
                    Some(inbound) => {
                        info!(
                            message_id = %inbound.message_id,
                            from = %inbound.correspondent_id,
                            kind = message.kind.as_str(),
                            text = %preview(inbound.text.as_deref().unwrap_or(""), 60),
                            "Inbound message"
                        );
                        if let Err(e) = self.bus.publish_inbound(inbound) {
                            // Not delivered, so a redelivery must not count as a duplicate
                            if let Some(dedup) = &self.dedup {
                                dedup.forget(&message.id);
                            }
                            return Err(e);
                        }
                        outcome.enqueued += 1;
                    }
                    None => {
                        debug!(
                            message_id = %message.id,
                            kind = message.kind.as_str(),
                            "Skipping unsupported message kind"
                        );
                        outcome.skipped += 1;
                    }
                }
            }
        }

        Ok(outcome)
    }

    async fn normalize(&self, value: &ChangeValue, message: &MessageEvent) -> Option<InboundMessage> {
        let timestamp = message
            .timestamp_secs()
            .unwrap_or_else(|| chrono::Utc::now().timestamp());

        let inbound = match message.kind {
            MessageType::Text => {
                let body = message.text.as_ref()?.body.as_str();
                InboundMessage::text(&message.id, &message.from, body, timestamp)
            }
            MessageType::Image | MessageType::Audio | MessageType::Video | MessageType::Document => {
                let (media_type, object) = message.media()?;
                let mut attachment =
                    MediaAttachment::new(media_type, &object.id, &object.mime_type);
                attachment.sha256 = object.sha256.clone();
                attachment.filename = object.filename.clone();
                attachment.caption = object.caption.clone();
                attachment.file = self.fetch(&attachment).await;
                InboundMessage::media(&message.id, &message.from, attachment, timestamp)
            }
            _ => return None,
        };

        let inbound = inbound.with_metadata("phone_number_id", &value.metadata.phone_number_id);
        Some(match value.contact_for(&message.from) {
            Some(contact) => inbound.with_contact(ContactProfile {
                wa_id: contact.wa_id.clone(),
                name: contact.profile.name.clone(),
            }),
            None => inbound,
        })
    }

    async fn fetch(&self, attachment: &MediaAttachment) -> Option<std::path::PathBuf> {
        let media = self.media.as_ref()?;
        match media.fetch_media(attachment).await {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(
                    media_id = %attachment.media_id,
                    mime_type = %attachment.mime_type,
                    error = %e,
                    "Media download failed"
                );
                None
            }
        }
    }
}
