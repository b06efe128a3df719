//! Inbound webhook payload types.
//!
//! Mirrors the change-notification tree the messaging platform posts to the
//! webhook: `WebhookEvent → Entry → Change → ChangeValue → {messages,
//! statuses, contacts}`. Unknown fields are ignored; missing required fields
//! fail the whole parse with [`GatewayError::MalformedEvent`].

use serde::{Deserialize, Serialize};

use crate::bus::MediaType;
use crate::error::{GatewayError, Result};

/// `object` value for WhatsApp Business notifications.
pub const WHATSAPP_OBJECT: &str = "whatsapp_business_account";

/// Change `field` that carries messages and statuses.
pub const MESSAGES_FIELD: &str = "messages";

/// Top-level webhook notification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebhookEvent {
    /// Should always be [`WHATSAPP_OBJECT`].
    pub object: String,
    pub entry: Vec<Entry>,
}

impl WebhookEvent {
    /// Parse a raw webhook body.
    pub fn parse(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(|e| GatewayError::MalformedEvent(e.to_string()))
    }

    /// Whether this notification comes from a WhatsApp Business account.
    pub fn is_whatsapp(&self) -> bool {
        self.object == WHATSAPP_OBJECT
    }

    /// Iterate over every change value whose field is `messages`.
    pub fn message_changes(&self) -> impl Iterator<Item = &ChangeValue> {
        self.entry
            .iter()
            .flat_map(|e| e.changes.iter())
            .filter(|c| c.field == MESSAGES_FIELD)
            .map(|c| &c.value)
    }
}

/// A single entry (one business account).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Entry {
    pub id: String,
    pub changes: Vec<Change>,
}

/// A change within an entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Change {
    pub field: String,
    pub value: ChangeValue,
}

/// The value payload containing messages, statuses, contacts and metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeValue {
    #[serde(default = "default_messaging_product")]
    pub messaging_product: String,
    pub metadata: Metadata,
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(default)]
    pub messages: Vec<MessageEvent>,
    #[serde(default)]
    pub statuses: Vec<Status>,
}

fn default_messaging_product() -> String {
    "whatsapp".to_string()
}

impl ChangeValue {
    /// Find the contact profile for a sender, falling back to the first contact.
    pub fn contact_for(&self, wa_id: &str) -> Option<&Contact> {
        self.contacts
            .iter()
            .find(|c| c.wa_id == wa_id)
            .or_else(|| self.contacts.first())
    }
}

/// Metadata about the receiving business phone number.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Metadata {
    pub phone_number_id: String,
    #[serde(default)]
    pub display_phone_number: String,
}

/// Contact info for a message sender.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Contact {
    pub wa_id: String,
    pub profile: Profile,
}

/// Profile info within a contact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub name: String,
}

/// Delivery status update for a previously sent message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Status {
    pub id: String,
    pub status: String,
    pub timestamp: String,
    pub recipient_id: String,
    #[serde(default)]
    pub pricing: Option<Pricing>,
    #[serde(default)]
    pub conversation: Option<StatusConversation>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pricing {
    pub billable: bool,
    pub category: String,
    pub pricing_model: String,
}

/// Platform-side conversation window attached to a status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusConversation {
    pub id: String,
    #[serde(default)]
    pub expiration_timestamp: Option<String>,
}

/// Inbound message kinds as reported by the platform.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Audio,
    Button,
    Document,
    Reaction,
    Text,
    Image,
    Interactive,
    Order,
    Sticker,
    /// Customer number change notices
    System,
    Video,
    #[serde(other)]
    Unknown,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Audio => "audio",
            MessageType::Button => "button",
            MessageType::Document => "document",
            MessageType::Reaction => "reaction",
            MessageType::Text => "text",
            MessageType::Image => "image",
            MessageType::Interactive => "interactive",
            MessageType::Order => "order",
            MessageType::Sticker => "sticker",
            MessageType::System => "system",
            MessageType::Video => "video",
            MessageType::Unknown => "unknown",
        }
    }
}

/// A single inbound message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageEvent {
    pub id: String,
    /// Sender phone number (e.g. "60123456789").
    pub from: String,
    /// Unix timestamp as string.
    pub timestamp: String,
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default)]
    pub text: Option<TextBody>,
    #[serde(default)]
    pub image: Option<MediaObject>,
    #[serde(default)]
    pub audio: Option<MediaObject>,
    #[serde(default)]
    pub video: Option<MediaObject>,
    #[serde(default)]
    pub document: Option<MediaObject>,
}

impl MessageEvent {
    /// Unix timestamp in seconds, or `None` when the platform sent garbage.
    pub fn timestamp_secs(&self) -> Option<i64> {
        self.timestamp.trim().parse().ok()
    }

    /// The downloadable media object for media kinds.
    pub fn media(&self) -> Option<(MediaType, &MediaObject)> {
        match self.kind {
            MessageType::Image => self.image.as_ref().map(|m| (MediaType::Image, m)),
            MessageType::Audio => self.audio.as_ref().map(|m| (MediaType::Audio, m)),
            MessageType::Video => self.video.as_ref().map(|m| (MediaType::Video, m)),
            MessageType::Document => self.document.as_ref().map(|m| (MediaType::Document, m)),
            _ => None,
        }
    }
}

/// Text content within a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextBody {
    pub body: String,
}

/// Media reference within an image/audio/video/document message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaObject {
    /// Media object ID, used to resolve the download URL.
    pub id: String,
    /// MIME type, possibly with parameters (e.g. "audio/ogg; codecs=opus").
    pub mime_type: String,
    #[serde(default)]
    pub sha256: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    /// Set on voice notes.
    #[serde(default)]
    pub voice: bool,
}
