//! Normalized message types carried on the bus
//!
//! The ingestion pipeline turns each platform message into an
//! [`InboundMessage`]; everything downstream of the queue works with this
//! type only and never sees the raw webhook payload.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// What the customer sent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Text,
    Media,
}

/// Represents a normalized incoming message from a customer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// Platform message id (`wamid...`), used for dedup and reply quoting
    pub message_id: String,
    /// Customer phone number; replies go back here
    pub correspondent_id: String,
    pub kind: MessageKind,
    /// Text body for text messages
    pub text: Option<String>,
    /// Attachment details for media messages
    pub media: Option<MediaAttachment>,
    /// Sender profile, when the notification carried one
    pub contact: Option<ContactProfile>,
    /// Platform timestamp, Unix seconds
    pub timestamp: i64,
    /// Additional metadata key-value pairs
    pub metadata: HashMap<String, String>,
}

/// Sender profile copied from the notification's `contacts` list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContactProfile {
    pub wa_id: String,
    pub name: String,
}

/// Represents a media attachment (image, audio, video, or document)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaAttachment {
    /// The type of media
    pub media_type: MediaType,
    /// Platform media object id
    pub media_id: String,
    pub mime_type: String,
    /// Digest announced by the platform, hex or base64
    pub sha256: Option<String>,
    /// Original filename (documents only)
    pub filename: Option<String>,
    pub caption: Option<String>,
    /// Local copy; `None` when the download failed
    pub file: Option<PathBuf>,
}

/// Types of media that can be attached to messages
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Audio,
    Video,
    Document,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Audio => "audio",
            MediaType::Video => "video",
            MediaType::Document => "document",
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl InboundMessage {
    /// Creates a new text message.
    ///
    /// # Example
    /// ```
    /// use wagate::bus::message::{InboundMessage, MessageKind};
    ///
    /// let msg = InboundMessage::text("wamid.1", "60123456789", "hello", 1_700_000_000);
    /// assert_eq!(msg.kind, MessageKind::Text);
    /// assert_eq!(msg.text.as_deref(), Some("hello"));
    /// ```
    pub fn text(message_id: &str, correspondent_id: &str, body: &str, timestamp: i64) -> Self {
        Self {
            message_id: message_id.to_string(),
            correspondent_id: correspondent_id.to_string(),
            kind: MessageKind::Text,
            text: Some(body.to_string()),
            media: None,
            contact: None,
            timestamp,
            metadata: HashMap::new(),
        }
    }

    /// Creates a new media message.
    pub fn media(
        message_id: &str,
        correspondent_id: &str,
        media: MediaAttachment,
        timestamp: i64,
    ) -> Self {
        Self {
            message_id: message_id.to_string(),
            correspondent_id: correspondent_id.to_string(),
            kind: MessageKind::Media,
            text: None,
            media: Some(media),
            contact: None,
            timestamp,
            metadata: HashMap::new(),
        }
    }

    /// Attaches the sender profile (builder pattern).
    pub fn with_contact(mut self, contact: ContactProfile) -> Self {
        self.contact = Some(contact);
        self
    }

    /// Adds a metadata key-value pair to the message (builder pattern).
    ///
    /// # Example
    /// ```
    /// use wagate::bus::message::InboundMessage;
    ///
    /// let msg = InboundMessage::text("wamid.1", "601", "hi", 0)
    ///     .with_metadata("phone_number_id", "1065");
    /// assert_eq!(msg.metadata.get("phone_number_id"), Some(&"1065".to_string()));
    /// ```
    pub fn with_metadata(mut self, key: &str, value: &str) -> Self {
        self.metadata.insert(key.to_string(), value.to_string());
        self
    }

    /// Checks if this message has any media attached.
    pub fn has_media(&self) -> bool {
        self.media.is_some()
    }

    /// The text handed to the model for this message, if any.
    ///
    /// Media messages are described by kind and local path, followed by the
    /// caption when there is one.
    pub fn prompt_text(&self) -> Option<String> {
        match self.kind {
            MessageKind::Text => self
                .text
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            MessageKind::Media => {
                let media = self.media.as_ref()?;
                let mut prompt = match &media.file {
                    Some(path) => {
                        format!("[{} attachment saved at {}]", media.media_type, path.display())
                    }
                    None => format!("[{} attachment could not be downloaded]", media.media_type),
                };
                if let Some(caption) = media.caption.as_deref().filter(|c| !c.trim().is_empty()) {
                    prompt.push('\n');
                    prompt.push_str(caption.trim());
                }
                Some(prompt)
            }
        }
    }
}

impl MediaAttachment {
    /// Creates an attachment that has not been downloaded yet.
    pub fn new(media_type: MediaType, media_id: &str, mime_type: &str) -> Self {
        Self {
            media_type,
            media_id: media_id.to_string(),
            mime_type: mime_type.to_string(),
            sha256: None,
            filename: None,
            caption: None,
            file: None,
        }
    }

    pub fn with_caption(mut self, caption: &str) -> Self {
        self.caption = Some(caption.to_string());
        self
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.file = Some(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_message() {
        let msg = InboundMessage::text("wamid.1", "601", "  hello  ", 10);
        assert!(!msg.has_media());
        assert_eq!(msg.prompt_text().as_deref(), Some("hello"));
    }

    #[test]
    fn test_blank_text_has_no_prompt() {
        let msg = InboundMessage::text("wamid.1", "601", "   ", 10);
        assert!(msg.prompt_text().is_none());
    }

    #[test]
    fn test_media_prompt_with_file_and_caption() {
        let media = MediaAttachment::new(MediaType::Image, "m1", "image/jpeg")
            .with_file("/tmp/media/m1.jpg")
            .with_caption("is this in stock?");
        let msg = InboundMessage::media("wamid.2", "601", media, 10);
        assert_eq!(
            msg.prompt_text().as_deref(),
            Some("[image attachment saved at /tmp/media/m1.jpg]\nis this in stock?")
        );
    }

    #[test]
    fn test_media_prompt_failed_download() {
        let media = MediaAttachment::new(MediaType::Audio, "m2", "audio/ogg");
        let msg = InboundMessage::media("wamid.3", "601", media, 10);
        assert_eq!(
            msg.prompt_text().as_deref(),
            Some("[audio attachment could not be downloaded]")
        );
    }

    #[test]
    fn test_contact_and_metadata_builders() {
        let msg = InboundMessage::text("wamid.1", "601", "hi", 0)
            .with_contact(ContactProfile {
                wa_id: "601".into(),
                name: "Ana".into(),
            })
            .with_metadata("k", "v");
        assert_eq!(msg.contact.unwrap().name, "Ana");
        assert_eq!(msg.metadata.get("k").map(String::as_str), Some("v"));
    }

    #[test]
    fn test_media_type_display() {
        assert_eq!(MediaType::Document.to_string(), "document");
        assert_eq!(
            serde_json::to_string(&MediaType::Video).unwrap(),
            "\"video\""
        );
    }
}
