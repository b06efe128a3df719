//! Outbound reply payloads.
//!
//! A [`ReplyMessage`] is built by the conversation service and serialized to
//! the Cloud API `messages` body by [`ReplyMessage::to_wire`]. Media bodies
//! may start out pointing at a local file; the transport uploads the file and
//! swaps in the platform id before serializing.

use std::path::PathBuf;

use serde_json::{json, Map, Value};

use crate::error::{GatewayError, Result};
use crate::utils::string::truncate_with_suffix;

/// WhatsApp's per-message text limit, in characters.
pub const MAX_TEXT_LENGTH: usize = 4096;

const TRUNCATION_SUFFIX: &str = "...(truncated)";

/// A message to a single recipient.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplyMessage {
    /// Recipient phone number
    pub to: String,
    /// Inbound message id to quote, if any
    pub context: Option<String>,
    pub body: ReplyBody,
}

/// Closed set of reply bodies.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyBody {
    Text { body: String, preview_url: bool },
    Media { kind: MediaKind, content: MediaContent },
    /// Pre-approved template, required outside the 24h service window
    Template { name: String, language: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
    Image,
    Document,
    Sticker,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
            MediaKind::Image => "image",
            MediaKind::Document => "document",
            MediaKind::Sticker => "sticker",
        }
    }

    /// Audio and stickers reject captions on the wire.
    fn accepts_caption(&self) -> bool {
        matches!(self, MediaKind::Video | MediaKind::Image | MediaKind::Document)
    }
}

/// Media body contents.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaContent {
    pub mime_type: String,
    pub source: MediaRef,
    pub caption: Option<String>,
    /// Documents only
    pub filename: Option<String>,
}

/// Where a media body's bytes live.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaRef {
    /// Not uploaded yet
    Local(PathBuf),
    /// Platform media id returned by the upload endpoint
    Id(String),
}

impl ReplyMessage {
    /// Plain text reply without link previews.
    pub fn text(to: &str, body: &str) -> Self {
        Self {
            to: to.to_string(),
            context: None,
            body: ReplyBody::Text {
                body: body.to_string(),
                preview_url: false,
            },
        }
    }

    /// Media reply backed by a local file.
    pub fn media(to: &str, kind: MediaKind, path: impl Into<PathBuf>, mime_type: &str) -> Self {
        Self {
            to: to.to_string(),
            context: None,
            body: ReplyBody::Media {
                kind,
                content: MediaContent {
                    mime_type: mime_type.to_string(),
                    source: MediaRef::Local(path.into()),
                    caption: None,
                    filename: None,
                },
            },
        }
    }

    pub fn template(to: &str, name: &str, language: &str) -> Self {
        Self {
            to: to.to_string(),
            context: None,
            body: ReplyBody::Template {
                name: name.to_string(),
                language: language.to_string(),
            },
        }
    }

    /// Quote an inbound message (builder pattern).
    pub fn in_reply_to(mut self, message_id: &str) -> Self {
        self.context = Some(message_id.to_string());
        self
    }

    /// Set a caption on a media reply. No-op for other bodies.
    pub fn with_caption(mut self, caption: &str) -> Self {
        if let Some(content) = self.media_mut() {
            content.caption = Some(caption.to_string());
        }
        self
    }

    pub fn kind_str(&self) -> &'static str {
        match &self.body {
            ReplyBody::Text { .. } => "text",
            ReplyBody::Media { kind, .. } => kind.as_str(),
            ReplyBody::Template { .. } => "template",
        }
    }

    pub fn media_mut(&mut self) -> Option<&mut MediaContent> {
        match &mut self.body {
            ReplyBody::Media { content, .. } => Some(content),
            _ => None,
        }
    }

    /// Local file still waiting for upload, if any.
    pub fn pending_upload(&self) -> Option<(&PathBuf, &str)> {
        match &self.body {
            ReplyBody::Media { content, .. } => match &content.source {
                MediaRef::Local(path) => Some((path, content.mime_type.as_str())),
                MediaRef::Id(_) => None,
            },
            _ => None,
        }
    }

    /// What gets written to the chat transcript for this reply.
    pub fn transcript_text(&self) -> String {
        match &self.body {
            ReplyBody::Text { body, .. } => {
                truncate_with_suffix(body, MAX_TEXT_LENGTH, TRUNCATION_SUFFIX)
            }
            ReplyBody::Media { kind, content } => match &content.caption {
                Some(caption) => format!("[{}] {}", kind.as_str(), caption),
                None => format!("[{}]", kind.as_str()),
            },
            ReplyBody::Template { name, .. } => format!("[template:{}]", name),
        }
    }

    /// Serialize to the Cloud API `messages` request body.
    pub fn to_wire(&self) -> Result<Value> {
        let to = self.to.trim();
        if to.is_empty() {
            return Err(GatewayError::MalformedEvent(
                "reply recipient cannot be empty".to_string(),
            ));
        }

        let kind = self.kind_str();
        let inner = match &self.body {
            ReplyBody::Text { body, preview_url } => json!({
                "preview_url": preview_url,
                "body": truncate_with_suffix(body, MAX_TEXT_LENGTH, TRUNCATION_SUFFIX),
            }),
            ReplyBody::Media { kind, content } => {
                let id = match &content.source {
                    MediaRef::Id(id) => id,
                    MediaRef::Local(path) => {
                        return Err(GatewayError::MalformedEvent(format!(
                            "{} reply still references local file {}; upload it first",
                            kind.as_str(),
                            path.display()
                        )))
                    }
                };
                let mut obj = Map::new();
                obj.insert("id".to_string(), json!(id));
                if kind.accepts_caption() {
                    if let Some(caption) = &content.caption {
                        obj.insert("caption".to_string(), json!(caption));
                    }
                }
                if *kind == MediaKind::Document {
                    if let Some(filename) = &content.filename {
                        obj.insert("filename".to_string(), json!(filename));
                    }
                }
                Value::Object(obj)
            }
            ReplyBody::Template { name, language } => json!({
                "name": name,
                "language": { "code": language },
            }),
        };

        let mut payload = json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": to,
            "type": kind,
        });
        payload[kind] = inner;
        if let Some(message_id) = &self.context {
            payload["context"] = json!({ "message_id": message_id });
        }
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_wire_form() {
        let wire = ReplyMessage::text("601", "hello").to_wire().unwrap();
        assert_eq!(
            wire,
            json!({
                "messaging_product": "whatsapp",
                "recipient_type": "individual",
                "to": "601",
                "type": "text",
                "text": {"preview_url": false, "body": "hello"}
            })
        );
    }

    #[test]
    fn test_context_is_serialized() {
        let wire = ReplyMessage::text("601", "hi")
            .in_reply_to("wamid.abc")
            .to_wire()
            .unwrap();
        assert_eq!(wire["context"]["message_id"], "wamid.abc");
    }

    #[test]
    fn test_long_text_is_truncated() {
        let body = "a".repeat(MAX_TEXT_LENGTH + 100);
        let wire = ReplyMessage::text("601", &body).to_wire().unwrap();
        let sent = wire["text"]["body"].as_str().unwrap();
        assert_eq!(sent.chars().count(), MAX_TEXT_LENGTH);
        assert!(sent.ends_with("...(truncated)"));
    }

    #[test]
    fn test_transcript_matches_sent_body() {
        let reply = ReplyMessage::text("601", &"b".repeat(MAX_TEXT_LENGTH * 2));
        let wire = reply.to_wire().unwrap();
        assert_eq!(reply.transcript_text(), wire["text"]["body"].as_str().unwrap());

        let short = ReplyMessage::text("601", "Hi there");
        assert_eq!(short.transcript_text(), "Hi there");
    }

    #[test]
    fn test_local_media_is_rejected() {
        let reply = ReplyMessage::media("601", MediaKind::Image, "/tmp/x.jpg", "image/jpeg");
        assert!(reply.pending_upload().is_some());
        let err = reply.to_wire().unwrap_err();
        assert!(matches!(err, GatewayError::MalformedEvent(_)));
    }

    #[test]
    fn test_uploaded_media_wire_form() {
        let mut reply = ReplyMessage::media("601", MediaKind::Image, "/tmp/x.jpg", "image/jpeg")
            .with_caption("menu");
        reply.media_mut().unwrap().source = MediaRef::Id("media-9".into());
        assert!(reply.pending_upload().is_none());

        let wire = reply.to_wire().unwrap();
        assert_eq!(wire["type"], "image");
        assert_eq!(wire["image"], json!({"id": "media-9", "caption": "menu"}));
    }

    #[test]
    fn test_audio_drops_caption() {
        let mut reply = ReplyMessage::media("601", MediaKind::Audio, "/tmp/a.ogg", "audio/ogg")
            .with_caption("ignored");
        reply.media_mut().unwrap().source = MediaRef::Id("a1".into());
        let wire = reply.to_wire().unwrap();
        assert_eq!(wire["audio"], json!({"id": "a1"}));
    }

    #[test]
    fn test_template_wire_form() {
        let wire = ReplyMessage::template("601", "hello_world", "en_US")
            .to_wire()
            .unwrap();
        assert_eq!(wire["type"], "template");
        assert_eq!(wire["template"]["name"], "hello_world");
        assert_eq!(wire["template"]["language"]["code"], "en_US");
    }

    #[test]
    fn test_empty_recipient_rejected() {
        assert!(ReplyMessage::text("  ", "x").to_wire().is_err());
    }

    #[test]
    fn test_transcript_text() {
        assert_eq!(ReplyMessage::text("1", "hi").transcript_text(), "hi");
        let media = ReplyMessage::media("1", MediaKind::Document, "/f.pdf", "application/pdf")
            .with_caption("invoice");
        assert_eq!(media.transcript_text(), "[document] invoice");
        assert_eq!(
            ReplyMessage::template("1", "promo", "en").transcript_text(),
            "[template:promo]"
        );
    }
}
