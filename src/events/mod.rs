//! Event model
//!
//! Typed inbound webhook notifications ([`webhook`]) and outbound reply
//! payloads ([`reply`]).

pub mod reply;
pub mod webhook;

pub use reply::{MediaContent, MediaKind, MediaRef, ReplyBody, ReplyMessage, MAX_TEXT_LENGTH};
pub use webhook::{
    Change, ChangeValue, Contact, Entry, MediaObject, MessageEvent, MessageType, Metadata,
    Profile, Status, TextBody, WebhookEvent, MESSAGES_FIELD, WHATSAPP_OBJECT,
};
