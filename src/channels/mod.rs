//! Channels module - the messaging platform side of wagate
//!
//! Replies leave the gateway through a [`Transport`]; inbound attachments are
//! pulled to local storage through a [`MediaSource`]. The WhatsApp Cloud API
//! client implements both.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐   send    ┌──────────────────────┐   HTTPS   ┌───────────┐
//! │  OutboundSender  │──────────>│ WhatsAppCloudClient  │──────────>│ Graph API │
//! │ (records turns)  │           │ (Transport +         │           │           │
//! └──────────────────┘           │  MediaSource)        │<──────────│           │
//!                                └──────────────────────┘   media   └───────────┘
//!                                          ▲
//!                                          │ fetch_media
//!                                  ┌───────┴────────┐
//!                                  │ IngestPipeline │
//!                                  └────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use wagate::channels::{OutboundSender, WhatsAppCloudClient};
//! use wagate::events::ReplyMessage;
//! use wagate::store::ConversationStore;
//!
//! async fn reply(store: ConversationStore, conversation_id: i64) -> wagate::error::Result<()> {
//!     let client = WhatsAppCloudClient::new(
//!         "access-token",
//!         "106540352242922",
//!         "https://graph.facebook.com/v20.0",
//!         "/var/lib/wagate/media",
//!         Duration::from_secs(30),
//!     )?;
//!     let sender = OutboundSender::new(Arc::new(client), store);
//!     sender
//!         .send(conversation_id, ReplyMessage::text("15550001111", "Hello!"))
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod media;
mod sender;
mod types;
pub mod whatsapp_cloud;

pub use sender::OutboundSender;
pub use types::{MediaSource, SendReceipt, Transport};
pub use whatsapp_cloud::WhatsAppCloudClient;

#[cfg(test)]
pub use types::{MockMediaSource, MockTransport};
