//! Transport traits for wagate
//!
//! `Transport` delivers replies to the messaging platform and `MediaSource`
//! downloads inbound attachments. Both are implemented by
//! [`WhatsAppCloudClient`](super::WhatsAppCloudClient); tests substitute
//! mocks.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::bus::MediaAttachment;
use crate::error::Result;
use crate::events::ReplyMessage;

/// Platform acknowledgement of an outbound message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendReceipt {
    /// Platform message id (`wamid...`), when the API returned one
    pub message_id: Option<String>,
}

impl SendReceipt {
    pub fn new(message_id: impl Into<String>) -> Self {
        Self {
            message_id: Some(message_id.into()),
        }
    }
}

/// Delivers replies to the messaging platform.
///
/// Implementations upload pending local media before sending and report any
/// non-2xx answer or network error as [`GatewayError::Transport`]. They do
/// not retry.
///
/// [`GatewayError::Transport`]: crate::error::GatewayError::Transport
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, reply: ReplyMessage) -> Result<SendReceipt>;
}

/// Fetches inbound media to local storage.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Download an attachment and return where it was written.
    async fn fetch_media(&self, attachment: &MediaAttachment) -> Result<PathBuf>;
}
