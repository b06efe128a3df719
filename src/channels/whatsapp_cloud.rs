//! WhatsApp Cloud API client.
//!
//! Sends replies via `{api_base}/{phone_number_id}/messages`, uploads outbound
//! media to `{api_base}/{phone_number_id}/media` and downloads inbound media
//! in two steps: `GET {api_base}/{media_id}` for a short-lived URL, then
//! `GET url` for the bytes. Every call carries the bearer token.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::bus::MediaAttachment;
use crate::config::Config;
use crate::error::{GatewayError, Result};
use crate::events::{MediaRef, ReplyMessage};

use super::media::{digest_matches, media_path};
use super::{MediaSource, SendReceipt, Transport};

// --- Cloud API response types ---

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MediaUrlResponse {
    url: String,
    #[serde(default)]
    sha256: Option<String>,
}

/// Pull `error.message` out of a Graph API error body.
fn api_error(status: StatusCode, body: &str) -> GatewayError {
    let detail = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                "Unknown API error".to_string()
            } else {
                body.trim().to_string()
            }
        });
    warn!(status = status.as_u16(), error = %detail, "WhatsApp Cloud API error");
    GatewayError::Transport(format!("WhatsApp Cloud API error {}: {}", status, detail))
}

fn network_error(what: &str, err: reqwest::Error) -> GatewayError {
    GatewayError::Transport(format!("WhatsApp Cloud {} failed: {}", what, err))
}

/// HTTP client for the WhatsApp Cloud API.
pub struct WhatsAppCloudClient {
    access_token: String,
    phone_number_id: String,
    api_base: String,
    media_root: PathBuf,
    client: Client,
}

impl WhatsAppCloudClient {
    pub fn new(
        access_token: &str,
        phone_number_id: &str,
        api_base: &str,
        media_root: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            access_token: access_token.to_string(),
            phone_number_id: phone_number_id.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            media_root: media_root.into(),
            client,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            &config.whatsapp.access_token,
            &config.whatsapp.phone_number_id,
            &config.whatsapp.api_base,
            config.media_root(),
            Duration::from_secs(config.whatsapp.timeout_secs),
        )
    }

    pub fn media_root(&self) -> &Path {
        &self.media_root
    }

    fn endpoint(&self, leaf: &str) -> String {
        format!("{}/{}/{}", self.api_base, self.phone_number_id, leaf)
    }

    /// Upload a local file and return the platform media id.
    pub async fn upload_media(&self, path: &Path, mime_type: &str) -> Result<String> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let size = bytes.len();
        let file = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime_type)
            .map_err(|e| GatewayError::Transport(format!("invalid MIME type {}: {}", mime_type, e)))?;
        let form = Form::new()
            .text("messaging_product", "whatsapp")
            .text("type", mime_type.to_string())
            .part("file", file);

        let response = self
            .client
            .post(self.endpoint("media"))
            .bearer_auth(&self.access_token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| network_error("media upload", e))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(api_error(status, &body));
        }
        let uploaded: UploadResponse = serde_json::from_str(&body).map_err(|e| {
            GatewayError::Transport(format!("unexpected media upload response: {}", e))
        })?;
        info!(media_id = %uploaded.id, bytes = size, path = %path.display(), "Uploaded media");
        Ok(uploaded.id)
    }

    async fn post_message(&self, payload: &Value) -> Result<SendReceipt> {
        let response = self
            .client
            .post(self.endpoint("messages"))
            .bearer_auth(&self.access_token)
            .json(payload)
            .send()
            .await
            .map_err(|e| network_error("send", e))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(api_error(status, &body));
        }
        let message_id = serde_json::from_str::<SendResponse>(&body)
            .ok()
            .and_then(|r| r.messages.into_iter().next())
            .map(|m| m.id);
        Ok(SendReceipt { message_id })
    }

    async fn download(&self, media_id: &str) -> Result<(Vec<u8>, Option<String>)> {
        let meta = self
            .client
            .get(format!("{}/{}", self.api_base, media_id))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| network_error("media lookup", e))?;
        let status = meta.status();
        let body = meta.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(api_error(status, &body));
        }
        let meta: MediaUrlResponse = serde_json::from_str(&body).map_err(|e| {
            GatewayError::Transport(format!("unexpected media lookup response: {}", e))
        })?;

        let response = self
            .client
            .get(&meta.url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| network_error("media download", e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(api_error(status, &body));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| network_error("media download", e))?;
        Ok((bytes.to_vec(), meta.sha256))
    }
}

#[async_trait]
impl Transport for WhatsAppCloudClient {
    async fn send(&self, mut reply: ReplyMessage) -> Result<SendReceipt> {
        if let Some((path, mime_type)) = reply.pending_upload() {
            let (path, mime_type) = (path.clone(), mime_type.to_string());
            let media_id = self.upload_media(&path, &mime_type).await?;
            if let Some(content) = reply.media_mut() {
                content.source = MediaRef::Id(media_id);
            }
        }

        let payload = reply.to_wire()?;
        let receipt = self.post_message(&payload).await?;
        info!(
            to = %reply.to,
            kind = reply.kind_str(),
            message_id = receipt.message_id.as_deref().unwrap_or(""),
            "WhatsApp Cloud: message sent"
        );
        Ok(receipt)
    }
}

#[async_trait]
impl MediaSource for WhatsAppCloudClient {
    async fn fetch_media(&self, attachment: &MediaAttachment) -> Result<PathBuf> {
        let (bytes, announced) = self.download(&attachment.media_id).await?;

        if let Some(expected) = attachment.sha256.as_deref().or(announced.as_deref()) {
            if !digest_matches(&bytes, expected) {
                return Err(GatewayError::Transport(format!(
                    "media {} failed sha256 verification",
                    attachment.media_id
                )));
            }
        }

        tokio::fs::create_dir_all(&self.media_root).await?;
        let path = media_path(&self.media_root, &attachment.media_id, &attachment.mime_type);
        tokio::fs::write(&path, &bytes).await?;
        debug!(
            media_id = %attachment.media_id,
            bytes = bytes.len(),
            path = %path.display(),
            "Media saved"
        );
        Ok(path)
    }
}
