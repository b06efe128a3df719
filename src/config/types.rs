//! Configuration type definitions for wagate
//!
//! All sections implement serde traits for JSON serialization and have
//! defaults, so a partial config file only needs to name what it changes.

use serde::{Deserialize, Serialize};

/// Main configuration struct for wagate
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Messaging platform credentials and API endpoint
    pub whatsapp: WhatsAppConfig,
    /// Language-model backend
    pub model: ModelConfig,
    /// Webhook server and dispatcher
    pub gateway: GatewayConfig,
    /// Database and downloaded media locations
    pub storage: StorageConfig,
    /// Conversation engine behaviour
    pub agent: AgentConfig,
    /// Built-in tool configuration
    pub tools: ToolsConfig,
    /// Logging output
    pub logging: LoggingConfig,
}

// ============================================================================
// WhatsApp Configuration
// ============================================================================

pub const DEFAULT_WHATSAPP_API_BASE: &str = "https://graph.facebook.com/v20.0";

/// WhatsApp Cloud API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WhatsAppConfig {
    /// Bearer token for the Graph API
    pub access_token: String,
    /// Business phone number ID used in message and media URLs
    pub phone_number_id: String,
    /// Shared secret for the webhook verification handshake
    pub verify_token: String,
    pub api_base: String,
    /// HTTP client timeout for messaging and media calls
    pub timeout_secs: u64,
}

impl Default for WhatsAppConfig {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            phone_number_id: String::new(),
            verify_token: "token".to_string(),
            api_base: DEFAULT_WHATSAPP_API_BASE.to_string(),
            timeout_secs: 30,
        }
    }
}

// ============================================================================
// Model Configuration
// ============================================================================

pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Language-model backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Per-call timeout for `generateContent`
    pub timeout_secs: u64,
    /// Retries on rate limits, 5xx and timeouts
    pub max_retries: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            temperature: 0.7,
            max_tokens: 1024,
            timeout_secs: 60,
            max_retries: 2,
        }
    }
}

// ============================================================================
// Gateway Configuration
// ============================================================================

/// Webhook server and dispatcher configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Route serving both the verification GET and the notification POST
    pub path: String,
    /// Dispatcher workers; messages are sharded by customer when > 1
    pub workers: usize,
    /// Drop redeliveries of an already-seen message id
    pub dedup_enabled: bool,
    pub dedup_ttl_secs: u64,
    pub dedup_max_entries: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            path: "/webhook".to_string(),
            workers: 1,
            dedup_enabled: true,
            dedup_ttl_secs: 3600,
            dedup_max_entries: 10_000,
        }
    }
}

// ============================================================================
// Storage Configuration
// ============================================================================

/// Database and media locations. `~` is expanded on use.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
    pub media_root: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: "~/.wagate/wagate.db".to_string(),
            media_root: "~/.wagate/media".to_string(),
        }
    }
}

// ============================================================================
// Agent Configuration
// ============================================================================

pub const DEFAULT_END_MARKER: &str = "<END_CONVERSATION>";

/// Conversation engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// System instruction sent with every model call
    pub system_prompt: String,
    /// Token that closes the conversation; empty disables it
    pub end_marker: String,
    pub max_tool_iterations: u32,
    pub tool_timeout_secs: u64,
    /// Reply persisted and sent when the tool loop runs out of iterations
    pub fallback_reply: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            end_marker: DEFAULT_END_MARKER.to_string(),
            max_tool_iterations: 10,
            tool_timeout_secs: 30,
            fallback_reply: "Sorry, I could not finish that request. Could you rephrase it?"
                .to_string(),
        }
    }
}

fn default_system_prompt() -> String {
    format!(
        "You are a helpful attendant chatting with a customer over WhatsApp. \
         Use the available tools to look up products and stock before answering. \
         Keep replies short. When the customer has nothing else to ask, say goodbye \
         and append {}(<intent>) where <intent> is a short label for what they wanted.",
        DEFAULT_END_MARKER
    )
}

// ============================================================================
// Tools Configuration
// ============================================================================

/// Built-in tool configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// JSON product catalog backing `get_product_info` and `check_inventory`.
    /// When unset the catalog tools are not registered.
    pub catalog_path: Option<String>,
}

// ============================================================================
// Logging Configuration
// ============================================================================

/// Log output format.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable coloured output
    Pretty,
    /// `[timestamp] [LEVEL] target message {fields}`
    #[default]
    Component,
    /// Structured JSON lines
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Filter used when `RUST_LOG` is unset
    pub level: String,
    /// Append log lines to this file instead of stderr
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            level: "info".to_string(),
            file: None,
        }
    }
}
