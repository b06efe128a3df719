//! wagate - WhatsApp conversational-agent gateway
//!
//! Webhook notifications are parsed ([`events`]), normalized onto an
//! in-process queue ([`gateway`], [`bus`]), dispatched per message
//! ([`dispatcher`]) and answered by a tool-calling conversation engine
//! ([`agent`], [`providers`], [`tools`]) whose every turn is persisted
//! ([`store`]) before the reply goes back out ([`channels`]).

pub mod agent;
pub mod bus;
pub mod channels;
pub mod config;
pub mod conversation;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod gateway;
pub mod providers;
pub mod store;
pub mod tools;
pub mod utils;

pub use agent::{ConversationEngine, EngineConfig, EngineReply, SessionHandle};
pub use bus::{InboundMessage, MediaAttachment, MediaType, MessageBus};
pub use channels::{OutboundSender, Transport, WhatsAppCloudClient};
pub use config::Config;
pub use conversation::ConversationService;
pub use dispatcher::{Dispatcher, MessageHandler};
pub use error::{GatewayError, ProviderError, Result};
pub use providers::{GeminiDriver, ModelDriver};
pub use store::ConversationStore;
pub use tools::ToolRegistry;
