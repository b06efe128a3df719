//! Agent module - the conversation engine
//!
//! This module owns the conversation state machine (`NONE → OPEN → CLOSED`)
//! and the tool-calling loop:
//!
//! - Resolving or creating the customer's open conversation
//! - Serializing work per conversation through session handles
//! - Replaying persisted agent turns into model context
//! - Calling the model, executing requested tools and persisting every turn
//! - Detecting the end marker that closes a conversation
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────────────┐     ┌─────────────┐
//! │ Conversation │────>│ ConversationEngine │────>│ ModelDriver │
//! │   Service    │     │                    │     │  (Gemini)   │
//! └──────────────┘     └────────────────────┘     └─────────────┘
//!                         │              │
//!                         ▼              ▼
//!                  ┌─────────────┐ ┌─────────────┐
//!                  │Conversation │ │    Tool     │
//!                  │   Store     │ │  Registry   │
//!                  └─────────────┘ └─────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use wagate::agent::{ConversationEngine, EngineConfig};
//! use wagate::providers::GeminiDriver;
//! use wagate::store::ConversationStore;
//! use wagate::tools::ToolRegistry;
//!
//! async fn run() -> wagate::error::Result<()> {
//!     let engine = ConversationEngine::new(
//!         ConversationStore::open("wagate.db")?,
//!         Arc::new(GeminiDriver::new("your-api-key", "gemini-1.5-flash")),
//!         Arc::new(ToolRegistry::new()),
//!         EngineConfig::default(),
//!     );
//!
//!     let conversation = engine.resolve_conversation("15550001111", 1_700_000_000)?;
//!     let handle = engine.open_session(conversation).await?;
//!     let reply = engine.respond(&handle, "hello").await?;
//!     println!("{}", reply.text);
//!     Ok(())
//! }
//! ```

mod context;
mod engine;
mod session;

pub use context::{encode_function_call, encode_function_responses, push_parts, replay};
pub use engine::{ConversationEngine, EndMarker, EngineConfig, EngineReply};
pub use session::{SessionHandle, SessionLocks};
