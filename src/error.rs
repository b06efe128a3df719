//! Error types for wagate
//!
//! This module defines all error types used throughout the gateway.
//! Uses `thiserror` for ergonomic error handling with automatic `Display` and
//! `Error` trait implementations.

use std::fmt;
use thiserror::Error;

// ============================================================================
// Provider Error Classification
// ============================================================================

/// Structured model-backend error classification.
///
/// Lets callers distinguish transient failures (rate limits, timeouts) from
/// permanent ones (bad key, bad request) without string matching.
#[derive(Debug)]
pub enum ProviderError {
    /// 401/403 — Invalid API key or authentication failure
    Auth(String),
    /// 429 — Rate limit or quota exceeded
    RateLimit(String),
    /// 402 — Payment required or billing issue
    Billing(String),
    /// 500/502/503/504 — Server-side errors
    ServerError(String),
    /// 400 — Bad request, invalid JSON, malformed parameters
    InvalidRequest(String),
    /// 404 — Model not found or endpoint not available
    ModelNotFound(String),
    /// Connection or read timeout
    Timeout(String),
    /// Catch-all for unrecognized errors
    Unknown(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Auth(msg) => write!(f, "Authentication error: {}", msg),
            ProviderError::RateLimit(msg) => write!(f, "Rate limit error: {}", msg),
            ProviderError::Billing(msg) => write!(f, "Billing error: {}", msg),
            ProviderError::ServerError(msg) => write!(f, "Server error: {}", msg),
            ProviderError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ProviderError::ModelNotFound(msg) => write!(f, "Model not found: {}", msg),
            ProviderError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            ProviderError::Unknown(msg) => write!(f, "Unknown provider error: {}", msg),
        }
    }
}

impl ProviderError {
    /// Returns `true` if this error is transient and the request could be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimit(_) | ProviderError::ServerError(_) | ProviderError::Timeout(_)
        )
    }

    /// Returns the HTTP status code associated with this error, if applicable.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ProviderError::Auth(_) => Some(401),
            ProviderError::RateLimit(_) => Some(429),
            ProviderError::Billing(_) => Some(402),
            ProviderError::ServerError(_) => Some(500),
            ProviderError::InvalidRequest(_) => Some(400),
            ProviderError::ModelNotFound(_) => Some(404),
            ProviderError::Timeout(_) => None,
            ProviderError::Unknown(_) => None,
        }
    }
}

impl From<ProviderError> for GatewayError {
    fn from(err: ProviderError) -> Self {
        GatewayError::Provider(err)
    }
}

// ============================================================================
// Primary Error Type
// ============================================================================

/// The primary error type for gateway operations.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// Configuration-related errors (missing credentials, invalid values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Inbound webhook body or outbound reply does not match the wire schema
    #[error("Malformed event: {0}")]
    MalformedEvent(String),

    /// Tool name dispatch miss
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// A registered tool returned an error or timed out
    #[error("Tool error: {0}")]
    ToolExecution(String),

    /// A persistence call failed
    #[error("Store write failure: {0}")]
    StoreWriteFailure(String),

    /// A persistence call violated a uniqueness or foreign-key constraint
    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    /// Outbound call to the messaging or media API failed
    #[error("Transport failure: {0}")]
    Transport(String),

    /// Model backend failure
    #[error("Provider error: {0}")]
    Provider(ProviderError),

    /// Conversation session misuse (closed conversation, etc.)
    #[error("Session error: {0}")]
    Session(String),

    /// Resource not found (conversations, media, etc.)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Message queue closed unexpectedly
    #[error("Bus error: channel closed")]
    BusClosed,

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl From<rusqlite::Error> for GatewayError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _)
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                GatewayError::ConstraintViolation(err.to_string())
            }
            _ => GatewayError::StoreWriteFailure(err.to_string()),
        }
    }
}

impl From<r2d2::Error> for GatewayError {
    fn from(err: r2d2::Error) -> Self {
        GatewayError::StoreWriteFailure(format!("connection pool: {}", err))
    }
}

/// A specialized `Result` type for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;
