//! Providers module - language-model backends
//!
//! This module defines the `ModelDriver` trait and the content types the
//! conversation engine exchanges with it. `GeminiDriver` talks to the
//! `generateContent` endpoint; `RetryDriver` wraps any driver with backoff
//! on transient failures.
//!
//! # Example
//!
//! ```rust,ignore
//! use wagate::providers::{ChatOptions, Content, GeminiDriver, ModelDriver, RetryDriver};
//!
//! async fn example() {
//!     let driver = RetryDriver::new(Box::new(GeminiDriver::new("your-api-key", "gemini-1.5-flash")));
//!     let contents = vec![Content::user_text("Hello!")];
//!     let options = ChatOptions::new().with_max_tokens(1000);
//!
//!     let response = driver.generate(None, &contents, &[], &options).await.unwrap();
//!     println!("Response: {}", response.joined_text());
//! }
//! ```

pub mod gemini;
pub mod retry;
mod types;

use crate::error::ProviderError;

pub use gemini::GeminiDriver;
pub use retry::RetryDriver;
pub use types::{
    ChatOptions, Content, ModelDriver, ModelResponse, Part, Role, ToolDefinition, Usage,
};

/// Parse an HTTP status code and response body into a structured [`ProviderError`].
///
/// This centralizes the mapping from HTTP status codes to error classifications
/// so retry decisions never depend on message text.
pub fn parse_provider_error(status: u16, body: &str) -> ProviderError {
    match status {
        401 | 403 => ProviderError::Auth(body.to_string()),
        402 => ProviderError::Billing(body.to_string()),
        404 => ProviderError::ModelNotFound(body.to_string()),
        429 => ProviderError::RateLimit(body.to_string()),
        400 => ProviderError::InvalidRequest(body.to_string()),
        500..=599 => ProviderError::ServerError(body.to_string()),
        _ => ProviderError::Unknown(format!("HTTP {}: {}", status, body)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider_error_401() {
        let err = parse_provider_error(401, "invalid api key");
        assert!(matches!(err, ProviderError::Auth(_)));
        assert_eq!(err.status_code(), Some(401));
    }

    #[test]
    fn test_parse_provider_error_403() {
        let err = parse_provider_error(403, "API key not valid for this project");
        assert!(matches!(err, ProviderError::Auth(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_parse_provider_error_402() {
        let err = parse_provider_error(402, "payment required");
        assert!(matches!(err, ProviderError::Billing(_)));
        assert_eq!(err.status_code(), Some(402));
    }

    #[test]
    fn test_parse_provider_error_404() {
        let err = parse_provider_error(404, "model not found");
        assert!(matches!(err, ProviderError::ModelNotFound(_)));
        assert_eq!(err.status_code(), Some(404));
    }

    #[test]
    fn test_parse_provider_error_429() {
        let err = parse_provider_error(429, "rate limited");
        assert!(matches!(err, ProviderError::RateLimit(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_parse_provider_error_400() {
        let err = parse_provider_error(400, "bad json");
        assert!(matches!(err, ProviderError::InvalidRequest(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_parse_provider_error_5xx() {
        for status in [500, 502, 503, 504] {
            let err = parse_provider_error(status, "upstream");
            assert!(matches!(err, ProviderError::ServerError(_)));
            assert!(err.is_retryable());
        }
    }

    #[test]
    fn test_parse_provider_error_unknown() {
        let err = parse_provider_error(418, "i'm a teapot");
        assert!(matches!(err, ProviderError::Unknown(_)));
        assert!(err.to_string().contains("HTTP 418"));
    }
}
