//! Gemini Driver Implementation
//!
//! Implements [`ModelDriver`] for the Gemini `generateContent` endpoint,
//! handling tool declarations, function-call parts and error classification.
//!
//! # Example
//!
//! ```rust,ignore
//! use wagate::providers::{gemini::GeminiDriver, ChatOptions, Content, ModelDriver};
//!
//! async fn example() {
//!     let driver = GeminiDriver::new("your-api-key", "gemini-1.5-flash");
//!     let contents = vec![Content::user_text("Hello!")];
//!
//!     let response = driver
//!         .generate(Some("Be brief."), &contents, &[], &ChatOptions::new())
//!         .await
//!         .unwrap();
//!
//!     println!("Gemini: {}", response.joined_text());
//! }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::{DEFAULT_GEMINI_API_BASE, DEFAULT_MODEL};
use crate::error::{ProviderError, Result};

use super::{
    parse_provider_error, ChatOptions, Content, ModelDriver, ModelResponse, Part, ToolDefinition,
    Usage,
};
use super::types::{call_args, empty_args};

/// Schema keywords the function-declaration schema subset does not accept.
const UNSUPPORTED_SCHEMA_KEYS: &[&str] = &["$schema", "additionalProperties", "default"];

// ============================================================================
// Gemini API Request Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: &'a [Content],
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<GeminiTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

// ============================================================================
// Gemini API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

/// Lenient part: anything other than text or a function call is skipped.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    function_call: Option<ResponseFunctionCall>,
}

#[derive(Debug, Deserialize)]
struct ResponseFunctionCall {
    name: String,
    #[serde(default = "empty_args", deserialize_with = "call_args")]
    args: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

// ============================================================================
// Gemini Driver
// ============================================================================

/// Gemini `generateContent` driver.
pub struct GeminiDriver {
    api_key: String,
    api_base: String,
    model: String,
    client: Client,
}

impl GeminiDriver {
    /// Create a driver against the public endpoint.
    ///
    /// # Example
    /// ```
    /// use wagate::providers::gemini::GeminiDriver;
    /// use wagate::providers::ModelDriver;
    ///
    /// let driver = GeminiDriver::new("key", "models/gemini-1.5-pro");
    /// assert_eq!(driver.name(), "gemini");
    /// assert_eq!(driver.default_model(), "gemini-1.5-pro");
    /// ```
    pub fn new(api_key: &str, model: &str) -> Self {
        Self::with_client(api_key, DEFAULT_GEMINI_API_BASE, model, Client::new())
    }

    /// Create a driver with a custom base URL and request timeout.
    pub fn with_base_url(
        api_key: &str,
        api_base: &str,
        model: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(api_key, api_base, model, client))
    }

    /// Create a driver with a custom HTTP client.
    pub fn with_client(api_key: &str, api_base: &str, model: &str, client: Client) -> Self {
        let model = model.trim().trim_start_matches("models/");
        Self {
            api_key: api_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            model: if model.is_empty() {
                DEFAULT_MODEL.to_string()
            } else {
                model.to_string()
            },
            client,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base, self.model)
    }
}

// ============================================================================
// Conversion Functions
// ============================================================================

/// Drop schema keywords the function-declaration subset rejects.
fn sanitize_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(k, _)| !UNSUPPORTED_SCHEMA_KEYS.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), sanitize_schema(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(sanitize_schema).collect()),
        other => other.clone(),
    }
}

/// Object schemas without properties are sent without `parameters` at all.
fn declaration_parameters(schema: &Value) -> Option<Value> {
    let empty_object = schema
        .get("properties")
        .and_then(Value::as_object)
        .map(|p| p.is_empty())
        .unwrap_or(true);
    if schema.is_null() || empty_object {
        None
    } else {
        Some(sanitize_schema(schema))
    }
}

fn convert_tools(tools: &[ToolDefinition]) -> Vec<GeminiTool> {
    if tools.is_empty() {
        return Vec::new();
    }
    vec![GeminiTool {
        function_declarations: tools
            .iter()
            .map(|t| FunctionDeclaration {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: declaration_parameters(&t.parameters),
            })
            .collect(),
    }]
}

fn convert_response(response: GenerateResponse) -> Result<ModelResponse> {
    let usage = response.usage_metadata.map(|u| {
        Usage::new(u.prompt_token_count, u.candidates_token_count)
    });

    let candidate = match response.candidates.into_iter().next() {
        Some(c) => c,
        None => {
            let reason = response
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates returned".to_string());
            return Err(ProviderError::InvalidRequest(format!("prompt rejected: {}", reason)).into());
        }
    };

    let parts: Vec<Part> = candidate
        .content
        .map(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|p| match (p.function_call, p.text) {
            (Some(call), _) => Some(Part::FunctionCall {
                name: call.name,
                args: call.args,
            }),
            (None, Some(text)) => Some(Part::Text(text)),
            (None, None) => None,
        })
        .collect();

    if parts.is_empty() {
        let reason = candidate
            .finish_reason
            .unwrap_or_else(|| "UNKNOWN".to_string());
        return Err(ProviderError::Unknown(format!(
            "empty candidate (finishReason {})",
            reason
        ))
        .into());
    }

    Ok(ModelResponse { parts, usage })
}

fn error_detail(body: &str) -> String {
    serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.to_string())
}

// ============================================================================
// ModelDriver Implementation
// ============================================================================

#[async_trait]
impl ModelDriver for GeminiDriver {
    async fn generate(
        &self,
        system: Option<&str>,
        contents: &[Content],
        tools: &[ToolDefinition],
        options: &ChatOptions,
    ) -> Result<ModelResponse> {
        let generation_config = if options.temperature.is_some() || options.max_tokens.is_some() {
            Some(GenerationConfig {
                temperature: options.temperature,
                max_output_tokens: options.max_tokens,
            })
        } else {
            None
        };

        let request = GenerateRequest {
            contents,
            system_instruction: system
                .filter(|s| !s.trim().is_empty())
                .map(|s| SystemInstruction {
                    parts: vec![Part::text(s)],
                }),
            tools: convert_tools(tools),
            generation_config,
        };

        debug!(
            model = %self.model,
            contents = contents.len(),
            tools = tools.len(),
            "Gemini request"
        );

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Unknown(format!("Gemini request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(parse_provider_error(status.as_u16(), &error_detail(&body)).into());
        }

        let parsed: GenerateResponse = response.json().await.map_err(|e| {
            ProviderError::Unknown(format!("failed to parse Gemini response: {}", e))
        })?;
        let result = convert_response(parsed)?;

        if let Some(usage) = result.usage {
            debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "Gemini usage"
            );
        }
        Ok(result)
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    fn name(&self) -> &str {
        "gemini"
    }
}
