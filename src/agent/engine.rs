//! Conversation engine
//!
//! Resolves the open conversation for a customer, replays its agent turns
//! into model context and runs the tool-calling loop, persisting every turn
//! as it goes. The engine never sends anything; it returns the visible reply
//! and whether the conversation should close.

use std::sync::Arc;
use std::time::{Duration, Instant};

use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{GatewayError, ProviderError, Result};
use crate::providers::{ChatOptions, Content, ModelDriver, ModelResponse, Part, Role};
use crate::store::{Conversation, ConversationStore, Sender, TurnType};
use crate::tools::{ToolContext, ToolRegistry};

use super::context::{encode_function_call, encode_function_responses, push_parts, replay};
use super::session::{SessionHandle, SessionLocks};

/// Engine settings, usually taken from [`Config`].
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub system_prompt: String,
    /// Empty disables termination by marker
    pub end_marker: String,
    pub max_tool_iterations: u32,
    pub model_timeout: Duration,
    pub tool_timeout: Duration,
    pub fallback_reply: String,
    pub options: ChatOptions,
}

impl EngineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            system_prompt: config.agent.system_prompt.clone(),
            end_marker: config.agent.end_marker.clone(),
            max_tool_iterations: config.agent.max_tool_iterations.max(1),
            model_timeout: Duration::from_secs(config.model.timeout_secs),
            tool_timeout: Duration::from_secs(config.agent.tool_timeout_secs),
            fallback_reply: config.agent.fallback_reply.clone(),
            options: ChatOptions::new()
                .with_max_tokens(config.model.max_tokens)
                .with_temperature(config.model.temperature),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Finds the end marker and an optional `(intent)` right after it.
#[derive(Debug, Clone)]
pub struct EndMarker {
    pattern: Regex,
}

impl EndMarker {
    /// `None` for an empty marker.
    pub fn new(marker: &str) -> Option<Self> {
        if marker.is_empty() {
            return None;
        }
        let pattern = format!(r"{}(?:\(([^)]*)\))?", regex::escape(marker));
        Regex::new(&pattern).ok().map(|pattern| Self { pattern })
    }

    /// Strip every occurrence of the marker.
    ///
    /// Returns the visible text, whether the marker was present and the
    /// first non-empty intent label.
    ///
    /// # Example
    /// ```
    /// use wagate::agent::EndMarker;
    ///
    /// let marker = EndMarker::new("<END_CONVERSATION>").unwrap();
    /// let (text, found, intent) = marker.strip("Bye! <END_CONVERSATION>(order_food)");
    /// assert_eq!(text, "Bye!");
    /// assert!(found);
    /// assert_eq!(intent.as_deref(), Some("order_food"));
    /// ```
    pub fn strip(&self, text: &str) -> (String, bool, Option<String>) {
        let mut found = false;
        let mut intent = None;
        for caps in self.pattern.captures_iter(text) {
            found = true;
            if intent.is_none() {
                intent = caps
                    .get(1)
                    .map(|m| m.as_str().trim())
                    .filter(|s| !s.is_empty())
                    .map(str::to_string);
            }
        }
        if !found {
            return (text.trim().to_string(), false, None);
        }
        let visible = self.pattern.replace_all(text, "");
        (visible.trim().to_string(), true, intent)
    }
}

/// Outcome of one `respond` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineReply {
    /// Text to show the customer, end marker removed
    pub text: String,
    /// The model asked to close the conversation
    pub closed: bool,
    pub intent: Option<String>,
    /// Model calls made
    pub iterations: u32,
    pub tool_calls: usize,
}

/// Drives conversations against a model backend.
pub struct ConversationEngine {
    store: ConversationStore,
    driver: Arc<dyn ModelDriver>,
    tools: Arc<ToolRegistry>,
    config: EngineConfig,
    end_marker: Option<EndMarker>,
    locks: Arc<SessionLocks>,
}

impl ConversationEngine {
    pub fn new(
        store: ConversationStore,
        driver: Arc<dyn ModelDriver>,
        tools: Arc<ToolRegistry>,
        config: EngineConfig,
    ) -> Self {
        let end_marker = EndMarker::new(&config.end_marker);
        Self {
            store,
            driver,
            tools,
            config,
            end_marker,
            locks: Arc::new(SessionLocks::new()),
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The customer's open conversation, created if there is none.
    pub fn resolve_conversation(&self, customer_id: &str, now: i64) -> Result<Conversation> {
        let (conversation, created) = self.store.get_or_create_conversation(customer_id, now)?;
        if created {
            info!(
                conversation_id = conversation.id,
                customer_id, "Opened conversation"
            );
        }
        Ok(conversation)
    }

    /// Take exclusive access to an open conversation.
    ///
    /// # Errors
    ///
    /// `Session` if the conversation is closed, including when it was closed
    /// while this call waited for the lock.
    pub async fn open_session(&self, conversation: Conversation) -> Result<SessionHandle> {
        if !conversation.is_open() {
            return Err(GatewayError::Session(format!(
                "conversation {} is closed",
                conversation.id
            )));
        }
        let id = conversation.id;
        let handle = self.locks.acquire(conversation).await;
        match self.store.get_conversation(id)? {
            Some(current) if current.is_open() => Ok(handle),
            Some(_) => Err(GatewayError::Session(format!(
                "conversation {} closed while waiting",
                id
            ))),
            None => Err(GatewayError::NotFound(format!("conversation {}", id))),
        }
    }

    /// Release a session explicitly.
    pub fn close_session(&self, handle: SessionHandle) {
        drop(handle);
    }

    /// Close the conversation behind a session.
    pub fn end_conversation(&self, handle: &mut SessionHandle, intent: Option<&str>) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        self.store
            .end_conversation(handle.conversation_id(), now, intent)?;
        handle.mark_closed(now, intent);
        info!(
            conversation_id = handle.conversation_id(),
            customer_id = handle.customer_id(),
            intent = intent.unwrap_or(""),
            "Closed conversation"
        );
        Ok(())
    }

    fn persist(
        &self,
        handle: &SessionHandle,
        sender: Sender,
        turn_type: TurnType,
        data: &str,
    ) -> Result<()> {
        self.store
            .append_agent_turn(handle.conversation_id(), sender, turn_type, data)?;
        Ok(())
    }

    async fn generate(&self, contents: &[Content]) -> Result<ModelResponse> {
        let system = Some(self.config.system_prompt.as_str()).filter(|s| !s.is_empty());
        let definitions = self.tools.definitions();
        match tokio::time::timeout(
            self.config.model_timeout,
            self.driver
                .generate(system, contents, &definitions, &self.config.options),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout(format!(
                "no model response within {:?}",
                self.config.model_timeout
            ))
            .into()),
        }
    }

    /// Run one customer message through the tool-calling loop.
    ///
    /// Every model and tool turn is persisted before the next step, so a
    /// failure leaves a transcript that replays cleanly.
    pub async fn respond(&self, handle: &SessionHandle, text: &str) -> Result<EngineReply> {
        if !handle.is_open() {
            return Err(GatewayError::Session(format!(
                "conversation {} is closed",
                handle.conversation_id()
            )));
        }
        let conversation_id = handle.conversation_id();
        let started = Instant::now();

        let history = self.store.list_agent_turns(conversation_id)?;
        let mut contents = replay(&history)?;
        debug!(conversation_id, turns = history.len(), "Replayed history");

        self.persist(handle, Sender::Customer, TurnType::Text, text)?;
        push_parts(&mut contents, Role::User, vec![Part::text(text)]);

        let ctx = ToolContext::new().with_conversation(handle.customer_id(), conversation_id);
        let mut tool_calls = 0usize;

        for iteration in 1..=self.config.max_tool_iterations {
            let response = self.generate(&contents).await?;

            let calls: Vec<(String, Value)> = response
                .parts
                .iter()
                .filter_map(|p| match p {
                    Part::FunctionCall { name, args } => Some((name.clone(), args.clone())),
                    _ => None,
                })
                .collect();

            if calls.is_empty() {
                let raw = response.joined_text();
                self.persist(handle, Sender::Bot, TurnType::Text, &raw)?;

                let (visible, closed, intent) = match &self.end_marker {
                    Some(marker) => marker.strip(&raw),
                    None => (raw.trim().to_string(), false, None),
                };
                info!(
                    conversation_id,
                    iterations = iteration,
                    tool_calls,
                    closed,
                    duration_ms = started.elapsed().as_millis() as u64,
                    "Model replied"
                );
                return Ok(EngineReply {
                    text: visible,
                    closed,
                    intent,
                    iterations: iteration,
                    tool_calls,
                });
            }

            let interim = response.joined_text();
            if !interim.trim().is_empty() {
                self.persist(handle, Sender::Bot, TurnType::Text, &interim)?;
            }
            push_parts(&mut contents, Role::Model, response.parts);

            let mut results = Vec::with_capacity(calls.len());
            for (name, args) in calls {
                self.persist(
                    handle,
                    Sender::Bot,
                    TurnType::FunctionCall,
                    &encode_function_call(&name, &args)?,
                )?;
                debug!(conversation_id, tool = %name, "Invoking tool");
                let result = self
                    .tools
                    .invoke(&name, args, &ctx, self.config.tool_timeout)
                    .await;
                results.push(Part::function_response(&name, result));
                tool_calls += 1;
            }
            self.persist(
                handle,
                Sender::Customer,
                TurnType::FunctionResponse,
                &encode_function_responses(&results)?,
            )?;
            push_parts(&mut contents, Role::User, results);
        }

        warn!(
            conversation_id,
            max_iterations = self.config.max_tool_iterations,
            tool_calls,
            "Tool loop hit the iteration limit"
        );
        self.persist(
            handle,
            Sender::Bot,
            TurnType::Text,
            &self.config.fallback_reply,
        )?;
        Ok(EngineReply {
            text: self.config.fallback_reply.clone(),
            closed: false,
            intent: None,
            iterations: self.config.max_tool_iterations,
            tool_calls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ToolDefinition;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned responses and records what it was sent.
    struct ScriptedDriver {
        responses: Mutex<VecDeque<ModelResponse>>,
        seen: Mutex<Vec<Vec<Content>>>,
    }

    impl ScriptedDriver {
        fn new(responses: Vec<ModelResponse>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ModelDriver for ScriptedDriver {
        async fn generate(
            &self,
            _system: Option<&str>,
            contents: &[Content],
            _tools: &[ToolDefinition],
            _options: &ChatOptions,
        ) -> Result<ModelResponse> {
            self.seen.lock().unwrap().push(contents.to_vec());
            Ok(self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| ModelResponse::text("(script exhausted)")))
        }
        fn default_model(&self) -> &str {
            "scripted"
        }
        fn name(&self) -> &str {
            "scripted"
        }
    }

    struct SlowDriver;

    #[async_trait]
    impl ModelDriver for SlowDriver {
        async fn generate(
            &self,
            _system: Option<&str>,
            _contents: &[Content],
            _tools: &[ToolDefinition],
            _options: &ChatOptions,
        ) -> Result<ModelResponse> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(ModelResponse::text("late"))
        }
        fn default_model(&self) -> &str {
            "slow"
        }
        fn name(&self) -> &str {
            "slow"
        }
    }

    fn engine_with(driver: Arc<dyn ModelDriver>, config: EngineConfig) -> ConversationEngine {
        let mut tools = ToolRegistry::new();
        tools.register_fn::<Value, _, _>("lookup", "test lookup", json!({}), |args| async move {
            Ok(json!({"echo": args}))
        });
        ConversationEngine::new(
            ConversationStore::in_memory().unwrap(),
            driver,
            Arc::new(tools),
            config,
        )
    }

    #[test]
    fn test_end_marker_variants() {
        let marker = EndMarker::new("<END>").unwrap();
        assert_eq!(marker.strip("hi"), ("hi".to_string(), false, None));
        assert_eq!(marker.strip("bye <END>"), ("bye".to_string(), true, None));
        assert_eq!(
            marker.strip("bye <END>( refund )"),
            ("bye".to_string(), true, Some("refund".to_string()))
        );
        assert_eq!(marker.strip("<END>()"), (String::new(), true, None));
        assert!(EndMarker::new("").is_none());
    }

    #[test]
    fn test_end_marker_escapes_regex() {
        let marker = EndMarker::new("[done]").unwrap();
        assert!(!marker.strip("d").1);
        assert!(marker.strip("ok [done]").1);
    }

    #[tokio::test]
    async fn test_resolve_reuses_open_conversation() {
        let engine = engine_with(ScriptedDriver::new(vec![]), EngineConfig::default());
        let a = engine.resolve_conversation("c1", 10).unwrap();
        let b = engine.resolve_conversation("c1", 20).unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(b.start_time, 10);
    }

    #[tokio::test]
    async fn test_respond_with_tool_round() {
        let driver = ScriptedDriver::new(vec![
            ModelResponse::with_parts(vec![
                Part::text("One sec."),
                Part::function_call("lookup", json!({"q": 1})),
            ]),
            ModelResponse::text("Found it."),
        ]);
        let engine = engine_with(driver.clone(), EngineConfig::default());
        let conversation = engine.resolve_conversation("c1", 0).unwrap();
        let handle = engine.open_session(conversation).await.unwrap();

        let reply = engine.respond(&handle, "find 1").await.unwrap();
        assert_eq!(reply.text, "Found it.");
        assert_eq!(reply.iterations, 2);
        assert_eq!(reply.tool_calls, 1);
        assert!(!reply.closed);

        let turns = engine.store().list_agent_turns(handle.conversation_id()).unwrap();
        let kinds: Vec<(TurnType, Sender)> = turns.iter().map(|t| (t.turn_type, t.sender)).collect();
        assert_eq!(
            kinds,
            vec![
                (TurnType::Text, Sender::Customer),
                (TurnType::Text, Sender::Bot),
                (TurnType::FunctionCall, Sender::Bot),
                (TurnType::FunctionResponse, Sender::Customer),
                (TurnType::Text, Sender::Bot),
            ]
        );

        // second call saw the model turn and the tool results
        let seen = driver.seen.lock().unwrap();
        let second = &seen[1];
        assert_eq!(second.len(), 3);
        assert_eq!(
            second[2].parts[0],
            Part::function_response("lookup", json!({"result": {"echo": {"q": 1}}}))
        );
    }

    #[tokio::test]
    async fn test_respond_iteration_limit_uses_fallback() {
        let call = || ModelResponse::with_parts(vec![Part::function_call("lookup", json!({}))]);
        let driver = ScriptedDriver::new(vec![call(), call(), call()]);
        let config = EngineConfig {
            max_tool_iterations: 2,
            fallback_reply: "Sorry!".into(),
            ..EngineConfig::default()
        };
        let engine = engine_with(driver, config);
        let conversation = engine.resolve_conversation("c1", 0).unwrap();
        let handle = engine.open_session(conversation).await.unwrap();

        let reply = engine.respond(&handle, "loop").await.unwrap();
        assert_eq!(reply.text, "Sorry!");
        assert_eq!(reply.tool_calls, 2);
        let turns = engine.store().list_agent_turns(handle.conversation_id()).unwrap();
        assert_eq!(turns.last().unwrap().data, "Sorry!");
    }

    #[tokio::test]
    async fn test_model_timeout() {
        let config = EngineConfig {
            model_timeout: Duration::from_millis(20),
            ..EngineConfig::default()
        };
        let engine = engine_with(Arc::new(SlowDriver), config);
        let conversation = engine.resolve_conversation("c1", 0).unwrap();
        let handle = engine.open_session(conversation).await.unwrap();
        let err = engine.respond(&handle, "hi").await.unwrap_err();
        assert!(matches!(err, GatewayError::Provider(ProviderError::Timeout(_))));
    }

    #[tokio::test]
    async fn test_closed_conversation_rejects_session() {
        let engine = engine_with(ScriptedDriver::new(vec![]), EngineConfig::default());
        let conversation = engine.resolve_conversation("c1", 0).unwrap();
        let first_id = conversation.id;
        let mut handle = engine.open_session(conversation.clone()).await.unwrap();
        engine.end_conversation(&mut handle, Some("done")).unwrap();

        assert!(matches!(
            engine.respond(&handle, "hi").await,
            Err(GatewayError::Session(_))
        ));
        engine.close_session(handle);

        let err = engine.open_session(conversation).await.unwrap_err();
        assert!(matches!(err, GatewayError::Session(_)));

        let next = engine.resolve_conversation("c1", 5).unwrap();
        assert!(next.is_open());
        assert_ne!(next.id, first_id);
    }
}
