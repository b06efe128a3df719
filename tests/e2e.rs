//! End-to-end tests for wagate
//!
//! These push raw webhook bodies through the HTTP router, let the dispatcher
//! drain the inbound queue into a real `ConversationService`, and inspect the
//! store afterwards. The model backend and the outbound transport are local
//! fakes, so nothing here needs network access or API keys.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use tokio_test::{assert_err, assert_ok};
use tower::ServiceExt;

use wagate::channels::{OutboundSender, SendReceipt, Transport};
use wagate::events::ReplyMessage;
use wagate::gateway::{router, IdempotencyStore, IngestPipeline};
use wagate::providers::{ChatOptions, Content, ModelDriver, ModelResponse, ToolDefinition};
use wagate::store::{ConversationStore, Sender, TurnType};
use wagate::tools::ToolRegistry;
use wagate::{
    ConversationEngine, ConversationService, Dispatcher, EngineConfig, MessageBus, Result,
};

// ============================================================================
// Fakes
// ============================================================================

/// Always answers with the same text.
struct FixedDriver {
    reply: String,
    calls: AtomicUsize,
}

#[async_trait]
impl ModelDriver for FixedDriver {
    async fn generate(
        &self,
        _system: Option<&str>,
        _contents: &[Content],
        _tools: &[ToolDefinition],
        _options: &ChatOptions,
    ) -> Result<ModelResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ModelResponse::text(&self.reply))
    }

    fn default_model(&self) -> &str {
        "fixed"
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

#[derive(Default)]
struct CapturingTransport {
    sent: Mutex<Vec<ReplyMessage>>,
}

#[async_trait]
impl Transport for CapturingTransport {
    async fn send(&self, reply: ReplyMessage) -> Result<SendReceipt> {
        self.sent.lock().unwrap().push(reply);
        Ok(SendReceipt::new("wamid.OUT"))
    }
}

struct Gateway {
    app: Router,
    bus: Arc<MessageBus>,
    store: ConversationStore,
    driver: Arc<FixedDriver>,
    transport: Arc<CapturingTransport>,
    service: Arc<ConversationService>,
}

fn gateway(dedup: bool) -> Gateway {
    let store = ConversationStore::in_memory().unwrap();
    let driver = Arc::new(FixedDriver {
        reply: "Thanks, noted.".to_string(),
        calls: AtomicUsize::new(0),
    });
    let transport = Arc::new(CapturingTransport::default());
    let engine = ConversationEngine::new(
        store.clone(),
        driver.clone(),
        Arc::new(ToolRegistry::new()),
        EngineConfig::default(),
    );
    let sender = OutboundSender::new(transport.clone(), store.clone());
    let service = Arc::new(ConversationService::new(Arc::new(engine), sender));

    let bus = Arc::new(MessageBus::new());
    let mut pipeline = IngestPipeline::new(bus.clone(), "verify-me");
    if dedup {
        pipeline = pipeline.with_dedup(IdempotencyStore::new(Duration::from_secs(600), 1000));
    }
    Gateway {
        app: router(Arc::new(pipeline), "/webhook"),
        bus,
        store,
        driver,
        transport,
        service,
    }
}

fn text_notification(message_id: &str, from: &str, body: &str) -> String {
    format!(
        r#"{{
            "object": "whatsapp_business_account",
            "entry": [{{
                "id": "WABA1",
                "changes": [{{
                    "field": "messages",
                    "value": {{
                        "messaging_product": "whatsapp",
                        "metadata": {{"display_phone_number": "15550001111", "phone_number_id": "PN1"}},
                        "contacts": [{{"profile": {{"name": "Ana"}}, "wa_id": "{from}"}}],
                        "messages": [{{
                            "from": "{from}",
                            "id": "{message_id}",
                            "timestamp": "1700000000",
                            "type": "text",
                            "text": {{"body": "{body}"}}
                        }}]
                    }}
                }}]
            }}]
        }}"#
    )
}

async fn post(app: &Router, body: String) -> (StatusCode, String) {
    let response = app
        .clone()
        .oneshot(
            Request::post("/webhook")
                .header("content-type", "application/json")
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn get(app: &Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .clone()
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

/// Close the queue and let a single-worker dispatcher drain it.
async fn drain(gw: &Gateway) {
    gw.bus.close();
    let dispatcher = Dispatcher::new(gw.bus.clone(), gw.service.clone(), 1);
    let run = tokio::time::timeout(Duration::from_secs(5), dispatcher.start()).await;
    assert_ok!(assert_ok!(run));
}

fn customer_text_turns(store: &ConversationStore, customer: &str) -> usize {
    store
        .list_conversations(customer)
        .unwrap()
        .iter()
        .flat_map(|c| store.list_agent_turns(c.id).unwrap())
        .filter(|t| t.turn_type == TurnType::Text && t.sender == Sender::Customer)
        .count()
}

// ============================================================================
// Webhook to reply
// ============================================================================

#[tokio::test]
async fn test_webhook_message_is_answered() {
    let gw = gateway(true);

    let (status, body) = post(&gw.app, text_notification("wamid.A1", "601", "hello")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "Received");

    drain(&gw).await;

    let conv = gw.store.get_active_conversation("601").unwrap().unwrap();
    let chat = gw.store.list_chat_turns(conv.id).unwrap();
    assert_eq!(chat.len(), 2);
    assert_eq!(chat[0].sender, Sender::Customer);
    assert_eq!(chat[0].message, "hello");
    assert_eq!(chat[1].sender, Sender::Bot);
    assert_eq!(chat[1].message, "Thanks, noted.");

    let sent = gw.transport.sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "601");
}

#[tokio::test]
async fn test_redelivery_without_dedup_is_processed_twice() {
    let gw = gateway(false);
    let body = text_notification("wamid.R1", "601", "order 2 mugs");

    assert_eq!(post(&gw.app, body.clone()).await.0, StatusCode::OK);
    assert_eq!(post(&gw.app, body).await.0, StatusCode::OK);
    drain(&gw).await;

    assert_eq!(customer_text_turns(&gw.store, "601"), 2);
    assert_eq!(gw.driver.calls.load(Ordering::SeqCst), 2);
    // Both land in the same open conversation
    assert_eq!(gw.store.list_conversations("601").unwrap().len(), 1);
}

#[tokio::test]
async fn test_redelivery_with_dedup_is_processed_once() {
    let gw = gateway(true);
    let body = text_notification("wamid.R1", "601", "order 2 mugs");

    assert_eq!(post(&gw.app, body.clone()).await.0, StatusCode::OK);
    assert_eq!(post(&gw.app, body).await.0, StatusCode::OK);
    drain(&gw).await;

    assert_eq!(customer_text_turns(&gw.store, "601"), 1);
    assert_eq!(gw.driver.calls.load(Ordering::SeqCst), 1);
    assert_eq!(gw.transport.sent.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_customers_get_separate_conversations() {
    let gw = gateway(true);
    post(&gw.app, text_notification("wamid.1", "601", "hi")).await;
    post(&gw.app, text_notification("wamid.2", "602", "hey")).await;
    drain(&gw).await;

    let a = gw.store.get_active_conversation("601").unwrap().unwrap();
    let b = gw.store.get_active_conversation("602").unwrap().unwrap();
    assert_ne!(a.id, b.id);
    assert_eq!(gw.store.list_chat_turns(a.id).unwrap()[0].message, "hi");
    assert_eq!(gw.store.list_chat_turns(b.id).unwrap()[0].message, "hey");
}

// ============================================================================
// Handshake and rejects
// ============================================================================

#[tokio::test]
async fn test_handshake_is_repeatable() {
    let gw = gateway(true);
    let uri = "/webhook?hub.mode=subscribe&hub.verify_token=verify-me&hub.challenge=1158201444";

    for _ in 0..3 {
        let (status, body) = get(&gw.app, uri).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "1158201444");
    }

    let (status, body) = get(
        &gw.app,
        "/webhook?hub.mode=subscribe&hub.verify_token=guess&hub.challenge=1",
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body, "Forbidden");
}

#[tokio::test]
async fn test_malformed_body_is_500_and_enqueues_nothing() {
    let gw = gateway(true);

    let (status, _) = post(&gw.app, "not json at all".to_string()).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, _) = post(
        &gw.app,
        r#"{"object": "whatsapp_business_account", "entry": "nope"}"#.to_string(),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    drain(&gw).await;
    assert_eq!(gw.driver.calls.load(Ordering::SeqCst), 0);
    assert!(gw.store.list_conversations("601").unwrap().is_empty());
}

#[tokio::test]
async fn test_status_only_notification_is_a_noop() {
    let gw = gateway(true);
    let body = r#"{
        "object": "whatsapp_business_account",
        "entry": [{
            "id": "WABA1",
            "changes": [{
                "field": "messages",
                "value": {
                    "messaging_product": "whatsapp",
                    "metadata": {"display_phone_number": "15550001111", "phone_number_id": "PN1"},
                    "statuses": [{"id": "wamid.OUT", "status": "read", "timestamp": "1700000005", "recipient_id": "601"}]
                }
            }]
        }]
    }"#;

    let (status, _) = post(&gw.app, body.to_string()).await;
    assert_eq!(status, StatusCode::OK);

    drain(&gw).await;
    assert_eq!(gw.driver.calls.load(Ordering::SeqCst), 0);
    assert!(gw.store.get_active_conversation("601").unwrap().is_none());
}

#[tokio::test]
async fn test_post_after_shutdown_fails() {
    let gw = gateway(true);
    gw.bus.close();

    let (status, body) = post(&gw.app, text_notification("wamid.1", "601", "late")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, "Internal error");
    assert_err!(gw
        .bus
        .publish_inbound(wagate::InboundMessage::text("wamid.2", "601", "late", 0)));
}
