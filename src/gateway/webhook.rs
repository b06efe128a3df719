//! Webhook HTTP endpoint.
//!
//! One route serves both halves of the platform contract:
//! - `GET` answers the subscription handshake (`hub.challenge` or 403)
//! - `POST` ingests a change notification (200 once enqueued, 500 otherwise)

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

use crate::error::GatewayError;

use super::ingest::{IngestPipeline, VerifyParams};

/// Build the webhook router mounted at `path`.
pub fn router(pipeline: Arc<IngestPipeline>, path: &str) -> Router {
    Router::new()
        .route(path, get(handle_verify).post(handle_notification))
        .layer(TraceLayer::new_for_http())
        .with_state(pipeline)
}

async fn handle_verify(
    State(pipeline): State<Arc<IngestPipeline>>,
    Query(params): Query<VerifyParams>,
) -> Response {
    match pipeline.verify(&params) {
        Some(challenge) => (StatusCode::OK, challenge).into_response(),
        None => (StatusCode::FORBIDDEN, "Forbidden").into_response(),
    }
}

async fn handle_notification(
    State(pipeline): State<Arc<IngestPipeline>>,
    body: Bytes,
) -> Response {
    match pipeline.ingest(&body).await {
        Ok(outcome) => {
            debug!(
                enqueued = outcome.enqueued,
                duplicates = outcome.duplicates,
                skipped = outcome.skipped,
                statuses = outcome.statuses,
                "Notification processed"
            );
            (StatusCode::OK, "Received").into_response()
        }
        Err(GatewayError::MalformedEvent(e)) => {
            warn!(error = %e, bytes = body.len(), "Malformed webhook body");
            (StatusCode::INTERNAL_SERVER_ERROR, "Malformed event").into_response()
        }
        Err(e) => {
            error!(error = %e, "Failed to enqueue webhook messages");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::MessageBus;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn app() -> (Router, Arc<MessageBus>) {
        let bus = Arc::new(MessageBus::new());
        let pipeline = Arc::new(IngestPipeline::new(bus.clone(), "secret"));
        (router(pipeline, "/webhook"), bus)
    }

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_verify_echoes_challenge() {
        let (app, _) = app();
        let response = app
            .oneshot(
                Request::get("/webhook?hub.mode=subscribe&hub.verify_token=secret&hub.challenge=42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "42");
    }

    #[tokio::test]
    async fn test_verify_wrong_token_forbidden() {
        let (app, _) = app();
        let response = app
            .oneshot(
                Request::get("/webhook?hub.mode=subscribe&hub.verify_token=nope&hub.challenge=42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_post_malformed_is_500() {
        let (app, bus) = app();
        let response = app
            .oneshot(
                Request::post("/webhook")
                    .header("content-type", "application/json")
                    .body(Body::from("{\"object\": 5}"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        bus.close();
        assert!(bus.consume_inbound().await.is_none());
    }

    #[tokio::test]
    async fn test_post_foreign_object_acknowledged() {
        let (app, _) = app();
        let response = app
            .oneshot(
                Request::post("/webhook")
                    .body(Body::from(r#"{"object": "instagram", "entry": []}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "Received");
    }
}
