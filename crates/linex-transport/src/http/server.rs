//! Webhook server.
//!
//! A single path serves two routes:
//!
//! - `POST`: verifies `x-line-signature`, parses the payload and dispatches
//!   its events. Handler failures never change the response.
//! - `GET`: a fixed liveness string.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
};
use linex_core::{SIGNATURE_HEADER, SignatureVerifier};
use linex_framework::{Dispatcher, WebhookPayload};
use serde_json::json;
use tokio::net::{TcpListener, ToSocketAddrs};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::TransportResult;

/// Body of the liveness route.
pub const LIVENESS_TEXT: &str = "linex is running";

/// Shared state of the webhook routes.
#[derive(Clone)]
pub struct WebhookState {
    verifier: SignatureVerifier,
    dispatcher: Arc<Dispatcher>,
}

impl WebhookState {
    /// Creates the state from a channel secret verifier and a dispatcher.
    pub fn new(verifier: SignatureVerifier, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            verifier,
            dispatcher,
        }
    }
}

/// Builds the webhook router on `path`.
pub fn webhook_router(path: &str, state: WebhookState) -> Router {
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    };

    Router::new()
        .route(&path, post(webhook_handler).get(liveness_handler))
        .with_state(Arc::new(state))
}

fn reject(message: &'static str) -> Response {
    (StatusCode::BAD_REQUEST, Json(json!({ "message": message }))).into_response()
}

async fn webhook_handler(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if !state.verifier.verify(&body, signature) {
        warn!(len = body.len(), "Rejected webhook with invalid signature");
        return reject("invalid webhook");
    }

    let payload: WebhookPayload = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, "Rejected webhook with invalid payload");
            return reject("invalid payload");
        }
    };

    info!(events = payload.events.len(), "Received webhook");
    let report = state.dispatcher.process(&payload.events).await;
    debug!(?report, "Webhook processed");

    (StatusCode::OK, Json(json!({ "message": "ok" }))).into_response()
}

async fn liveness_handler() -> &'static str {
    LIVENESS_TEXT
}

/// A bound webhook server.
pub struct WebhookServer {
    listener: TcpListener,
    router: Router,
}

impl WebhookServer {
    /// Binds `addr` for `router`.
    pub async fn bind(addr: impl ToSocketAddrs, router: Router) -> TransportResult<Self> {
        let listener = TcpListener::bind(addr).await?;
        Ok(Self { listener, router })
    }

    /// The address actually bound.
    pub fn local_addr(&self) -> TransportResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves until `shutdown` is cancelled, then finishes in-flight
    /// requests.
    pub async fn serve(self, shutdown: CancellationToken) -> TransportResult<()> {
        let addr = self.local_addr()?;
        info!(addr = %addr, "Webhook server listening");

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        info!("Webhook server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use linex_core::testing::MockApiCaller;
    use linex_core::{Context, ContextDeps, EntityCache, LineApi};
    use linex_framework::HandlerRegistry;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tower::ServiceExt;

    const SECRET: &str = "channel-secret";

    fn app() -> (Router, Arc<AtomicUsize>) {
        let caller = Arc::new(MockApiCaller::new());
        let deps = ContextDeps::new(Arc::new(LineApi::new(caller)), EntityCache::new());
        let registry = Arc::new(HandlerRegistry::new());

        let count = Arc::new(AtomicUsize::new(0));
        {
            let count = Arc::clone(&count);
            registry.register("text", move |_: Context| {
                let count = Arc::clone(&count);
                async move {
                    count.fetch_add(1, Ordering::SeqCst);
                }
            });
        }

        let dispatcher = Arc::new(Dispatcher::new(registry, deps));
        let state = WebhookState::new(SignatureVerifier::new(SECRET), dispatcher);
        (webhook_router("/callback", state), count)
    }

    fn text_payload() -> String {
        json!({
            "destination": "Ubot",
            "events": [{
                "type": "message",
                "mode": "active",
                "timestamp": linex_core::context::now_millis(),
                "webhookEventId": "01H",
                "deliveryContext": { "isRedelivery": false },
                "replyToken": "token",
                "source": { "type": "user", "userId": "U1" },
                "message": { "type": "text", "id": "m1", "text": "hi" }
            }]
        })
        .to_string()
    }

    fn signed_request(body: String, signature: Option<String>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/callback")
            .header("content-type", "application/json");
        if let Some(signature) = signature {
            builder = builder.header(SIGNATURE_HEADER, signature);
        }
        builder.body(Body::from(body)).unwrap()
    }

    fn sign(body: &str) -> Option<String> {
        Some(SignatureVerifier::new(SECRET).sign(body.as_bytes()))
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_valid_webhook_is_dispatched() {
        let (app, count) = app();
        let body = text_payload();
        let signature = sign(&body);

        let response = app.oneshot(signed_request(body, signature)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "message": "ok" }));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalid_signature_is_rejected() {
        let (app, count) = app();
        let body = text_payload();
        let signature = SignatureVerifier::new("other-secret").sign(body.as_bytes());

        let response = app
            .oneshot(signed_request(body, Some(signature)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({ "message": "invalid webhook" }));
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_signature_is_rejected() {
        let (app, count) = app();

        let response = app
            .oneshot(signed_request(text_payload(), None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_payload_is_rejected() {
        let (app, _) = app();
        let body = r#"{"destination":"Ubot"}"#.to_string();
        let signature = sign(&body);

        let response = app.oneshot(signed_request(body, signature)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({ "message": "invalid payload" }));
    }

    #[tokio::test]
    async fn test_verification_ping_is_acknowledged() {
        let (app, count) = app();
        let body = json!({ "destination": "Ubot", "events": [] }).to_string();
        let signature = sign(&body);

        let response = app.oneshot(signed_request(body, signature)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_liveness() {
        let (app, _) = app();
        let request = Request::builder()
            .uri("/callback")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], LIVENESS_TEXT.as_bytes());
    }

    #[tokio::test]
    async fn test_serve_stops_on_shutdown() {
        let (app, _) = app();
        let server = WebhookServer::bind("127.0.0.1:0", app).await.unwrap();
        assert_ne!(server.local_addr().unwrap().port(), 0);

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(server.serve(shutdown.clone()));
        shutdown.cancel();

        task.await.unwrap().unwrap();
    }
}
