#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use time::macros::datetime;
use time::OffsetDateTime;
use tower::ServiceExt;

use activation::app::build_app;
use activation::auth::memory::MemoryUserStore;
use activation::clock::ManualClock;
use activation::config::{AppConfig, MailTransport, StoreBackend};
use activation::mail::{Notifier, NotifyError, SmtpConfig};
use activation::state::AppState;

pub const START: OffsetDateTime = datetime!(2026-10-16 09:00 UTC);

// ── RecordingNotifier ────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn last_token_for(&self, email: &str) -> String {
        self.sent()
            .into_iter()
            .rev()
            .find(|(to, _)| to == email)
            .map(|(_, token)| token)
            .expect("a token was sent")
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_activation_token(&self, email: &str, token: &str) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .unwrap()
            .push((email.to_string(), token.to_string()));
        Ok(())
    }
}

// ── TestApp ──────────────────────────────────────────────────────────────────

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryUserStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<ManualClock>,
}

fn test_config() -> AppConfig {
    AppConfig {
        store: StoreBackend::Memory,
        database_url: None,
        host: "127.0.0.1".into(),
        port: 0,
        token_ttl_minutes: 30,
        mail_transport: MailTransport::Log,
        smtp: SmtpConfig {
            host: "127.0.0.1".into(),
            port: 1025,
            username: None,
            password: None,
            from: "info@activation.local".into(),
            timeout: StdDuration::from_secs(1),
        },
    }
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(MemoryUserStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let clock = Arc::new(ManualClock::new(START));
        let state = AppState::from_parts(
            Arc::new(test_config()),
            store.clone(),
            notifier.clone(),
            clock.clone(),
        );
        Self {
            router: build_app(state),
            store,
            notifier,
            clock,
        }
    }

    pub async fn post_json(&self, uri: &str, body: &str) -> (StatusCode, serde_json::Value) {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        (status, json)
    }

    pub async fn register(&self, email: &str, password: &str) -> (StatusCode, serde_json::Value) {
        let body = serde_json::json!({ "email": email, "password": password }).to_string();
        self.post_json("/api/v1/auth/register", &body).await
    }

    pub async fn activate(&self, email: &str, token: &str) -> (StatusCode, serde_json::Value) {
        let body = serde_json::json!({ "email": email, "token": token }).to_string();
        self.post_json("/api/v1/auth/activate", &body).await
    }
}
