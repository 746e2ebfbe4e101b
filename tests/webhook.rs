//! End-to-end tests for the webhook endpoint.
//!
//! Each test starts the real router on an ephemeral port with recording
//! collaborators and drives it over HTTP.
//!
//! Run with: cargo test --test webhook

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use gamerelay::relay::services::*;
use gamerelay::relay::{Database, RelayEngine, Services};
use gamerelay::webhook::{self, AppState, RECEIVED_BODY};
use serde_json::json;

const VERIFY_TOKEN: &str = "test123";

#[derive(Default)]
struct RecordingMessenger {
    sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Notifier for RecordingMessenger {
    async fn send_text(&self, recipient_id: &str, text: &str) -> Result<(), ApiError> {
        self.sent.lock().unwrap().push((recipient_id.to_string(), text.to_string()));
        Ok(())
    }
}

#[derive(Default)]
struct RecordingAlerts {
    alerts: Mutex<Vec<String>>,
}

#[async_trait]
impl Alerter for RecordingAlerts {
    async fn alert(&self, text: &str) -> Result<(), ApiError> {
        self.alerts.lock().unwrap().push(text.to_string());
        Ok(())
    }
}

struct CannedReplies;

#[async_trait]
impl ReplyGenerator for CannedReplies {
    async fn reply(&self, _utterance: &str, _context_hint: &str) -> String {
        "Welcome in!".to_string()
    }
}

struct FixedProfile;

#[async_trait]
impl ProfileLookup for FixedProfile {
    async fn first_name(&self, _sender_id: &str) -> Result<String, ApiError> {
        Ok("Sam".to_string())
    }
}

struct TestServer {
    base: String,
    engine: Arc<RelayEngine>,
    messenger: Arc<RecordingMessenger>,
    alerts: Arc<RecordingAlerts>,
    http: reqwest::Client,
}

async fn start() -> TestServer {
    let messenger = Arc::new(RecordingMessenger::default());
    let alerts = Arc::new(RecordingAlerts::default());
    let services = Services {
        notifier: messenger.clone(),
        alerter: alerts.clone(),
        replies: Arc::new(CannedReplies),
        points: Arc::new(StaticPoints(STUB_POINTS)),
        deposits: Arc::new(StaticDeposit(STUB_LAST_AMOUNT)),
        receivers: Arc::new(StaticReceiver("$cashier".to_string())),
        profiles: Arc::new(FixedProfile),
    };
    let engine = Arc::new(RelayEngine::new(
        Arc::new(Database::in_memory().unwrap()),
        services,
        "$cashier".to_string(),
    ));
    let state = AppState {
        verify_token: Arc::from(VERIFY_TOKEN),
        engine: engine.clone(),
    };

    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, webhook::router(state)).await.unwrap();
    });

    TestServer {
        base: format!("http://{addr}"),
        engine,
        messenger,
        alerts,
        http: reqwest::Client::new(),
    }
}

fn page_event(sender: &str, text: &str) -> serde_json::Value {
    json!({
        "object": "page",
        "entry": [{
            "id": "page-1",
            "time": 1700000000,
            "messaging": [{
                "sender": {"id": sender},
                "recipient": {"id": "page-1"},
                "timestamp": 1700000000,
                "message": {"mid": "m-1", "text": text}
            }]
        }]
    })
}

#[tokio::test]
async fn test_verification_echoes_challenge() {
    let server = start().await;
    let response = server
        .http
        .get(format!("{}/webhook", server.base))
        .query(&[("hub.mode", "subscribe"), ("hub.verify_token", VERIFY_TOKEN), ("hub.challenge", "1158201444")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "1158201444");
}

#[tokio::test]
async fn test_verification_rejects_wrong_token() {
    let server = start().await;
    let response = server
        .http
        .get(format!("{}/webhook", server.base))
        .query(&[("hub.verify_token", "wrong"), ("hub.challenge", "abc")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 403);
    assert_eq!(response.text().await.unwrap(), "Verification failed");
}

#[tokio::test]
async fn test_verification_without_token_is_forbidden() {
    let server = start().await;
    let response = server.http.get(format!("{}/webhook", server.base)).send().await.unwrap();
    assert_eq!(response.status(), 403);
}

#[tokio::test]
async fn test_text_message_is_routed_and_acknowledged() {
    let server = start().await;
    let response = server
        .http
        .post(format!("{}/webhook", server.base))
        .json(&page_event("psid-7", "hello"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), RECEIVED_BODY);

    let sent = server.messenger.sent.lock().unwrap().clone();
    assert_eq!(sent, vec![("psid-7".to_string(), "Hi Sam! Welcome in!".to_string())]);
}

#[tokio::test]
async fn test_cash_in_over_http_records_once() {
    let server = start().await;
    let link = "https://cash.app/payments/abc?amount=20.00";

    for _ in 0..2 {
        let response = server
            .http
            .post(format!("{}/webhook", server.base))
            .json(&page_event("psid-7", link))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    assert_eq!(server.engine.database().counts().unwrap().receipts, 1);
    assert_eq!(server.alerts.alerts.lock().unwrap().len(), 1);
    let sent = server.messenger.sent.lock().unwrap().clone();
    assert!(sent[0].1.contains("$22.00"));
    assert!(sent[1].1.contains("couldn't verify"));
}

#[tokio::test]
async fn test_non_page_object_is_ignored() {
    let server = start().await;
    let mut body = page_event("psid-7", "hello");
    body["object"] = json!("instagram");

    let response = server
        .http
        .post(format!("{}/webhook", server.base))
        .json(&body)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert!(server.messenger.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_events_without_text_are_skipped() {
    let server = start().await;
    let body = json!({
        "object": "page",
        "entry": [{"messaging": [
            {"sender": {"id": "psid-7"}, "read": {"watermark": 1}},
            {"sender": {"id": "psid-8"}, "message": {"mid": "m", "attachments": [{"type": "image"}]}}
        ]}]
    });

    let response = server
        .http
        .post(format!("{}/webhook", server.base))
        .json(&body)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert!(server.messenger.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_payload_is_server_error() {
    let server = start().await;
    let response = server
        .http
        .post(format!("{}/webhook", server.base))
        .json(&json!({"object": "page"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 500);
    assert!(server.messenger.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_health() {
    let server = start().await;
    let response = server.http.get(format!("{}/health", server.base)).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "OK");
}
