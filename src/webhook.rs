//! Messenger webhook endpoint.
//!
//! `GET /webhook` answers the subscription handshake, `POST /webhook`
//! receives page events and feeds text messages to the relay engine.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::relay::RelayEngine;

/// Body returned for every accepted event batch.
pub const RECEIVED_BODY: &str = "Message received";

#[derive(Clone)]
pub struct AppState {
    pub verify_token: Arc<str>,
    pub engine: Arc<RelayEngine>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub object: String,
    pub entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
pub struct Entry {
    pub messaging: Vec<MessagingEvent>,
}

#[derive(Debug, Deserialize)]
pub struct MessagingEvent {
    pub sender: Participant,
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Deserialize)]
pub struct Participant {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
    pub text: Option<String>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", get(verify).post(receive))
        .route("/health", get(|| async { "OK" }))
        .with_state(state)
}

/// Serve until the process is stopped.
pub async fn serve(addr: SocketAddr, state: AppState) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    info!("Webhook listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state)).await
}

async fn verify(
    State(state): State<AppState>,
    Query(params): Query<VerifyQuery>,
) -> Result<String, (StatusCode, &'static str)> {
    if params.verify_token.as_deref() == Some(&*state.verify_token) {
        info!("Webhook verified (mode={:?})", params.mode);
        Ok(params.challenge.unwrap_or_default())
    } else {
        warn!("Webhook verification failed");
        Err((StatusCode::FORBIDDEN, "Verification failed"))
    }
}

async fn receive(
    State(state): State<AppState>,
    payload: Result<Json<WebhookPayload>, JsonRejection>,
) -> (StatusCode, &'static str) {
    let Json(payload) = match payload {
        Ok(p) => p,
        Err(e) => {
            error!("Malformed webhook payload: {e}");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error");
        }
    };

    if payload.object != "page" {
        debug!("Ignoring webhook for object {:?}", payload.object);
        return (StatusCode::OK, RECEIVED_BODY);
    }

    for entry in payload.entry {
        for event in entry.messaging {
            let Some(text) = event.message.and_then(|m| m.text) else {
                continue;
            };
            state.engine.handle_text(&event.sender.id, &text).await;
        }
    }

    (StatusCode::OK, RECEIVED_BODY)
}
