//! Messenger Graph API client: outbound sends and profile lookups.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::relay::services::{ApiError, Notifier, ProfileLookup};

const GRAPH_API_URL: &str = "https://graph.facebook.com/v19.0";

pub struct MessengerClient {
    access_token: String,
    base_url: String,
    http: reqwest::Client,
}

#[derive(Serialize)]
struct SendRequest<'a> {
    recipient: Recipient<'a>,
    message: OutgoingText<'a>,
}

#[derive(Serialize)]
struct Recipient<'a> {
    id: &'a str,
}

#[derive(Serialize)]
struct OutgoingText<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct Profile {
    first_name: Option<String>,
}

impl MessengerClient {
    pub fn new(access_token: String) -> Self {
        Self::with_base_url(access_token, GRAPH_API_URL.to_string())
    }

    /// Point at a different Graph API host.
    pub fn with_base_url(access_token: String, base_url: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();

        Self {
            access_token,
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        }
    }
}

#[async_trait]
impl Notifier for MessengerClient {
    async fn send_text(&self, recipient_id: &str, text: &str) -> Result<(), ApiError> {
        let request = SendRequest {
            recipient: Recipient { id: recipient_id },
            message: OutgoingText { text },
        };

        let response = self
            .http
            .post(format!("{}/me/messages", self.base_url))
            .query(&[("access_token", self.access_token.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| ApiError::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Api(format!("{status}: {body}")));
        }

        info!("📤 Sent message to {}", recipient_id);
        Ok(())
    }
}

/// Page-scoped ids are plain decimal digits.
fn is_page_scoped_id(id: &str) -> bool {
    !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit())
}

#[async_trait]
impl ProfileLookup for MessengerClient {
    async fn first_name(&self, sender_id: &str) -> Result<String, ApiError> {
        if !is_page_scoped_id(sender_id) {
            return Err(ApiError::Api(format!("invalid sender id {sender_id:?}")));
        }

        let response = self
            .http
            .get(format!("{}/{}", self.base_url, sender_id))
            .query(&[("fields", "first_name"), ("access_token", self.access_token.as_str())])
            .send()
            .await
            .map_err(|e| ApiError::Http(e.to_string()))?;

        let status = response.status();
        debug!("Profile lookup status: {status}");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Api(format!("{status}: {body}")));
        }

        let profile: Profile = response
            .json()
            .await
            .map_err(|e| ApiError::Parse(e.to_string()))?;

        profile
            .first_name
            .filter(|n| !n.trim().is_empty())
            .ok_or(ApiError::Empty)
    }
}
