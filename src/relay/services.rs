//! External collaborators the engine talks to, one method each.
//!
//! Real HTTP clients live in `messenger`, `telegram` and `gemini`. The
//! points, deposit and receiver lookups have no backing service yet and are
//! served by the `Static*` stubs below.

use async_trait::async_trait;
use std::fmt;

/// Failure talking to an outbound HTTP API.
#[derive(Debug)]
pub enum ApiError {
    Http(String),
    Api(String),
    Parse(String),
    Empty,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Http(e) => write!(f, "HTTP error: {e}"),
            ApiError::Api(e) => write!(f, "API error: {e}"),
            ApiError::Parse(e) => write!(f, "Parse error: {e}"),
            ApiError::Empty => write!(f, "Empty response"),
        }
    }
}

impl std::error::Error for ApiError {}

/// Sends a text message to an end user.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_text(&self, recipient_id: &str, text: &str) -> Result<(), ApiError>;
}

/// Posts a text message to the internal alert channel.
#[async_trait]
pub trait Alerter: Send + Sync {
    async fn alert(&self, text: &str) -> Result<(), ApiError>;
}

/// Produces a short stylized reply. Never fails; falls back to static text.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn reply(&self, utterance: &str, context_hint: &str) -> String;
}

/// Current in-game points for a player.
#[async_trait]
pub trait PointsLookup: Send + Sync {
    async fn points(&self, sender_id: &str, username: &str) -> Result<f64, ApiError>;
}

/// Last cash-in amount for a sender, before bonus.
#[async_trait]
pub trait DepositLookup: Send + Sync {
    async fn last_amount(&self, sender_id: &str) -> Result<f64, ApiError>;
}

/// Extracts the receiving Cash App account from a payment link.
pub trait ReceiverParser: Send + Sync {
    fn receiver(&self, url: &str) -> String;
}

/// Display name for a messaging-platform user.
#[async_trait]
pub trait ProfileLookup: Send + Sync {
    async fn first_name(&self, sender_id: &str) -> Result<String, ApiError>;
}

/// Fixed points balance.
pub struct StaticPoints(pub f64);

#[async_trait]
impl PointsLookup for StaticPoints {
    async fn points(&self, _sender_id: &str, _username: &str) -> Result<f64, ApiError> {
        Ok(self.0)
    }
}

/// Fixed last deposit.
pub struct StaticDeposit(pub f64);

#[async_trait]
impl DepositLookup for StaticDeposit {
    async fn last_amount(&self, _sender_id: &str) -> Result<f64, ApiError> {
        Ok(self.0)
    }
}

/// Reports every link as paid to the given receiver.
pub struct StaticReceiver(pub String);

impl ReceiverParser for StaticReceiver {
    fn receiver(&self, _url: &str) -> String {
        self.0.clone()
    }
}

/// Stub points balance until a game backend is wired in.
pub const STUB_POINTS: f64 = 50.0;

/// Stub last deposit until cash-ins are linked to confirmations.
pub const STUB_LAST_AMOUNT: f64 = 10.0;
