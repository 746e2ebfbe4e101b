//! Alert channel client using teloxide.

use async_trait::async_trait;
use teloxide::prelude::*;
use tracing::info;

use crate::relay::services::{Alerter, ApiError};

/// Telegram's hard cap on message length.
const MAX_MESSAGE_CHARS: usize = 4096;

/// Posts alerts to a fixed Telegram chat.
pub struct TelegramAlerts {
    bot: Bot,
    chat_id: ChatId,
}

impl TelegramAlerts {
    pub fn new(bot_token: &str, chat_id: i64) -> Self {
        Self {
            bot: Bot::new(bot_token),
            chat_id: ChatId(chat_id),
        }
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }
}

/// Cut `text` to Telegram's limit on a char boundary.
pub fn clamp_message(text: &str) -> String {
    if text.chars().count() <= MAX_MESSAGE_CHARS {
        return text.to_string();
    }
    let truncated: String = text.chars().take(MAX_MESSAGE_CHARS - 3).collect();
    format!("{}...", truncated)
}

#[async_trait]
impl Alerter for TelegramAlerts {
    async fn alert(&self, text: &str) -> Result<(), ApiError> {
        self.bot
            .send_message(self.chat_id, clamp_message(text))
            .await
            .map_err(|e| ApiError::Http(e.to_string()))?;

        info!("🔔 Alert sent to chat {}", self.chat_id.0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_short_message_untouched() {
        assert_eq!(clamp_message("cash-in $10.00"), "cash-in $10.00");
    }

    #[test]
    fn test_clamp_long_message() {
        let long = "é".repeat(5000);
        let clamped = clamp_message(&long);
        assert_eq!(clamped.chars().count(), MAX_MESSAGE_CHARS);
        assert!(clamped.ends_with("..."));
    }
}
