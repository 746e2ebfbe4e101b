//! Tracing layer that mirrors WARN/ERROR events into the alert channel.

use std::time::Duration;

use teloxide::prelude::*;
use teloxide::types::ChatId;
use tokio::sync::mpsc;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;

use crate::relay::telegram::clamp_message;

/// Flush the buffer early once it holds this many lines.
const MAX_BUFFERED: usize = 20;

pub struct AlertLogLayer {
    tx: mpsc::UnboundedSender<String>,
}

impl AlertLogLayer {
    /// Must be called from inside a tokio runtime.
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            let mut buffer: Vec<String> = Vec::new();
            let mut interval = tokio::time::interval(Duration::from_secs(5));

            loop {
                tokio::select! {
                    line = rx.recv() => {
                        match line {
                            Some(line) => {
                                buffer.push(line);
                                if buffer.len() >= MAX_BUFFERED {
                                    flush(&bot, chat_id, &mut buffer).await;
                                }
                            }
                            None => {
                                flush(&bot, chat_id, &mut buffer).await;
                                break;
                            }
                        }
                    }
                    _ = interval.tick() => {
                        flush(&bot, chat_id, &mut buffer).await;
                    }
                }
            }
        });

        Self { tx }
    }
}

async fn flush(bot: &Bot, chat_id: ChatId, buffer: &mut Vec<String>) {
    if buffer.is_empty() {
        return;
    }
    let combined = buffer.join("\n");
    buffer.clear();
    // stderr, not tracing: a warn! here would feed straight back into this layer.
    if let Err(e) = bot.send_message(chat_id, clamp_message(&combined)).await {
        eprintln!("Failed to forward logs to alert channel: {e}");
    }
}

struct MessageVisitor {
    message: String,
}

impl Visit for MessageVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{:?}", value);
        } else if self.message.is_empty() {
            self.message = format!("{} = {:?}", field.name(), value);
        } else {
            self.message
                .push_str(&format!(", {} = {:?}", field.name(), value));
        }
    }
}

/// Render an event as a single alert line, or `None` below WARN.
fn format_event(level: Level, message: &str) -> Option<String> {
    match level {
        Level::ERROR => Some(format!("❌ {}", message)),
        Level::WARN => Some(format!("⚠️ {}", message)),
        _ => None,
    }
}

impl<S: Subscriber> Layer<S> for AlertLogLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let level = *event.metadata().level();
        if level > Level::WARN {
            return;
        }

        let mut visitor = MessageVisitor {
            message: String::new(),
        };
        event.record(&mut visitor);

        if let Some(line) = format_event(level, &visitor.message)
            && self.tx.send(line).is_err()
        {
            eprintln!("Alert log channel closed, message dropped");
        }
    }
}
