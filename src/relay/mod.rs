//! Relay module - turns inbound chat messages into recharges, cashouts and alerts.

pub mod amounts;
pub mod cashin;
pub mod database;
pub mod engine;
pub mod gemini;
pub mod intent;
pub mod messenger;
pub mod services;
pub mod telegram;


pub use database::Database;
pub use engine::{RelayEngine, Services};
pub use gemini::GeminiClient;
pub use intent::{Game, Intent};
pub use messenger::MessengerClient;
pub use telegram::TelegramAlerts;
