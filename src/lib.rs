//! Messenger webhook relay for game recharges and cashouts.

pub mod alert_log;
pub mod config;
pub mod relay;
pub mod webhook;
