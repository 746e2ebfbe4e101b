use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{error, info};
use tracing_subscriber::prelude::*;

use gamerelay::alert_log::AlertLogLayer;
use gamerelay::config::Config;
use gamerelay::relay::services::{STUB_LAST_AMOUNT, STUB_POINTS, StaticDeposit, StaticPoints, StaticReceiver};
use gamerelay::relay::{Database, GeminiClient, MessengerClient, RelayEngine, Services, TelegramAlerts};
use gamerelay::webhook::{self, AppState};

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("gamerelay: {e}");
            std::process::exit(1);
        }
    };

    // Setup logging
    let log_dir = config.data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).ok();
    let log_file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("gamerelay.log"))
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("gamerelay: failed to open log file in {}: {e}", log_dir.display());
            std::process::exit(1);
        }
    };
    let (non_blocking, _guard) = tracing_appender::non_blocking(log_file);

    let registry = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(
                    tracing_subscriber::EnvFilter::from_default_env()
                        .add_directive(tracing::Level::INFO.into()),
                ),
        );

    let alerts = Arc::new(TelegramAlerts::new(&config.telegram_bot_token, config.alert_chat_id));

    if config.forward_logs_to_alerts {
        registry
            .with(AlertLogLayer::new(alerts.bot(), alerts.chat_id()))
            .init();
    } else {
        registry.init();
    }

    info!("🚀 Starting gamerelay...");
    info!("Data directory: {}", config.data_dir.display());

    let database = match Database::open(&config.database_path()) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!("Failed to open database: {e}");
            std::process::exit(1);
        }
    };

    let messenger = Arc::new(MessengerClient::new(config.page_access_token.clone()));
    let services = Services {
        notifier: messenger.clone(),
        alerter: alerts,
        replies: Arc::new(GeminiClient::new(config.gemini_api_key.clone())),
        points: Arc::new(StaticPoints(STUB_POINTS)),
        deposits: Arc::new(StaticDeposit(STUB_LAST_AMOUNT)),
        receivers: Arc::new(StaticReceiver(config.payment_receiver.clone())),
        profiles: messenger,
    };

    let engine = Arc::new(RelayEngine::new(database, services, config.payment_receiver.clone()));
    let state = AppState {
        verify_token: Arc::from(config.verify_token.as_str()),
        engine,
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    if let Err(e) = webhook::serve(addr, state).await {
        error!("Webhook server error: {e}");
        std::process::exit(1);
    }
}
