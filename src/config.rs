use std::fmt;
use std::path::PathBuf;

const DEFAULT_PORT: u16 = 3000;

/// Errors that can occur when loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// A required variable is absent or empty.
    Missing(&'static str),
    /// A variable is present but cannot be parsed.
    Invalid { name: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(name) => write!(f, "missing required environment variable {}", name),
            Self::Invalid { name, reason } => write!(f, "invalid value for {}: {}", name, reason),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Process configuration, built once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct Config {
    /// Shared secret echoed back during the webhook handshake.
    pub verify_token: String,
    /// Messenger page access token used for outbound sends.
    pub page_access_token: String,
    /// Cash App receiver that incoming payments must be addressed to.
    pub payment_receiver: String,
    pub telegram_bot_token: String,
    /// Internal alert channel.
    pub alert_chat_id: i64,
    pub gemini_api_key: String,
    pub port: u16,
    /// Directory for state files (database, logs).
    pub data_dir: PathBuf,
    /// Mirror WARN/ERROR log lines into the alert channel.
    pub forward_logs_to_alerts: bool,
}

impl Config {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load using an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| -> Result<String, ConfigError> {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(name))
        };

        let verify_token = required("VERIFY_TOKEN")?;
        let page_access_token = required("PAGE_ACCESS_TOKEN")?;
        let payment_receiver = required("CASHAPP_RECEIVER")?;
        let telegram_bot_token = required("TELEGRAM_BOT_TOKEN")?;
        let alert_chat_id = required("TELEGRAM_CHAT_ID")?
            .parse::<i64>()
            .map_err(|e| ConfigError::Invalid { name: "TELEGRAM_CHAT_ID", reason: e.to_string() })?;
        let gemini_api_key = required("GEMINI_API_KEY")?;

        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_parts: Vec<&str> = telegram_bot_token.split(':').collect();
        if token_parts.len() != 2 || token_parts[0].parse::<u64>().is_err() || token_parts[1].is_empty() {
            return Err(ConfigError::Invalid {
                name: "TELEGRAM_BOT_TOKEN",
                reason: "expected format 123456789:ABCdefGHI...".into(),
            });
        }

        let port = match lookup("PORT").filter(|v| !v.trim().is_empty()) {
            Some(v) => v
                .trim()
                .parse::<u16>()
                .map_err(|e| ConfigError::Invalid { name: "PORT", reason: e.to_string() })?,
            None => DEFAULT_PORT,
        };

        let data_dir = lookup("DATA_DIR")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        let forward_logs_to_alerts = match lookup("FORWARD_LOGS_TO_ALERTS") {
            Some(v) => match v.trim().to_lowercase().as_str() {
                "" | "0" | "false" | "no" => false,
                "1" | "true" | "yes" => true,
                other => {
                    return Err(ConfigError::Invalid {
                        name: "FORWARD_LOGS_TO_ALERTS",
                        reason: format!("expected a boolean, got '{other}'"),
                    });
                }
            },
            None => false,
        };

        Ok(Self {
            verify_token,
            page_access_token,
            payment_receiver,
            telegram_bot_token,
            alert_chat_id,
            gemini_api_key,
            port,
            data_dir,
            forward_logs_to_alerts,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("gamerelay.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base_env() -> HashMap<&'static str, String> {
        HashMap::from([
            ("VERIFY_TOKEN", "test123".to_string()),
            ("PAGE_ACCESS_TOKEN", "EAAtoken".to_string()),
            ("CASHAPP_RECEIVER", "$gamecashier".to_string()),
            ("TELEGRAM_BOT_TOKEN", "123456789:ABCdefGHIjklMNOpqrsTUVwxyz".to_string()),
            ("TELEGRAM_CHAT_ID", "-100123456".to_string()),
            ("GEMINI_API_KEY", "gemini-key".to_string()),
        ])
    }

    fn load(env: &HashMap<&'static str, String>) -> Result<Config, ConfigError> {
        Config::from_lookup(|name| env.get(name).cloned())
    }

    fn assert_err<T>(result: Result<T, ConfigError>) -> ConfigError {
        match result {
            Ok(_) => panic!("expected error, got Ok"),
            Err(e) => e,
        }
    }

    #[test]
    fn test_valid_config() {
        let config = load(&base_env()).expect("should load valid config");
        assert_eq!(config.verify_token, "test123");
        assert_eq!(config.alert_chat_id, -100123456);
        assert_eq!(config.port, 3000);
        assert_eq!(config.data_dir, PathBuf::from("."));
        assert!(!config.forward_logs_to_alerts);
        assert_eq!(config.database_path(), PathBuf::from("./gamerelay.db"));
    }

    #[test]
    fn test_every_required_variable_is_enforced() {
        for name in [
            "VERIFY_TOKEN",
            "PAGE_ACCESS_TOKEN",
            "CASHAPP_RECEIVER",
            "TELEGRAM_BOT_TOKEN",
            "TELEGRAM_CHAT_ID",
            "GEMINI_API_KEY",
        ] {
            let mut env = base_env();
            env.remove(name);
            let err = assert_err(load(&env));
            assert!(matches!(err, ConfigError::Missing(n) if n == name));
            assert!(err.to_string().contains(name));
        }
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let mut env = base_env();
        env.insert("GEMINI_API_KEY", "   ".to_string());
        let err = assert_err(load(&env));
        assert!(matches!(err, ConfigError::Missing("GEMINI_API_KEY")));
    }

    #[test]
    fn test_non_numeric_chat_id() {
        let mut env = base_env();
        env.insert("TELEGRAM_CHAT_ID", "@alerts".to_string());
        let err = assert_err(load(&env));
        assert!(matches!(err, ConfigError::Invalid { name: "TELEGRAM_CHAT_ID", .. }));
    }

    #[test]
    fn test_invalid_bot_token_format() {
        let mut env = base_env();
        env.insert("TELEGRAM_BOT_TOKEN", "notanumber:ABCdef".to_string());
        let err = assert_err(load(&env));
        assert!(matches!(err, ConfigError::Invalid { name: "TELEGRAM_BOT_TOKEN", .. }));
    }

    #[test]
    fn test_optional_overrides() {
        let mut env = base_env();
        env.insert("PORT", "8080".to_string());
        env.insert("DATA_DIR", "/tmp/relay".to_string());
        env.insert("FORWARD_LOGS_TO_ALERTS", "true".to_string());
        let config = load(&env).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.database_path(), PathBuf::from("/tmp/relay/gamerelay.db"));
        assert!(config.forward_logs_to_alerts);
    }

    #[test]
    fn test_invalid_port() {
        let mut env = base_env();
        env.insert("PORT", "http".to_string());
        let err = assert_err(load(&env));
        assert!(matches!(err, ConfigError::Invalid { name: "PORT", .. }));
    }
}
