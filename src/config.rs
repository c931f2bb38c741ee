//! Configuration types.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default location of the student database.
pub const DEFAULT_DB_PATH: &str = "./data/school_data.db";

/// Default directory for the rotated log file.
pub const DEFAULT_LOG_DIR: &str = "./logs";

/// Telegram caps long-poll timeouts at 50 seconds.
const MAX_POLL_TIMEOUT_SECS: u64 = 50;

/// Bot configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Telegram bot token. `None` runs the bot on the local CLI channel.
    pub telegram_token: Option<SecretString>,
    /// Path of the libSQL database file.
    pub db_path: PathBuf,
    /// Directory receiving the daily-rotated `bot.log`.
    pub log_dir: PathBuf,
    /// Long-poll timeout passed to `getUpdates`.
    pub poll_timeout_secs: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            telegram_token: None,
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
            poll_timeout_secs: 30,
        }
    }
}

impl BotConfig {
    /// Build the configuration from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let telegram_token = lookup("TELEGRAM_BOT_TOKEN")
            .or_else(|| lookup("TELEGRAM_TOKEN"))
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .map(SecretString::from);

        let db_path = lookup("STUDENT_BOT_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let log_dir = lookup("STUDENT_BOT_LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.log_dir);

        let poll_timeout_secs = match lookup("TELEGRAM_POLL_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    key: "TELEGRAM_POLL_TIMEOUT_SECS".into(),
                    message: format!("expected a number of seconds, got {raw:?}"),
                })?;
                if !(1..=MAX_POLL_TIMEOUT_SECS).contains(&secs) {
                    return Err(ConfigError::InvalidValue {
                        key: "TELEGRAM_POLL_TIMEOUT_SECS".into(),
                        message: format!("must be between 1 and {MAX_POLL_TIMEOUT_SECS}"),
                    });
                }
                secs
            }
            None => defaults.poll_timeout_secs,
        };

        Ok(Self {
            telegram_token,
            db_path,
            log_dir,
            poll_timeout_secs,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_uses_defaults() {
        let config = BotConfig::from_lookup(lookup_from(&[])).unwrap();
        assert!(config.telegram_token.is_none());
        assert_eq!(config.db_path, PathBuf::from(DEFAULT_DB_PATH));
        assert_eq!(config.log_dir, PathBuf::from(DEFAULT_LOG_DIR));
        assert_eq!(config.poll_timeout_secs, 30);
    }

    #[test]
    fn legacy_token_variable_is_accepted() {
        let config =
            BotConfig::from_lookup(lookup_from(&[("TELEGRAM_TOKEN", "123:ABC")])).unwrap();
        assert_eq!(config.telegram_token.unwrap().expose_secret(), "123:ABC");
    }

    #[test]
    fn primary_token_wins_over_legacy() {
        let config = BotConfig::from_lookup(lookup_from(&[
            ("TELEGRAM_BOT_TOKEN", "new"),
            ("TELEGRAM_TOKEN", "old"),
        ]))
        .unwrap();
        assert_eq!(config.telegram_token.unwrap().expose_secret(), "new");
    }

    #[test]
    fn blank_token_means_cli_mode() {
        let config =
            BotConfig::from_lookup(lookup_from(&[("TELEGRAM_BOT_TOKEN", "   ")])).unwrap();
        assert!(config.telegram_token.is_none());
    }

    #[test]
    fn custom_paths() {
        let config = BotConfig::from_lookup(lookup_from(&[
            ("STUDENT_BOT_DB_PATH", "/tmp/s.db"),
            ("STUDENT_BOT_LOG_DIR", "/tmp/logs"),
        ]))
        .unwrap();
        assert_eq!(config.db_path, PathBuf::from("/tmp/s.db"));
        assert_eq!(config.log_dir, PathBuf::from("/tmp/logs"));
    }

    #[test]
    fn invalid_poll_timeout_is_an_error() {
        let err = BotConfig::from_lookup(lookup_from(&[("TELEGRAM_POLL_TIMEOUT_SECS", "soon")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = BotConfig::from_lookup(lookup_from(&[("TELEGRAM_POLL_TIMEOUT_SECS", "90")]))
            .unwrap_err();
        assert!(err.to_string().contains("between 1 and 50"));
    }
}
