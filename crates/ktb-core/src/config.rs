//! Configuration for the bot.
//!
//! All settings live in a single JSON file that is read at startup and
//! rewritten when the owner changes a value through `/settings` or when
//! `/restart` adopts a pending update ETag. Only `bot_token` and `user_id` are
//! required; everything else has a default.
//!
//! # Example config
//!
//! ```json
//! {
//!   "bot_token": "123456:ABC-DEF",
//!   "user_id": 11223344,
//!   "kraken_key_file": "kraken.key",
//!   "trade_to_currency": "EUR",
//!   "trade_assets": ["XBT", "ETH", "XMR"],
//!   "retry_count": 2,
//!   "check_trade": true,
//!   "check_trade_time": 60
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Context;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::KtbError;

/// Keys that cannot be changed from the chat.
const PROTECTED_KEYS: &[&str] = &["bot_token"];

/// Top-level bot config, deserialized from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotConfig {
    /// Telegram bot API token.
    pub bot_token: String,

    /// Chat id of the single user allowed to talk to the bot.
    pub user_id: i64,

    // -- Exchange --
    /// File holding the Kraken API key (line 1) and secret (line 2).
    #[serde(default = "default_key_file")]
    pub kraken_key_file: String,

    /// Kraken REST base URL.
    #[serde(default = "default_rest_url")]
    pub kraken_rest_url: String,

    /// Display code of the quote currency every trade is priced in.
    #[serde(default = "default_quote")]
    pub trade_to_currency: String,

    /// Display codes offered as buttons in `/trade` and used by `/price`.
    #[serde(default = "default_assets")]
    pub trade_assets: Vec<String>,

    /// Per-asset minimum order volume, overriding the exchange `ordermin`.
    #[serde(default)]
    pub min_order_sizes: BTreeMap<String, Decimal>,

    // -- Remote call policy --
    /// Retry failed transport calls.
    #[serde(default = "default_true")]
    pub retry_on_error: bool,

    /// Additional attempts after the first failed one.
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    // -- Order monitoring --
    /// Enroll submitted orders and notify when they close.
    #[serde(default = "default_true")]
    pub check_trade: bool,

    /// Seconds between closed-order polls.
    #[serde(default = "default_check_trade_time")]
    pub check_trade_time: u64,

    /// Forward internal errors to the owner chat.
    #[serde(default = "default_true")]
    pub send_error: bool,

    // -- Update check --
    /// Reference file checked with `If-None-Match`.
    #[serde(default)]
    pub update_url: Option<String>,

    /// ETag of the currently deployed version.
    #[serde(default)]
    pub update_hash: Option<String>,

    /// Periodically check `update_url`.
    #[serde(default = "default_true")]
    pub update_check: bool,

    /// Seconds between update checks.
    #[serde(default = "default_update_check_time")]
    pub update_check_time: u64,

    // -- Logging --
    /// Default tracing filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Also write logs to daily-rotated files in `log_dir`.
    #[serde(default)]
    pub log_to_file: bool,

    /// Directory for log files.
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

impl BotConfig {
    /// Minimal config with defaults for every optional key.
    pub fn new(bot_token: impl Into<String>, user_id: i64) -> Self {
        Self {
            bot_token: bot_token.into(),
            user_id,
            kraken_key_file: default_key_file(),
            kraken_rest_url: default_rest_url(),
            trade_to_currency: default_quote(),
            trade_assets: default_assets(),
            min_order_sizes: BTreeMap::new(),
            retry_on_error: true,
            retry_count: default_retry_count(),
            check_trade: true,
            check_trade_time: default_check_trade_time(),
            send_error: true,
            update_url: None,
            update_hash: None,
            update_check: true,
            update_check_time: default_update_check_time(),
            log_level: default_log_level(),
            log_to_file: false,
            log_dir: default_log_dir(),
        }
    }

    /// Reject configs the bot cannot run with.
    pub fn validate(&self) -> Result<(), KtbError> {
        if self.bot_token.trim().is_empty() {
            return Err(KtbError::Config("bot_token is empty".into()));
        }
        if self.user_id == 0 {
            return Err(KtbError::Config("user_id is not set".into()));
        }
        if self.trade_to_currency.trim().is_empty() {
            return Err(KtbError::Config("trade_to_currency is empty".into()));
        }
        if self.check_trade_time == 0 {
            return Err(KtbError::Config("check_trade_time must be positive".into()));
        }
        if self.update_check_time == 0 {
            return Err(KtbError::Config("update_check_time must be positive".into()));
        }
        Ok(())
    }

    /// Change a single setting from its textual chat representation.
    ///
    /// The value is parsed into the JSON type the key currently has, so
    /// `retry_count` only accepts integers and `check_trade` only booleans.
    /// Lists take comma-separated items. Optional strings accept `none`.
    pub fn set_value(&mut self, key: &str, raw: &str) -> Result<(), KtbError> {
        if PROTECTED_KEYS.contains(&key) {
            return Err(KtbError::Settings(format!(
                "`{key}` can only be changed in the config file"
            )));
        }

        let mut doc = serde_json::to_value(&*self)
            .map_err(|e| KtbError::Settings(format!("cannot serialize config: {e}")))?;
        let Some(fields) = doc.as_object_mut() else {
            return Err(KtbError::Settings("config is not a JSON object".into()));
        };
        let current = fields
            .get(key)
            .ok_or_else(|| KtbError::Settings(format!("unknown setting `{key}`")))?;

        let updated = coerce_setting(key, current, raw.trim())?;
        fields.insert(key.to_string(), updated);

        let candidate: BotConfig = serde_json::from_value(doc)
            .map_err(|e| KtbError::Settings(format!("invalid value for `{key}`: {e}")))?;
        candidate.validate()?;
        *self = candidate;
        Ok(())
    }

    /// `(key, value)` pairs for display, with the bot token masked.
    pub fn display_entries(&self) -> Vec<(String, String)> {
        let Ok(Value::Object(fields)) = serde_json::to_value(self) else {
            return Vec::new();
        };
        fields
            .into_iter()
            .map(|(key, value)| {
                let shown = if PROTECTED_KEYS.contains(&key.as_str()) {
                    "***".to_string()
                } else {
                    match value {
                        Value::String(s) => s,
                        Value::Null => "none".to_string(),
                        other => other.to_string(),
                    }
                };
                (key, shown)
            })
            .collect()
    }
}

/// Parse `raw` into the JSON type of `current`.
fn coerce_setting(key: &str, current: &Value, raw: &str) -> Result<Value, KtbError> {
    let type_error = |expected: &str| {
        KtbError::Settings(format!("`{key}` expects {expected}, got `{raw}`"))
    };

    match current {
        Value::Bool(_) => match raw.to_ascii_lowercase().as_str() {
            "true" | "on" | "yes" => Ok(Value::Bool(true)),
            "false" | "off" | "no" => Ok(Value::Bool(false)),
            _ => Err(type_error("true or false")),
        },
        Value::Number(n) if n.is_i64() => raw
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| type_error("an integer")),
        Value::Number(n) if n.is_u64() => raw
            .parse::<u64>()
            .map(Value::from)
            .map_err(|_| type_error("a non-negative integer")),
        Value::Number(_) => raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| type_error("a number")),
        Value::String(_) => Ok(Value::String(raw.to_string())),
        Value::Null => {
            if raw.eq_ignore_ascii_case("none") || raw.is_empty() {
                Ok(Value::Null)
            } else {
                Ok(Value::String(raw.to_string()))
            }
        }
        Value::Array(_) => Ok(Value::Array(
            raw.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| Value::String(s.to_string()))
                .collect(),
        )),
        Value::Object(_) => Err(KtbError::Settings(format!(
            "`{key}` is a table and can only be changed in the config file"
        ))),
    }
}

fn default_key_file() -> String {
    "kraken.key".into()
}

fn default_rest_url() -> String {
    "https://api.kraken.com".into()
}

fn default_quote() -> String {
    "EUR".into()
}

fn default_assets() -> Vec<String> {
    vec!["XBT".into(), "ETH".into(), "XMR".into()]
}

fn default_true() -> bool {
    true
}

fn default_retry_count() -> u32 {
    2
}

fn default_check_trade_time() -> u64 {
    60
}

fn default_update_check_time() -> u64 {
    86_400
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_dir() -> String {
    "logs".into()
}

/// Load and parse a JSON config file.
pub fn load_config(path: &Path) -> anyhow::Result<BotConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read config {}", path.display()))?;
    let config: BotConfig = serde_json::from_str(&content)
        .with_context(|| format!("cannot parse config {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

/// Write the config back as pretty-printed JSON.
pub fn save_config(path: &Path, config: &BotConfig) -> anyhow::Result<()> {
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content + "\n")
        .with_context(|| format!("cannot write config {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn minimal_config_gets_defaults() {
        let cfg: BotConfig =
            serde_json::from_str(r#"{"bot_token": "t", "user_id": 42}"#).unwrap();
        assert_eq!(cfg, BotConfig::new("t", 42));
        assert_eq!(cfg.retry_count, 2);
        assert_eq!(cfg.trade_assets, vec!["XBT", "ETH", "XMR"]);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn min_order_sizes_accept_strings_and_numbers() {
        let cfg: BotConfig = serde_json::from_str(
            r#"{"bot_token": "t", "user_id": 1, "min_order_sizes": {"ETH": "0.02", "XBT": 0.002}}"#,
        )
        .unwrap();
        assert_eq!(cfg.min_order_sizes["ETH"], dec!(0.02));
        assert_eq!(cfg.min_order_sizes["XBT"], dec!(0.002));
    }

    #[test]
    fn validate_rejects_missing_owner() {
        let cfg = BotConfig::new("t", 0);
        assert!(matches!(cfg.validate(), Err(KtbError::Config(_))));
    }

    #[test]
    fn set_value_respects_types() {
        let mut cfg = BotConfig::new("t", 1);
        cfg.set_value("retry_count", "5").unwrap();
        assert_eq!(cfg.retry_count, 5);

        cfg.set_value("check_trade", "off").unwrap();
        assert!(!cfg.check_trade);

        cfg.set_value("trade_assets", "XBT, LTC").unwrap();
        assert_eq!(cfg.trade_assets, vec!["XBT", "LTC"]);

        cfg.set_value("update_url", "https://example.org/bot").unwrap();
        assert_eq!(cfg.update_url.as_deref(), Some("https://example.org/bot"));
        cfg.set_value("update_url", "none").unwrap();
        assert_eq!(cfg.update_url, None);

        assert!(cfg.set_value("retry_count", "-1").is_err());
        assert!(cfg.set_value("check_trade", "maybe").is_err());
        assert_eq!(cfg.retry_count, 5);
    }

    #[test]
    fn set_value_rejects_unknown_protected_and_invalid() {
        let mut cfg = BotConfig::new("t", 1);
        assert!(cfg.set_value("no_such_key", "1").is_err());
        assert!(cfg.set_value("bot_token", "x").is_err());
        assert!(cfg.set_value("min_order_sizes", "1").is_err());
        // passes the type check but fails validation
        assert!(cfg.set_value("check_trade_time", "0").is_err());
        assert_eq!(cfg.check_trade_time, 60);
    }

    #[test]
    fn display_masks_token() {
        let cfg = BotConfig::new("secret-token", 7);
        let entries = cfg.display_entries();
        let token = entries.iter().find(|(k, _)| k == "bot_token").unwrap();
        assert_eq!(token.1, "***");
        let hash = entries.iter().find(|(k, _)| k == "update_hash").unwrap();
        assert_eq!(hash.1, "none");
    }

    #[test]
    fn save_then_load() {
        let dir = std::env::temp_dir().join(format!("ktb-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");

        let mut cfg = BotConfig::new("t", 99);
        cfg.update_hash = Some("\"abc\"".into());
        save_config(&path, &cfg).unwrap();
        assert_eq!(load_config(&path).unwrap(), cfg);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
