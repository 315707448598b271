//! Client configuration and API credentials.

use std::fmt;
use std::path::Path;

use ktb_core::config::BotConfig;
use ktb_core::error::KtbError;
use serde::Deserialize;

use crate::client::RetryPolicy;

/// Settings for the REST client.
#[derive(Debug, Clone, Deserialize)]
pub struct KrakenConfig {
    /// REST base URL.
    #[serde(default = "default_rest_url")]
    pub rest_url: String,

    /// Retry transient transport errors.
    #[serde(default = "default_true")]
    pub retry_on_error: bool,

    /// Extra attempts after the first one.
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl KrakenConfig {
    pub fn from_bot_config(config: &BotConfig) -> Self {
        Self {
            rest_url: config.kraken_rest_url.clone(),
            retry_on_error: config.retry_on_error,
            retry_count: config.retry_count,
            timeout_secs: default_timeout(),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            enabled: self.retry_on_error,
            extra_attempts: self.retry_count,
        }
    }
}

impl Default for KrakenConfig {
    fn default() -> Self {
        Self {
            rest_url: default_rest_url(),
            retry_on_error: true,
            retry_count: default_retry_count(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_rest_url() -> String {
    "https://api.kraken.com".into()
}

fn default_true() -> bool {
    true
}

fn default_retry_count() -> u32 {
    2
}

fn default_timeout() -> u64 {
    30
}

/// API key pair read from the key file.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub key: String,
    pub secret: String,
}

impl Credentials {
    /// Parse key file contents: first line key, second line secret.
    pub fn parse(contents: &str) -> Result<Self, KtbError> {
        let mut lines = contents.lines().map(str::trim).filter(|l| !l.is_empty());
        let key = lines
            .next()
            .ok_or_else(|| KtbError::Credentials("key file is empty".into()))?;
        let secret = lines
            .next()
            .ok_or_else(|| KtbError::Credentials("secret missing on second line".into()))?;
        Ok(Self {
            key: key.to_string(),
            secret: secret.to_string(),
        })
    }

    pub fn load(path: &Path) -> Result<Self, KtbError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            KtbError::Credentials(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::parse(&contents)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("key", &self.key)
            .field("secret", &"***")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_two_lines() {
        let c = Credentials::parse("  pubkey\nc2VjcmV0\n").unwrap();
        assert_eq!(c.key, "pubkey");
        assert_eq!(c.secret, "c2VjcmV0");
        assert!(!format!("{c:?}").contains("c2VjcmV0"));
    }

    #[test]
    fn rejects_missing_secret() {
        assert!(Credentials::parse("pubkey\n").is_err());
        assert!(Credentials::parse("").is_err());
    }

    #[test]
    fn defaults_follow_bot_config() {
        let mut bot = BotConfig::new("token", 1);
        bot.retry_on_error = false;
        bot.retry_count = 5;
        let cfg = KrakenConfig::from_bot_config(&bot);
        assert_eq!(cfg.rest_url, "https://api.kraken.com");
        assert!(!cfg.retry_policy().enabled);
        assert_eq!(cfg.retry_policy().extra_attempts, 5);
    }
}
