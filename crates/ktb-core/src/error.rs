//! Typed error definitions for the Kraken Telegram bot.
//!
//! Provides [`KtbError`] for domain-specific errors that are more informative
//! than plain `anyhow::Error` strings. All variants implement `std::error::Error`
//! via `thiserror`, so they integrate seamlessly with `anyhow::Result`.

use thiserror::Error;

/// Domain-specific errors for the bot.
#[derive(Debug, Error)]
pub enum KtbError {
    /// Configuration parsing or validation error.
    #[error("config error: {0}")]
    Config(String),

    /// API key file missing, unreadable, or malformed.
    #[error("credentials error: {0}")]
    Credentials(String),

    /// Exchange payload or user input parsing error.
    #[error("parse error: {0}")]
    Parse(String),

    /// Rejected runtime settings change (unknown key, wrong value type, ...).
    #[error("settings error: {0}")]
    Settings(String),

    /// Filesystem error while reading or writing bot files.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
