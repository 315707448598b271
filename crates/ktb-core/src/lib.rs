//! # ktb-core
//!
//! Core crate for the Kraken Telegram bot, providing:
//!
//! - **Types** (`types`): enums, orders, balances, the asset directory
//! - **Configuration** (`config`): JSON config load/save and runtime edits
//! - **Error types** (`error`): domain-specific `KtbError` via thiserror
//! - **Decimals** (`decimal`): input validation, 8-digit volumes, zero trimming
//! - **Time utilities** (`time_util`): unix timestamps for nonces and windows
//! - **Logging** (`logging`): tracing-based structured logging

pub mod config;
pub mod decimal;
pub mod error;
pub mod logging;
pub mod time_util;
pub mod types;

// Re-export types at crate root for convenience.
pub use types::*;
