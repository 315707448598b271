//! # ktb-bot
//!
//! Chat-facing side of the Kraken Telegram bot.
//!
//! ```text
//! telegram poll loop ──► dispatcher ──► auth gate
//!                                    ├─► commands  (balance, orders, price, ...)
//!                                    └─► workflow  (/trade conversation, sell-all)
//! monitor timer ──────► OrderMonitor ──► ChatSink
//! update timer ───────► UpdateChecker ─► ChatSink
//! ```
//!
//! Every handler receives the shared [`BotContext`]; nothing here keeps
//! global state.

pub mod auth;
pub mod chat;
pub mod commands;
pub mod context;
pub mod dispatcher;
pub mod format;
pub mod lifecycle;
pub mod monitor;
pub mod reservation;
pub mod sell_all;
pub mod telegram;
pub mod updater;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testing;

pub use chat::{ChatSink, Keyboard};
pub use context::BotContext;
pub use lifecycle::{Lifecycle, RESTART_EXIT_CODE};
pub use monitor::OrderMonitor;
