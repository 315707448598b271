//! # ktb-kraken
//!
//! Kraken REST client used by the bot.
//!
//! The client is split in two layers:
//!
//! - a [`Transport`] performs exactly one raw request and classifies what
//!   went wrong ([`TransportError`]);
//! - [`KrakenClient`] wraps a transport with the retry policy, turns the
//!   `{error, result}` envelope into `Result<Value, ApiError>` and exposes
//!   typed helpers for the endpoints the bot needs.
//!
//! ## Endpoints
//!
//! | Method        | Access  | Helper                         |
//! |---------------|---------|--------------------------------|
//! | `Balance`     | private | [`KrakenClient::balance`]      |
//! | `OpenOrders`  | private | [`KrakenClient::open_orders`]  |
//! | `ClosedOrders`| private | [`KrakenClient::closed_orders`]|
//! | `AddOrder`    | private | [`KrakenClient::add_order`]    |
//! | `CancelOrder` | private | [`KrakenClient::cancel_order`] |
//! | `Ticker`      | public  | [`KrakenClient::ticker`]       |
//! | `Assets`      | public  | [`KrakenClient::load_directory`] |
//! | `AssetPairs`  | public  | [`KrakenClient::load_directory`] |

pub mod auth;
pub mod client;
pub mod config;
pub mod endpoints;
pub mod error;
pub mod rest;

use async_trait::async_trait;
use serde::Deserialize;

pub use client::{KrakenClient, RetryPolicy};
pub use config::{Credentials, KrakenConfig};
pub use endpoints::AddOrderOutcome;
pub use error::{ApiError, TransportError};
pub use rest::KrakenRest;

/// Request parameters in submission order.
pub type Params = Vec<(String, String)>;

/// Raw Kraken response envelope.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Reply {
    #[serde(default)]
    pub error: Vec<String>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
}

impl Reply {
    pub fn ok(result: serde_json::Value) -> Self {
        Self {
            error: Vec::new(),
            result: Some(result),
        }
    }

    pub fn err(messages: &[&str]) -> Self {
        Self {
            error: messages.iter().map(|m| m.to_string()).collect(),
            result: None,
        }
    }

    /// An exchange-reported error list wins over any result.
    pub fn into_result(self) -> Result<serde_json::Value, ApiError> {
        if self.error.is_empty() {
            Ok(self.result.unwrap_or(serde_json::Value::Null))
        } else {
            Err(ApiError::new(self.error))
        }
    }
}

/// One raw attempt against the exchange.
///
/// Implementations never retry; [`KrakenClient`] owns that policy.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn query(
        &self,
        method: &str,
        params: &[(String, String)],
        private: bool,
    ) -> Result<Reply, TransportError>;
}
