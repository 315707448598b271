//! Order and balance snapshots.
//!
//! These are snapshots fetched from the exchange per request; nothing here
//! is persisted.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::enums::{Direction, OrderStatus, OrderType};
use crate::decimal::parse_exchange_decimal;

// ---------------------------------------------------------------------------
// Orders fetched from the exchange
// ---------------------------------------------------------------------------

/// An order as returned by `OpenOrders` or `ClosedOrders`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenOrder {
    /// Exchange transaction id.
    pub txid: String,
    pub direction: Direction,
    /// Pair alt-name from the order description (e.g. `"ETHEUR"`).
    pub pair: String,
    pub order_type: OrderType,
    /// Limit price; zero for market orders.
    pub price: Decimal,
    /// Ordered volume in base units.
    pub volume: Decimal,
    /// Volume already filled.
    pub executed_volume: Decimal,
    pub status: OrderStatus,
    /// Human-readable description (`"sell 0.5 ETHEUR @ limit 300"`).
    pub description: String,
    /// Close time in unix seconds, for closed orders.
    pub close_time: Option<f64>,
}

impl OpenOrder {
    /// Volume still waiting to be filled.
    pub fn remaining_volume(&self) -> Decimal {
        (self.volume - self.executed_volume).max(Decimal::ZERO)
    }
}

/// Order fields recovered from a description string.
///
/// Layout: `[type, volume, pair, "@", "limit"|"market", price]`. The string
/// is display text on the exchange side, so this is only a fallback when the
/// structured fields are missing.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDescription {
    pub direction: Direction,
    pub volume: Decimal,
    pub pair: String,
    pub order_type: OrderType,
    pub price: Option<Decimal>,
}

impl OrderDescription {
    pub fn parse(text: &str) -> Option<Self> {
        let tokens: Vec<&str> = text.split_whitespace().collect();
        if tokens.len() < 5 || tokens[3] != "@" {
            return None;
        }
        let direction = tokens[0].parse().ok()?;
        let volume = parse_exchange_decimal(tokens[1]).ok()?;
        let order_type = OrderType::from_kraken(tokens[4]);
        let price = match order_type {
            OrderType::Limit => Some(parse_exchange_decimal(tokens.get(5)?).ok()?),
            OrderType::Market => None,
            OrderType::Other => return None,
        };
        Some(Self {
            direction,
            volume,
            pair: tokens[2].to_string(),
            order_type,
            price,
        })
    }
}

// ---------------------------------------------------------------------------
// Order request (bot → exchange)
// ---------------------------------------------------------------------------

/// An order the bot is about to submit via `AddOrder`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub direction: Direction,
    /// Exchange pair code (e.g. `"XETHZEUR"`).
    pub pair: String,
    pub order_type: OrderType,
    /// Limit price; `None` for market orders.
    pub price: Option<Decimal>,
    /// Volume, already cut to 8 fractional digits.
    pub volume: Decimal,
}

// ---------------------------------------------------------------------------
// Balances
// ---------------------------------------------------------------------------

/// Wallet balance snapshot keyed by exchange asset code (`"XXBT"`, `"ZEUR"`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Balances(HashMap<String, Decimal>);

impl Balances {
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance of `code`, zero if the wallet never held it.
    pub fn get(&self, code: &str) -> Decimal {
        self.0.get(code).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn insert(&mut self, code: impl Into<String>, amount: Decimal) {
        self.0.insert(code.into(), amount);
    }

    /// Entries with a nonzero amount, sorted by asset code.
    pub fn nonzero(&self) -> Vec<(&str, Decimal)> {
        let mut entries: Vec<(&str, Decimal)> = self
            .0
            .iter()
            .filter(|(_, amount)| !amount.is_zero())
            .map(|(code, amount)| (code.as_str(), *amount))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        entries
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Decimal)> for Balances {
    fn from_iter<I: IntoIterator<Item = (String, Decimal)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn parse_limit_description() {
        let d = OrderDescription::parse("sell 0.50000000 ETHEUR @ limit 300.0").unwrap();
        assert_eq!(d.direction, Direction::Sell);
        assert_eq!(d.volume, dec!(0.5));
        assert_eq!(d.pair, "ETHEUR");
        assert_eq!(d.order_type, OrderType::Limit);
        assert_eq!(d.price, Some(dec!(300)));
    }

    #[test]
    fn parse_market_description() {
        let d = OrderDescription::parse("buy 1.25 XBTEUR @ market").unwrap();
        assert_eq!(d.direction, Direction::Buy);
        assert_eq!(d.order_type, OrderType::Market);
        assert_eq!(d.price, None);
    }

    #[test]
    fn reject_unknown_description() {
        assert!(OrderDescription::parse("sell 1 XBTEUR @ stop loss 100").is_none());
        assert!(OrderDescription::parse("garbage").is_none());
        assert!(OrderDescription::parse("buy x XBTEUR @ limit 1").is_none());
    }

    #[test]
    fn remaining_volume_never_negative() {
        let order = OpenOrder {
            txid: "O1".into(),
            direction: Direction::Buy,
            pair: "XBTEUR".into(),
            order_type: OrderType::Limit,
            price: dec!(100),
            volume: dec!(1),
            executed_volume: dec!(1.5),
            status: OrderStatus::Open,
            description: String::new(),
            close_time: None,
        };
        assert_eq!(order.remaining_volume(), Decimal::ZERO);
    }

    #[test]
    fn balances_default_to_zero() {
        let mut b = Balances::new();
        b.insert("XETH", dec!(2.5));
        b.insert("KFEE", Decimal::ZERO);
        assert_eq!(b.get("XETH"), dec!(2.5));
        assert_eq!(b.get("XXBT"), Decimal::ZERO);
        assert_eq!(b.nonzero(), vec![("XETH", dec!(2.5))]);
    }
}
