//! Mapping between Kraken asset codes and display names.
//!
//! Kraken prefixes many legacy asset codes (`XXBT`, `XETH`, `ZEUR`) while
//! users type the alt-names (`XBT`, `ETH`, `EUR`). The [`AssetDirectory`]
//! is built once at startup from the `Assets` and `AssetPairs` responses and
//! answers lookups in both directions.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::decimal::parse_exchange_decimal;

/// A tradable pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairInfo {
    /// Exchange pair code (`"XETHZEUR"`).
    pub name: String,
    /// Short name used in order descriptions (`"ETHEUR"`).
    pub altname: String,
    /// Base asset code.
    pub base: String,
    /// Quote asset code.
    pub quote: String,
    /// Minimum order volume in base units, when the exchange reports one.
    pub order_min: Option<Decimal>,
}

/// Bidirectional asset/pair directory.
#[derive(Debug, Clone, Default)]
pub struct AssetDirectory {
    /// Code → display (`XXBT` → `XBT`).
    code_to_display: HashMap<String, String>,
    /// Uppercased display → code (`XBT` → `XXBT`).
    display_to_code: HashMap<String, String>,
    /// Pair code → pair.
    pairs: HashMap<String, PairInfo>,
    /// Alt-name → pair code.
    altnames: HashMap<String, String>,
}

impl AssetDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an asset.
    pub fn add_asset(&mut self, code: &str, display: &str) {
        self.code_to_display
            .insert(code.to_string(), display.to_string());
        self.display_to_code
            .insert(display.to_ascii_uppercase(), code.to_string());
    }

    /// Register a pair.
    pub fn add_pair(&mut self, pair: PairInfo) {
        self.altnames
            .insert(pair.altname.to_ascii_uppercase(), pair.name.clone());
        self.pairs.insert(pair.name.clone(), pair);
    }

    /// Load assets from an `Assets` result object.
    ///
    /// Each key is an asset code whose value carries an `"altname"` field.
    pub fn load_assets(&mut self, result: &serde_json::Value) {
        let Some(assets) = result.as_object() else {
            return;
        };
        for (code, info) in assets {
            let display = info
                .get("altname")
                .and_then(|a| a.as_str())
                .unwrap_or(code);
            self.add_asset(code, display);
        }
    }

    /// Load pairs from an `AssetPairs` result object.
    ///
    /// Dark-pool duplicates (`.d` suffix) are skipped.
    pub fn load_asset_pairs(&mut self, result: &serde_json::Value) {
        let Some(pairs) = result.as_object() else {
            return;
        };
        for (name, info) in pairs {
            if name.ends_with(".d") {
                continue;
            }
            let Some(base) = info.get("base").and_then(|b| b.as_str()) else {
                continue;
            };
            let Some(quote) = info.get("quote").and_then(|q| q.as_str()) else {
                continue;
            };
            let altname = info
                .get("altname")
                .and_then(|a| a.as_str())
                .unwrap_or(name);
            let order_min = info
                .get("ordermin")
                .and_then(|m| m.as_str())
                .and_then(|m| parse_exchange_decimal(m).ok());
            self.add_pair(PairInfo {
                name: name.clone(),
                altname: altname.to_string(),
                base: base.to_string(),
                quote: quote.to_string(),
                order_min,
            });
        }
    }

    /// Display name for an asset code; the code itself when unknown.
    pub fn display<'a>(&'a self, code: &'a str) -> &'a str {
        self.code_to_display
            .get(code)
            .map(|s| s.as_str())
            .unwrap_or(code)
    }

    /// Asset code for a display name (case-insensitive).
    pub fn code(&self, display: &str) -> Option<&str> {
        self.display_to_code
            .get(&display.to_ascii_uppercase())
            .map(|s| s.as_str())
    }

    /// Pair trading `base_display` against `quote_display`.
    pub fn pair_for(&self, base_display: &str, quote_display: &str) -> Option<&PairInfo> {
        let base = self.code(base_display)?;
        let quote = self.code(quote_display)?;
        self.pairs
            .values()
            .find(|p| p.base == base && p.quote == quote)
    }

    /// Look up a pair by exchange code or alt-name.
    pub fn pair(&self, name: &str) -> Option<&PairInfo> {
        self.pairs.get(name).or_else(|| {
            self.altnames
                .get(&name.to_ascii_uppercase())
                .and_then(|code| self.pairs.get(code))
        })
    }

    /// Base asset display name of a pair identified by code or alt-name.
    ///
    /// Falls back to stripping the quote display name from the end of the
    /// token when the pair is not in the directory.
    pub fn base_display_of(&self, pair_name: &str, quote_display: &str) -> Option<String> {
        if let Some(pair) = self.pair(pair_name) {
            return Some(self.display(&pair.base).to_string());
        }
        let upper = pair_name.to_ascii_uppercase();
        let quote = quote_display.to_ascii_uppercase();
        let stripped = upper.strip_suffix(&quote)?;
        if stripped.is_empty() {
            return None;
        }
        Some(self.display(stripped).to_string())
    }

    /// True when `pair_name` trades against `quote_display`.
    pub fn is_quoted_in(&self, pair_name: &str, quote_display: &str) -> bool {
        match (self.pair(pair_name), self.code(quote_display)) {
            (Some(pair), Some(quote)) => pair.quote == quote,
            _ => pair_name
                .to_ascii_uppercase()
                .ends_with(&quote_display.to_ascii_uppercase()),
        }
    }

    /// Minimum order volume for `base_display` against `quote_display`.
    pub fn order_min(&self, base_display: &str, quote_display: &str) -> Option<Decimal> {
        self.pair_for(base_display, quote_display)
            .and_then(|p| p.order_min)
    }

    pub fn asset_count(&self) -> usize {
        self.code_to_display.len()
    }

    pub fn pair_count(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.code_to_display.is_empty()
    }
}
