//! Decimal helpers shared by the workflow and the message formatters.
//!
//! Kraken accepts volumes with up to 8 fractional digits. Volumes are kept
//! at that precision for submission and shown without trailing zeros.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::KtbError;

/// Fractional digits used for order volumes.
pub const VOLUME_SCALE: u32 = 8;

/// Unsigned number with at most one `.` or `,` separator.
static DECIMAL_INPUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\d+([.,]\d+)?|[.,]\d+)$").expect("decimal input pattern is valid")
});

/// Plain decimal token inside exchange text (`"0.50000000"`, `"300"`).
static DECIMAL_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+(\.\d+)?$").expect("decimal token pattern is valid"));

/// Parse a number typed by the user.
///
/// Signs, exponents, thousands separators and a second separator are
/// rejected. A comma is accepted as decimal separator.
pub fn parse_decimal_input(text: &str) -> Option<Decimal> {
    let text = text.trim();
    if !DECIMAL_INPUT.is_match(text) {
        return None;
    }
    let normalized = text.replace(',', ".");
    let normalized = if normalized.starts_with('.') {
        format!("0{normalized}")
    } else {
        normalized
    };
    Decimal::from_str(&normalized).ok()
}

/// Like [`parse_decimal_input`] but only strictly positive values.
pub fn parse_positive_input(text: &str) -> Option<Decimal> {
    parse_decimal_input(text).filter(|d| d.is_sign_positive() && !d.is_zero())
}

/// Parse a decimal string returned by the exchange.
pub fn parse_exchange_decimal(text: &str) -> Result<Decimal, KtbError> {
    Decimal::from_str(text.trim())
        .map_err(|e| KtbError::Parse(format!("invalid decimal `{text}`: {e}")))
}

/// Cut a volume to [`VOLUME_SCALE`] digits, toward zero.
pub fn round_volume(volume: Decimal) -> Decimal {
    volume.round_dp_with_strategy(VOLUME_SCALE, RoundingStrategy::ToZero)
}

/// Volume as sent to the exchange: always exactly 8 fractional digits.
pub fn format_volume(volume: Decimal) -> String {
    let mut fixed = round_volume(volume);
    fixed.rescale(VOLUME_SCALE);
    fixed.to_string()
}

/// Decimal without trailing zeros (`2.50000000` → `2.5`, `2.0` → `2`).
pub fn trim_zeros(value: Decimal) -> String {
    value.normalize().to_string()
}

/// Trim every plain number inside a space-separated text.
///
/// Used for exchange order descriptions such as
/// `"sell 0.50000000 ETHEUR @ limit 300.00000"`.
pub fn trim_zeros_in_text(text: &str) -> String {
    text.split(' ')
        .map(|token| {
            if DECIMAL_TOKEN.is_match(token) {
                Decimal::from_str(token)
                    .map(trim_zeros)
                    .unwrap_or_else(|_| token.to_string())
            } else {
                token.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Amount with exactly two fractional digits, for fiat values.
pub fn format_fiat(value: Decimal) -> String {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded.to_string()
}
