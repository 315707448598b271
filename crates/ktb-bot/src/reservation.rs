//! Funds not yet committed to open orders.
//!
//! BUY of an asset against quote `Q`:
//! `balance(Q) − Σ remaining × price` over open BUY orders quoted in `Q`.
//!
//! SELL of asset `A`:
//! `balance(A) − Σ remaining` over open SELL orders whose base is `A`.

use ktb_core::{AssetDirectory, Balances, Direction, OpenOrder, OrderDescription};
use rust_decimal::Decimal;
use tracing::warn;

/// Amount available for a new order. Never negative.
///
/// For BUY the result is in quote units, for SELL in units of `asset`.
/// `asset` and `quote` are display names (`"ETH"`, `"EUR"`).
pub fn available(
    asset: &str,
    quote: &str,
    direction: Direction,
    balances: &Balances,
    open_orders: &[OpenOrder],
    directory: &AssetDirectory,
) -> Decimal {
    let funded = match direction {
        Direction::Buy => quote,
        Direction::Sell => asset,
    };
    let balance = balances.get(directory.code(funded).unwrap_or(funded));

    let reserved: Decimal = open_orders
        .iter()
        .filter(|o| o.direction == direction)
        .filter(|o| match direction {
            Direction::Buy => is_quoted_in(directory, o, quote),
            Direction::Sell => has_base(directory, o, asset, quote),
        })
        .map(|o| match direction {
            Direction::Buy => o.remaining_volume().saturating_mul(o.price),
            Direction::Sell => o.remaining_volume(),
        })
        .sum();

    let free = balance - reserved;
    if free < Decimal::ZERO {
        warn!(
            "[trade] {funded}: open {direction} orders reserve {reserved}, more than the balance {balance}"
        );
        return Decimal::ZERO;
    }
    free
}

/// Pair token of an order: the structured field, or the one in its description.
fn pair_tokens(order: &OpenOrder) -> impl Iterator<Item = String> + '_ {
    std::iter::once(order.pair.clone()).chain(
        OrderDescription::parse(&order.description)
            .map(|d| d.pair)
            .filter(|p| *p != order.pair),
    )
}

fn is_quoted_in(directory: &AssetDirectory, order: &OpenOrder, quote: &str) -> bool {
    pair_tokens(order).any(|p| directory.is_quoted_in(&p, quote))
}

fn has_base(directory: &AssetDirectory, order: &OpenOrder, asset: &str, quote: &str) -> bool {
    let asset_code = directory.code(asset).unwrap_or(asset);
    pair_tokens(order).any(|p| match directory.pair(&p) {
        Some(pair) => pair.base == asset_code,
        None => directory
            .base_display_of(&p, quote)
            .is_some_and(|base| base.eq_ignore_ascii_case(asset)),
    })
}
