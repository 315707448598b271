//! Message text helpers.

use ktb_core::OpenOrder;
use ktb_core::decimal::trim_zeros_in_text;
use ktb_kraken::ApiError;

/// Turn a Kraken error string into a chat line.
///
/// `"EOrder:Insufficient funds"` becomes `"❌ Order error: Insufficient funds"`.
pub fn beautify_error(raw: &str) -> String {
    match raw.split_once(':') {
        Some((category, detail)) if is_error_category(category) => {
            format!("❌ {} error: {}", &category[1..], detail.trim())
        }
        _ => format!("❌ Error: {raw}"),
    }
}

fn is_error_category(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next() == Some('E')
        && chars.next().is_some_and(|c| c.is_ascii_uppercase())
        && s.chars().all(|c| c.is_ascii_alphabetic())
}

/// First error of a list, beautified.
pub fn api_error(e: &ApiError) -> String {
    beautify_error(e.first())
}

/// `"{txid}\n{description}"` with numbers trimmed.
pub fn order_line(order: &OpenOrder) -> String {
    format!("{}\n{}", order.txid, trim_zeros_in_text(&order.description))
}
