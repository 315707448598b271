//! Chat boundary: the trait the bot talks through and the keyboards it shows.

use anyhow::Result;
use async_trait::async_trait;

/// Keyboard attached to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Keyboard {
    /// Leave whatever keyboard the client shows.
    None,
    /// Reply keyboard; taps arrive back as the label text.
    Reply(Vec<Vec<String>>),
    /// Hide the reply keyboard.
    Remove,
}

/// Outbound side of the chat transport.
#[async_trait]
pub trait ChatSink: Send + Sync {
    async fn send(&self, chat_id: i64, text: &str, keyboard: Keyboard) -> Result<()>;
}

/// Button labels used by the trade conversation.
pub mod labels {
    pub const BUY: &str = "BUY";
    pub const SELL: &str = "SELL";
    pub const SELL_ALL: &str = "SELL ALL";
    pub const MARKET_PRICE: &str = "MARKET PRICE";
    pub const VOLUME: &str = "VOLUME";
    pub const ALL: &str = "ALL";
    pub const YES: &str = "YES";
    pub const NO: &str = "NO";
    pub const CANCEL: &str = "CANCEL";
}

fn rows(rows: &[&[&str]]) -> Keyboard {
    Keyboard::Reply(
        rows.iter()
            .map(|row| row.iter().map(|l| l.to_string()).collect())
            .collect(),
    )
}

/// Buttons laid out `n_cols` per row, with an optional footer row.
fn menu(buttons: Vec<String>, n_cols: usize, footer: Option<&str>) -> Keyboard {
    let mut menu: Vec<Vec<String>> = buttons
        .chunks(n_cols.max(1))
        .map(|chunk| chunk.to_vec())
        .collect();
    if let Some(footer) = footer {
        menu.push(vec![footer.to_string()]);
    }
    Keyboard::Reply(menu)
}

pub fn main_menu() -> Keyboard {
    rows(&[
        &["/trade", "/orders", "/balance"],
        &["/price", "/value", "/status"],
    ])
}

pub fn direction_keyboard() -> Keyboard {
    rows(&[
        &[labels::BUY, labels::SELL],
        &[labels::SELL_ALL],
        &[labels::CANCEL],
    ])
}

pub fn asset_keyboard(assets: &[String]) -> Keyboard {
    menu(assets.to_vec(), 3, Some(labels::CANCEL))
}

pub fn price_keyboard() -> Keyboard {
    rows(&[&[labels::MARKET_PRICE], &[labels::CANCEL]])
}

pub fn volume_mode_keyboard(quote: &str) -> Keyboard {
    menu(
        vec![quote.to_string(), labels::VOLUME.to_string(), labels::ALL.to_string()],
        3,
        Some(labels::CANCEL),
    )
}

pub fn confirm_keyboard() -> Keyboard {
    rows(&[&[labels::YES, labels::NO]])
}

pub fn cancel_keyboard() -> Keyboard {
    rows(&[&[labels::CANCEL]])
}
