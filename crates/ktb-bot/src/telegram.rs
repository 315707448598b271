//! Telegram transport: outgoing messages and the `getUpdates` long-poll loop.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{
    ChatId, KeyboardButton, KeyboardMarkup, KeyboardRemove, ReplyMarkup, UpdateKind,
};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::chat::{ChatSink, Keyboard};
use crate::context::BotContext;
use crate::dispatcher;
use crate::lifecycle::Lifecycle;

/// Telegram rejects longer message texts.
const MAX_MESSAGE_CHARS: usize = 4096;
const POLL_TIMEOUT_SECS: u32 = 10;
const POLL_RETRY_DELAY: Duration = Duration::from_secs(5);

pub struct TelegramSink {
    bot: Bot,
}

impl TelegramSink {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn reply_markup(keyboard: Keyboard) -> Option<ReplyMarkup> {
    match keyboard {
        Keyboard::None => None,
        Keyboard::Reply(rows) => {
            let rows: Vec<Vec<KeyboardButton>> = rows
                .into_iter()
                .map(|row| row.into_iter().map(KeyboardButton::new).collect())
                .collect();
            Some(KeyboardMarkup::new(rows).resize_keyboard().into())
        }
        Keyboard::Remove => Some(KeyboardRemove::new().into()),
    }
}

/// Split `text` into chunks Telegram accepts, preferring line boundaries.
fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split('\n') {
        let mut line = line;
        loop {
            let line_len = line.chars().count();
            let needed = if current.is_empty() { line_len } else { line_len + 1 };
            if current_len + needed <= max_chars {
                if !current.is_empty() {
                    current.push('\n');
                }
                current.push_str(line);
                current_len += needed;
                break;
            }
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
                continue;
            }
            // a single line longer than the limit
            let cut = line
                .char_indices()
                .nth(max_chars)
                .map(|(i, _)| i)
                .unwrap_or(line.len());
            chunks.push(line[..cut].to_string());
            line = &line[cut..];
        }
    }
    if !current.is_empty() || chunks.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[async_trait]
impl ChatSink for TelegramSink {
    async fn send(&self, chat_id: i64, text: &str, keyboard: Keyboard) -> Result<()> {
        let chunks = split_message(text, MAX_MESSAGE_CHARS);
        let last = chunks.len() - 1;
        let mut markup = reply_markup(keyboard);
        for (i, chunk) in chunks.into_iter().enumerate() {
            let mut request = self.bot.send_message(ChatId(chat_id), chunk);
            if i == last {
                if let Some(markup) = markup.take() {
                    request = request.reply_markup(markup);
                }
            }
            request
                .await
                .with_context(|| format!("sendMessage to {chat_id}"))?;
        }
        Ok(())
    }
}

/// Offset acknowledging update `id`; `None` past the `i32` range of `getUpdates`.
fn next_offset(id: u32) -> Option<i32> {
    i32::try_from(id).ok()?.checked_add(1)
}

/// Long-poll `getUpdates` and dispatch each text message in order until the
/// lifecycle leaves `Running`.
pub async fn run_polling(bot: Bot, ctx: Arc<BotContext>, mut lifecycle: watch::Receiver<Lifecycle>) {
    info!("[telegram] polling started");
    let mut offset: i32 = 0;

    loop {
        let request = bot.get_updates().offset(offset).timeout(POLL_TIMEOUT_SECS);
        tokio::select! {
            result = async { request.await } => match result {
                Ok(updates) => {
                    for update in updates {
                        match next_offset(update.id.0) {
                            Some(next) => offset = next,
                            None => warn!("[telegram] update id {} exceeds the offset range", update.id.0),
                        }
                        let UpdateKind::Message(message) = update.kind else {
                            continue;
                        };
                        let Some(text) = message.text() else {
                            continue;
                        };
                        dispatcher::dispatch(ctx.clone(), message.chat.id.0, text.to_string()).await;
                    }
                }
                Err(e) => {
                    warn!("[telegram] getUpdates failed: {e}");
                    ctx.report_error(&format!("❌ Telegram polling failed: {e}")).await;
                    tokio::time::sleep(POLL_RETRY_DELAY).await;
                }
            },
            changed = lifecycle.changed() => {
                if changed.is_err() || !lifecycle.borrow().is_running() {
                    break;
                }
            }
        }

        if !lifecycle.borrow().is_running() {
            break;
        }
    }

    // acknowledge handled updates so /restart or /shutdown is not replayed
    if offset != 0 {
        if let Err(e) = bot.get_updates().offset(offset).timeout(0).await {
            warn!("[telegram] final offset confirmation failed: {e}");
        }
    }
    info!("[telegram] polling stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_message("hello\nworld", 4096), vec!["hello\nworld"]);
        assert_eq!(split_message("", 4096), vec![""]);
    }

    #[test]
    fn splits_on_lines_then_characters() {
        assert_eq!(split_message("aaa\nbbb\nccc", 7), vec!["aaa\nbbb", "ccc"]);
        assert_eq!(split_message("abcdefgh", 3), vec!["abc", "def", "gh"]);
        let chunks = split_message("€€€€\n€", 3);
        assert_eq!(chunks, vec!["€€€", "€\n€"]);
    }

    #[test]
    fn offsets_stay_in_range() {
        assert_eq!(next_offset(0), Some(1));
        assert_eq!(next_offset(41), Some(42));
        assert_eq!(next_offset(i32::MAX as u32 - 1), Some(i32::MAX));
        assert_eq!(next_offset(i32::MAX as u32), None);
        assert_eq!(next_offset(u32::MAX), None);
    }

    #[test]
    fn keyboards_map_to_markup() {
        assert!(reply_markup(Keyboard::None).is_none());
        assert!(matches!(
            reply_markup(Keyboard::Remove),
            Some(ReplyMarkup::KeyboardRemove(_))
        ));
        let Some(ReplyMarkup::Keyboard(markup)) = reply_markup(crate::chat::main_menu()) else {
            panic!("expected a reply keyboard");
        };
        assert_eq!(markup.keyboard.len(), 2);
        assert_eq!(markup.keyboard[0][0].text, "/trade");
    }
}
