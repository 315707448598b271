//! Routes one inbound text message.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, error, warn};

use crate::auth::{Access, Authorizer};
use crate::chat::{self, Keyboard};
use crate::commands::{self, Command};
use crate::context::BotContext;
use crate::workflow;

/// Handle a message on its own task so a panicking handler is logged and
/// reported instead of ending the poll loop.
pub async fn dispatch(ctx: Arc<BotContext>, chat_id: i64, text: String) {
    let handler = {
        let ctx = ctx.clone();
        async move { handle_text(&ctx, chat_id, &text).await }
    };
    contain(&ctx, chat_id, handler).await;
}

async fn contain<F>(ctx: &BotContext, chat_id: i64, handler: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    let Err(e) = tokio::spawn(handler).await else {
        return;
    };
    error!("[telegram] handler for chat {chat_id} failed: {e}");
    if ctx.sessions.lock().await.remove(&chat_id).is_some() {
        debug!("[trade] session of {chat_id} dropped after a failed handler");
    }
    ctx.report_error(&format!("❌ Internal error: {e}")).await;
}

/// Handle a message from `chat_id`.
///
/// A command always wins over a running `/trade` conversation and clears it.
pub async fn handle_text(ctx: &BotContext, chat_id: i64, text: &str) {
    let owner = ctx.config.read().await.user_id;
    if Authorizer::new(owner).check(chat_id) == Access::Denied {
        warn!("[telegram] access denied for chat {chat_id}: {text:?}");
        ctx.send(chat_id, "Access denied", Keyboard::Remove).await;
        return;
    }

    if let Some(cmd) = Command::parse(text) {
        if ctx.sessions.lock().await.remove(&chat_id).is_some() {
            debug!("[trade] session of {chat_id} replaced by a command");
        }
        commands::execute(ctx, chat_id, cmd).await;
        return;
    }

    // the lock is not held while the step talks to the exchange
    let session = ctx.sessions.lock().await.remove(&chat_id);
    match session {
        Some(state) => {
            if let Some(next) = workflow::handle_text(ctx, chat_id, state, text).await {
                ctx.sessions.lock().await.insert(chat_id, next);
            }
        }
        None => {
            ctx.send(chat_id, "Unknown input. Use /trade or /help", chat::main_menu())
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::{Harness, OWNER};
    use crate::workflow::TradeState;

    #[tokio::test]
    async fn strangers_are_denied() {
        let h = Harness::new();
        handle_text(&h.ctx, 777, "/balance").await;
        assert_eq!(h.sink.messages_to(777), vec!["Access denied"]);
        assert_eq!(h.exchange.call_count("Balance"), 0);
        assert!(h.sink.messages_to(OWNER).is_empty());
    }

    #[tokio::test]
    async fn conversation_is_kept_between_messages() {
        let h = Harness::new();
        handle_text(&h.ctx, OWNER, "/trade").await;
        handle_text(&h.ctx, OWNER, "SELL").await;
        handle_text(&h.ctx, OWNER, "XMR").await;
        assert!(matches!(
            h.ctx.sessions.lock().await.get(&OWNER),
            Some(TradeState::AwaitPrice { .. })
        ));
        assert_eq!(h.sink.last_text(OWNER), "Enter price per unit of XMR in EUR");
    }

    #[tokio::test]
    async fn command_clears_conversation() {
        let h = Harness::new();
        h.exchange.respond("OpenOrders", json!({"open": {}}));
        handle_text(&h.ctx, OWNER, "/trade").await;
        handle_text(&h.ctx, OWNER, "/orders").await;
        assert!(h.ctx.sessions.lock().await.is_empty());
        assert_eq!(h.sink.last_text(OWNER), "No open orders");
    }

    #[tokio::test]
    async fn text_without_conversation() {
        let h = Harness::new();
        handle_text(&h.ctx, OWNER, "BUY").await;
        assert_eq!(h.sink.last_text(OWNER), "Unknown input. Use /trade or /help");
    }

    async fn failing_handler() {
        panic!("handler failure")
    }

    #[tokio::test]
    async fn panicking_handler_is_reported() {
        let h = Harness::new();
        h.ctx.sessions.lock().await.insert(OWNER, TradeState::AwaitDirection);
        contain(&h.ctx, OWNER, failing_handler()).await;

        assert!(h.ctx.sessions.lock().await.is_empty());
        assert!(h.sink.last_text(OWNER).starts_with("❌ Internal error"));

        dispatch(h.ctx.clone(), OWNER, "BUY".to_string()).await;
        assert_eq!(h.sink.last_text(OWNER), "Unknown input. Use /trade or /help");
    }

    #[tokio::test]
    async fn finished_conversation_is_removed() {
        let h = Harness::new();
        handle_text(&h.ctx, OWNER, "/trade").await;
        handle_text(&h.ctx, OWNER, "cancel").await;
        assert!(h.ctx.sessions.lock().await.is_empty());
        assert_eq!(h.sink.last_text(OWNER), "Canceled");
    }
}
