//! Scripted exchange and recording chat used by the unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use ktb_core::config::BotConfig;
use ktb_core::{AssetDirectory, PairInfo};
use ktb_kraken::{KrakenClient, Params, Reply, RetryPolicy, Transport, TransportError};
use rust_decimal_macros::dec;
use serde_json::Value;
use tokio::sync::{OwnedMutexGuard, watch};

use crate::chat::{ChatSink, Keyboard};
use crate::context::BotContext;
use crate::lifecycle::Lifecycle;

pub const OWNER: i64 = 4242;

pub fn config() -> BotConfig {
    BotConfig::new("token", OWNER)
}

pub fn directory() -> AssetDirectory {
    let mut dir = AssetDirectory::new();
    dir.add_asset("XXBT", "XBT");
    dir.add_asset("XETH", "ETH");
    dir.add_asset("XXMR", "XMR");
    dir.add_asset("ZEUR", "EUR");
    for (name, altname, base, min) in [
        ("XXBTZEUR", "XBTEUR", "XXBT", dec!(0.0001)),
        ("XETHZEUR", "ETHEUR", "XETH", dec!(0.01)),
        ("XXMRZEUR", "XMREUR", "XXMR", dec!(0.05)),
    ] {
        dir.add_pair(PairInfo {
            name: name.into(),
            altname: altname.into(),
            base: base.into(),
            quote: "ZEUR".into(),
            order_min: Some(min),
        });
    }
    dir
}

/// Transport answering from per-method queues and recording every call.
#[derive(Default)]
pub struct ScriptedExchange {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<(String, Params)>>,
}

impl ScriptedExchange {
    pub fn respond(&self, method: &str, result: Value) {
        self.push(method, Reply::ok(result));
    }

    pub fn fail(&self, method: &str, errors: &[&str]) {
        self.push(method, Reply::err(errors));
    }

    fn push(&self, method: &str, reply: Reply) {
        self.replies
            .lock()
            .unwrap()
            .entry(method.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn calls(&self, method: &str) -> Vec<Params> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
            .collect()
    }

    pub fn call_count(&self, method: &str) -> usize {
        self.calls(method).len()
    }
}

#[async_trait]
impl Transport for ScriptedExchange {
    async fn query(
        &self,
        method: &str,
        params: &[(String, String)],
        _private: bool,
    ) -> Result<Reply, TransportError> {
        self.calls
            .lock()
            .unwrap()
            .push((method.to_string(), params.to_vec()));
        self.replies
            .lock()
            .unwrap()
            .get_mut(method)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| TransportError::Network(format!("no scripted reply for {method}")))
    }
}

/// Chat sink keeping every message in order.
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<(i64, String, Keyboard)>>,
    gate: Arc<tokio::sync::Mutex<()>>,
    waiting: AtomicUsize,
}

impl RecordingSink {
    /// Hold back every send until the guard is dropped.
    pub async fn hold(&self) -> OwnedMutexGuard<()> {
        self.gate.clone().lock_owned().await
    }

    /// Sends currently held back.
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    pub fn messages_to(&self, chat_id: i64) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(chat, _, _)| *chat == chat_id)
            .map(|(_, text, _)| text.clone())
            .collect()
    }

    pub fn all_text(&self, chat_id: i64) -> String {
        self.messages_to(chat_id).join("\n")
    }

    pub fn last_text(&self, chat_id: i64) -> String {
        self.messages_to(chat_id).pop().unwrap_or_default()
    }

    pub fn last_keyboard(&self, chat_id: i64) -> Keyboard {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(chat, _, _)| *chat == chat_id)
            .map(|(_, _, kb)| kb.clone())
            .unwrap_or(Keyboard::None)
    }
}

#[async_trait]
impl ChatSink for RecordingSink {
    async fn send(&self, chat_id: i64, text: &str, keyboard: Keyboard) -> Result<()> {
        self.waiting.fetch_add(1, Ordering::SeqCst);
        drop(self.gate.lock().await);
        self.waiting.fetch_sub(1, Ordering::SeqCst);
        self.sent
            .lock()
            .unwrap()
            .push((chat_id, text.to_string(), keyboard));
        Ok(())
    }
}

pub struct Harness {
    pub ctx: Arc<BotContext>,
    pub exchange: Arc<ScriptedExchange>,
    pub sink: Arc<RecordingSink>,
    pub lifecycle: watch::Receiver<Lifecycle>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(config())
    }

    pub fn with_config(config: BotConfig) -> Self {
        let exchange = Arc::new(ScriptedExchange::default());
        let sink = Arc::new(RecordingSink::default());
        let client = KrakenClient::new(exchange.clone(), RetryPolicy::disabled());
        let (tx, lifecycle) = watch::channel(Lifecycle::Running);
        let ctx = BotContext::new(
            client,
            Arc::new(directory()),
            config,
            None,
            sink.clone(),
            tx,
        );
        Self {
            ctx: Arc::new(ctx),
            exchange,
            sink,
            lifecycle,
        }
    }
}
