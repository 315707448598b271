//! Shared state handed to every handler.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use ktb_core::AssetDirectory;
use ktb_core::config::{BotConfig, save_config};
use ktb_core::time_util::now_secs;
use ktb_kraken::KrakenClient;
use tokio::sync::{Mutex, RwLock, watch};
use tracing::{error, info};

use crate::chat::{ChatSink, Keyboard};
use crate::lifecycle::Lifecycle;
use crate::monitor::OrderMonitor;
use crate::updater::UpdateChecker;
use crate::workflow::TradeState;

pub struct BotContext {
    pub client: KrakenClient,
    pub directory: Arc<AssetDirectory>,
    pub config: RwLock<BotConfig>,
    /// Where `/settings` and `/update` persist the config. `None` in tests.
    pub config_path: Option<PathBuf>,
    pub sink: Arc<dyn ChatSink>,
    pub monitor: OrderMonitor,
    /// Active `/trade` conversations keyed by chat id.
    pub sessions: Mutex<HashMap<i64, TradeState>>,
    pub updater: UpdateChecker,
    pub started_at: u64,
    lifecycle: watch::Sender<Lifecycle>,
}

impl BotContext {
    pub fn new(
        client: KrakenClient,
        directory: Arc<AssetDirectory>,
        config: BotConfig,
        config_path: Option<PathBuf>,
        sink: Arc<dyn ChatSink>,
        lifecycle: watch::Sender<Lifecycle>,
    ) -> Self {
        let started_at = now_secs();
        let monitor = OrderMonitor::new(config.check_trade_time, config.user_id, started_at);
        Self {
            client,
            directory,
            config: RwLock::new(config),
            config_path,
            sink,
            monitor,
            sessions: Mutex::new(HashMap::new()),
            updater: UpdateChecker::new(),
            started_at,
            lifecycle,
        }
    }

    /// Send a message; delivery failures are logged, not returned.
    pub async fn send(&self, chat_id: i64, text: &str, keyboard: Keyboard) {
        if let Err(e) = self.sink.send(chat_id, text, keyboard).await {
            error!("[telegram] send to {chat_id} failed: {e:#}");
        }
    }

    /// Forward an error to the owner when `send_error` is enabled.
    pub async fn report_error(&self, text: &str) {
        let (owner, enabled) = {
            let cfg = self.config.read().await;
            (cfg.user_id, cfg.send_error)
        };
        if enabled {
            self.send(owner, text, Keyboard::None).await;
        }
    }

    pub async fn quote(&self) -> String {
        self.config.read().await.trade_to_currency.clone()
    }

    pub async fn trade_assets(&self) -> Vec<String> {
        self.config.read().await.trade_assets.clone()
    }

    /// Write the current config back to disk.
    pub async fn persist_config(&self) -> Result<()> {
        let Some(path) = &self.config_path else {
            return Ok(());
        };
        let cfg = self.config.read().await;
        save_config(path, &cfg)?;
        info!("config saved to {}", path.display());
        Ok(())
    }

    pub fn request_lifecycle(&self, state: Lifecycle) {
        info!("lifecycle change requested: {state:?}");
        self.lifecycle.send_replace(state);
    }

    pub fn lifecycle(&self) -> watch::Receiver<Lifecycle> {
        self.lifecycle.subscribe()
    }
}
