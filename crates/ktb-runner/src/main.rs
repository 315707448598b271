//! # ktb-runner
//!
//! Entry point of the Kraken Telegram bot.
//!
//! Loads the JSON config, connects to Kraken, loads the asset directory and
//! runs three loops until a lifecycle request arrives: Telegram polling, the
//! closed-order monitor and the periodic update check. The exit code tells a
//! supervisor whether to start the bot again (`75`) or not (`0`).
//!
//! # Usage
//!
//! ```bash
//! ktb-runner config.json --log-level debug --log-dir logs
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use ktb_bot::{BotContext, Lifecycle, OrderMonitor, telegram, updater};
use ktb_core::config::load_config;
use ktb_kraken::{Credentials, KrakenClient, KrakenConfig, KrakenRest};
use teloxide::Bot;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Personal Kraken trading bot for Telegram.
#[derive(Parser)]
#[command(name = "ktb-runner", about = "Personal Kraken trading bot for Telegram")]
struct Cli {
    /// Configuration file path (JSON).
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error). Overrides `log_level`.
    #[arg(short, long)]
    log_level: Option<String>,

    /// Log directory for file output. Overrides `log_to_file`/`log_dir`.
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

fn main() {
    let code = match run() {
        Ok(code) => code,
        Err(e) => {
            error!("fatal: {e:#}");
            eprintln!("ktb-runner: {e:#}");
            1
        }
    };
    std::process::exit(code);
}

#[tokio::main]
async fn run() -> Result<i32> {
    let cli = Cli::parse();

    // 1. Configuration
    let config = load_config(&cli.config)?;

    // 2. Logging
    let log_level = cli.log_level.clone().unwrap_or_else(|| config.log_level.clone());
    let log_dir = cli
        .log_dir
        .clone()
        .or_else(|| config.log_to_file.then(|| PathBuf::from(&config.log_dir)));
    let _log_guard = ktb_core::logging::init_logging(&log_level, log_dir.as_deref(), "ktb-runner");
    info!("ktb-runner starting: config={}, log_level={log_level}", cli.config.display());

    // 3. Exchange
    let kraken_config = KrakenConfig::from_bot_config(&config);
    let credentials = load_credentials(Path::new(&config.kraken_key_file));
    let rest = KrakenRest::new(&kraken_config, credentials)?;
    let client = KrakenClient::new(Arc::new(rest), kraken_config.retry_policy());
    let directory = client
        .load_directory()
        .await
        .context("cannot load Kraken assets")?;
    info!(
        "[kraken] {} assets, {} pairs",
        directory.asset_count(),
        directory.pair_count()
    );

    // 4. Bot
    let bot = Bot::new(&config.bot_token);
    let sink = Arc::new(telegram::TelegramSink::new(bot.clone()));
    let (lifecycle_tx, mut lifecycle_rx) = watch::channel(Lifecycle::Running);
    let ctx = Arc::new(BotContext::new(
        client,
        Arc::new(directory),
        config,
        Some(cli.config.clone()),
        sink,
        lifecycle_tx,
    ));

    let tasks = vec![
        tokio::spawn(telegram::run_polling(bot, ctx.clone(), ctx.lifecycle())),
        tokio::spawn(OrderMonitor::run(ctx.clone(), ctx.lifecycle())),
        tokio::spawn(updater::run(ctx.clone(), ctx.lifecycle())),
    ];
    info!("bot running, owner chat {}", ctx.config.read().await.user_id);

    // 5. Wait for /shutdown, /restart or Ctrl+C
    let outcome = tokio::select! {
        state = wait_for_stop(&mut lifecycle_rx) => state,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupt received");
            ctx.request_lifecycle(Lifecycle::Shutdown);
            Lifecycle::Shutdown
        }
    };

    for task in tasks {
        if let Err(e) = task.await {
            error!("task ended abnormally: {e}");
        }
    }
    info!("stopped ({outcome:?}), exit code {}", outcome.exit_code());
    Ok(outcome.exit_code())
}

async fn wait_for_stop(rx: &mut watch::Receiver<Lifecycle>) -> Lifecycle {
    loop {
        let state = *rx.borrow_and_update();
        if !state.is_running() {
            return state;
        }
        if rx.changed().await.is_err() {
            return Lifecycle::Shutdown;
        }
    }
}

/// Private calls fail with an invalid-credentials error when this is `None`.
fn load_credentials(path: &Path) -> Option<Credentials> {
    match Credentials::load(path) {
        Ok(credentials) => Some(credentials),
        Err(e) => {
            warn!("[kraken] no API credentials ({e}); private calls will fail");
            None
        }
    }
}
