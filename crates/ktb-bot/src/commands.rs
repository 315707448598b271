//! Slash commands.

use ktb_core::Direction;
use ktb_core::decimal::{format_fiat, trim_zeros};
use ktb_core::time_util::{format_uptime, now_secs};
use ktb_kraken::ApiError;
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::chat;
use crate::context::BotContext;
use crate::format;
use crate::lifecycle::Lifecycle;
use crate::reservation;
use crate::updater::UpdateStatus;
use crate::workflow;

const HELP: &str = "\
/trade - buy or sell an asset
/balance - funds with the part not reserved by open orders
/orders - open orders
/orders close <txid> - cancel one order
/orders close-all - cancel every open order
/price [ASSET ...] - last trade price
/value [ASSET] - holdings valued in the quote currency
/status - version, monitored orders, uptime
/update - check for a new version
/settings [key value] - show or change a setting
/restart - restart the bot
/shutdown - stop the bot";

/// Settings read only at startup.
const RESTART_KEYS: &[&str] = &[
    "kraken_key_file",
    "kraken_rest_url",
    "retry_on_error",
    "retry_count",
    "check_trade_time",
    "update_check_time",
    "log_level",
    "log_to_file",
    "log_dir",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrdersAction {
    List,
    Close(String),
    CloseAll,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Help,
    Trade,
    Balance,
    Orders(OrdersAction),
    Price(Vec<String>),
    Value(Option<String>),
    Status,
    Update,
    Settings(Option<(String, String)>),
    Restart,
    Shutdown,
    /// Recognized as a command but malformed or unknown; carries the reply.
    Invalid(String),
}

impl Command {
    /// Parse `/name[@bot] args...`. Returns `None` for text that is not a command.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let rest = text.strip_prefix('/')?;
        let mut words = rest.split_whitespace();
        let head = words.next().unwrap_or_default();
        let name = head.split('@').next().unwrap_or_default().to_ascii_lowercase();
        let args: Vec<&str> = words.collect();

        let cmd = match name.as_str() {
            "start" | "menu" => Self::Start,
            "help" => Self::Help,
            "trade" => Self::Trade,
            "balance" => Self::Balance,
            "orders" => match args.as_slice() {
                [] => Self::Orders(OrdersAction::List),
                ["close-all"] => Self::Orders(OrdersAction::CloseAll),
                ["close", txid] => Self::Orders(OrdersAction::Close(txid.to_string())),
                _ => Self::Invalid("Usage: /orders [close <txid> | close-all]".into()),
            },
            "price" => Self::Price(args.iter().map(|a| a.to_ascii_uppercase()).collect()),
            "value" => match args.as_slice() {
                [] => Self::Value(None),
                [asset] => Self::Value(Some(asset.to_ascii_uppercase())),
                _ => Self::Invalid("Usage: /value [ASSET]".into()),
            },
            "status" => Self::Status,
            "update" => Self::Update,
            "settings" => match args.as_slice() {
                [] => Self::Settings(None),
                [key, value @ ..] if !value.is_empty() => {
                    Self::Settings(Some((key.to_string(), value.join(" "))))
                }
                _ => Self::Invalid("Usage: /settings [key value]".into()),
            },
            "restart" => Self::Restart,
            "shutdown" => Self::Shutdown,
            _ => Self::Invalid("Unknown command. See /help".into()),
        };
        Some(cmd)
    }
}

pub async fn execute(ctx: &BotContext, chat_id: i64, cmd: Command) {
    info!("[telegram] command {cmd:?} from {chat_id}");
    let reply = match cmd {
        Command::Start => Ok("Kraken trading bot ready".to_string()),
        Command::Help => Ok(HELP.to_string()),
        Command::Trade => {
            let state = workflow::start(ctx, chat_id).await;
            ctx.sessions.lock().await.insert(chat_id, state);
            return;
        }
        Command::Balance => balance(ctx).await,
        Command::Orders(action) => orders(ctx, action).await,
        Command::Price(assets) => price(ctx, assets).await,
        Command::Value(asset) => value(ctx, asset).await,
        Command::Status => Ok(status(ctx).await),
        Command::Update => Ok(update(ctx).await),
        Command::Settings(None) => Ok(show_settings(ctx).await),
        Command::Settings(Some((key, value))) => Ok(change_setting(ctx, &key, &value).await),
        Command::Restart => {
            adopt_pending_update(ctx).await;
            ctx.send(chat_id, "Restarting...", chat::main_menu()).await;
            ctx.request_lifecycle(Lifecycle::Restart);
            return;
        }
        Command::Shutdown => {
            ctx.send(chat_id, "Shutting down...", chat::Keyboard::Remove).await;
            ctx.request_lifecycle(Lifecycle::Shutdown);
            return;
        }
        Command::Invalid(text) => Ok(text),
    };

    let text = reply.unwrap_or_else(|e| {
        warn!("[telegram] command failed: {e}");
        format::api_error(&e)
    });
    ctx.send(chat_id, &text, chat::main_menu()).await;
}

async fn balance(ctx: &BotContext) -> Result<String, ApiError> {
    let balances = ctx.client.balance().await?;
    let open_orders = ctx.client.open_orders().await?;
    let quote = ctx.quote().await;

    let lines: Vec<String> = balances
        .nonzero()
        .into_iter()
        .map(|(code, total)| {
            let asset = ctx.directory.display(code);
            let direction = if asset.eq_ignore_ascii_case(&quote) {
                Direction::Buy
            } else {
                Direction::Sell
            };
            let free = reservation::available(
                asset,
                &quote,
                direction,
                &balances,
                &open_orders,
                &ctx.directory,
            );
            format!("{asset}: {} (available {})", trim_zeros(total), trim_zeros(free))
        })
        .collect();

    if lines.is_empty() {
        return Ok("No funds".to_string());
    }
    Ok(lines.join("\n"))
}

async fn orders(ctx: &BotContext, action: OrdersAction) -> Result<String, ApiError> {
    match action {
        OrdersAction::List => {
            let open_orders = ctx.client.open_orders().await?;
            if open_orders.is_empty() {
                return Ok("No open orders".to_string());
            }
            Ok(open_orders
                .iter()
                .map(format::order_line)
                .collect::<Vec<_>>()
                .join("\n\n"))
        }
        OrdersAction::Close(txid) => {
            let count = ctx.client.cancel_order(&txid).await?;
            Ok(format!("Canceled {txid} ({count} order(s))"))
        }
        OrdersAction::CloseAll => {
            let open_orders = ctx.client.open_orders().await?;
            if open_orders.is_empty() {
                return Ok("No open orders".to_string());
            }
            for order in &open_orders {
                ctx.client.cancel_order(&order.txid).await?;
            }
            Ok(format!("Canceled {} order(s)", open_orders.len()))
        }
    }
}

/// Last trade price per display asset; assets without a pair are left out.
async fn last_prices(ctx: &BotContext, assets: &[String]) -> Result<Vec<(String, Decimal)>, ApiError> {
    let quote = ctx.quote().await;
    let pairs: Vec<(String, &ktb_core::PairInfo)> = assets
        .iter()
        .filter_map(|a| ctx.directory.pair_for(a, &quote).map(|p| (a.clone(), p)))
        .collect();
    if pairs.is_empty() {
        return Ok(Vec::new());
    }

    let names: Vec<String> = pairs.iter().map(|(_, p)| p.name.clone()).collect();
    let prices = ctx.client.ticker(&names).await?;
    Ok(pairs
        .into_iter()
        .filter_map(|(asset, pair)| {
            prices
                .get(&pair.name)
                .or_else(|| prices.get(&pair.altname))
                .map(|price| (asset, *price))
        })
        .collect())
}

async fn price(ctx: &BotContext, assets: Vec<String>) -> Result<String, ApiError> {
    let assets = if assets.is_empty() {
        ctx.trade_assets().await
    } else {
        assets
    };
    let quote = ctx.quote().await;
    let prices = last_prices(ctx, &assets).await?;

    let lines: Vec<String> = assets
        .iter()
        .map(|asset| match prices.iter().find(|(a, _)| a.eq_ignore_ascii_case(asset)) {
            Some((_, price)) => format!("{asset}: {} {quote}", trim_zeros(*price)),
            None => format!("{asset}: no {asset}/{quote} pair"),
        })
        .collect();
    Ok(lines.join("\n"))
}

async fn value(ctx: &BotContext, only: Option<String>) -> Result<String, ApiError> {
    let quote = ctx.quote().await;
    let balances = ctx.client.balance().await?;

    let holdings: Vec<(String, Decimal)> = balances
        .nonzero()
        .into_iter()
        .map(|(code, amount)| (ctx.directory.display(code).to_string(), amount))
        .filter(|(asset, _)| only.as_ref().is_none_or(|o| o.eq_ignore_ascii_case(asset)))
        .collect();
    if holdings.is_empty() {
        return Ok(match only {
            Some(asset) => format!("No {asset} holdings"),
            None => "No funds".to_string(),
        });
    }

    let assets: Vec<String> = holdings
        .iter()
        .filter(|(asset, _)| !asset.eq_ignore_ascii_case(&quote))
        .map(|(asset, _)| asset.clone())
        .collect();
    let prices = last_prices(ctx, &assets).await?;

    let mut overall = Decimal::ZERO;
    let mut lines = Vec::new();
    for (asset, amount) in &holdings {
        let worth = if asset.eq_ignore_ascii_case(&quote) {
            Some(*amount)
        } else {
            prices
                .iter()
                .find(|(a, _)| a == asset)
                .map(|(_, price)| amount.saturating_mul(*price))
        };
        match worth {
            Some(worth) => {
                overall = overall.saturating_add(worth);
                lines.push(format!("{asset}: {} {quote}", format_fiat(worth)));
            }
            None => lines.push(format!("{asset}: no {asset}/{quote} pair")),
        }
    }
    if only.is_none() {
        lines.push(format!("Overall: {} {quote}", format_fiat(overall)));
    }
    Ok(lines.join("\n"))
}

async fn status(ctx: &BotContext) -> String {
    let monitored = ctx.monitor.enrolled().await.len();
    let check_trade = ctx.config.read().await.check_trade;
    let uptime = format_uptime(now_secs().saturating_sub(ctx.started_at));
    format!(
        "Version: {}\nOrder monitor: {}\nMonitored orders: {monitored}\nUptime: {uptime}",
        env!("CARGO_PKG_VERSION"),
        if check_trade { "on" } else { "off" },
    )
}

async fn update(ctx: &BotContext) -> String {
    let (url, etag) = {
        let cfg = ctx.config.read().await;
        (cfg.update_url.clone(), cfg.update_hash.clone())
    };
    let Some(url) = url else {
        return "No update_url configured".to_string();
    };

    match ctx.updater.check(&url, etag.as_deref()).await {
        Ok(UpdateStatus::UpToDate) => "Bot is up to date".to_string(),
        Ok(UpdateStatus::Available { etag }) => {
            ctx.updater.set_pending(etag).await;
            "New version available. Deploy it and /restart".to_string()
        }
        Ok(UpdateStatus::Unexpected(code)) => {
            format!("Update check not possible. Unexpected status code: {code}")
        }
        Err(e) => {
            warn!("update check failed: {e:#}");
            format!("❌ Update check failed: {e}")
        }
    }
}

/// Record the ETag announced by `/update` as the installed version.
async fn adopt_pending_update(ctx: &BotContext) {
    let Some(etag) = ctx.updater.take_pending().await else {
        return;
    };
    info!("adopting update {etag}");
    ctx.config.write().await.update_hash = Some(etag);
    if let Err(e) = ctx.persist_config().await {
        warn!("cannot persist update hash: {e:#}");
    }
}

async fn show_settings(ctx: &BotContext) -> String {
    ctx.config
        .read()
        .await
        .display_entries()
        .into_iter()
        .map(|(key, value)| format!("{key} = {value}"))
        .collect::<Vec<_>>()
        .join("\n")
}

async fn change_setting(ctx: &BotContext, key: &str, value: &str) -> String {
    if let Err(e) = ctx.config.write().await.set_value(key, value) {
        return format!("❌ {e}");
    }
    info!("setting {key} changed to {value}");
    if let Err(e) = ctx.persist_config().await {
        warn!("cannot persist settings: {e:#}");
        return format!("❌ {key} changed but not saved: {e}");
    }
    if RESTART_KEYS.contains(&key) {
        format!("✅ {key} = {value} (takes effect after /restart)")
    } else {
        format!("✅ {key} = {value}")
    }
}
