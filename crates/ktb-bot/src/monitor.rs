//! Closed-order notifications.
//!
//! Each tick asks `ClosedOrders` for everything closed since the previous
//! successful tick minus one interval. The overlap keeps closures that land
//! between two queries from being missed; the set of already notified ids
//! keeps the overlap from producing duplicates.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ktb_core::OrderStatus;
use ktb_core::decimal::trim_zeros_in_text;
use ktb_core::time_util::now_secs;
use ktb_kraken::ApiError;
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::chat::Keyboard;
use crate::context::BotContext;
use crate::format;
use crate::lifecycle::Lifecycle;

/// An order submitted by the bot and awaiting closure.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitoredOrder {
    pub txid: String,
    pub chat_id: i64,
    pub enrolled_at: u64,
}

#[derive(Debug)]
struct MonitorState {
    enrolled: HashMap<String, MonitoredOrder>,
    /// Notified txid → close time, pruned once outside the query window.
    notified: HashMap<String, f64>,
    last_tick: u64,
    interval: u64,
    owner: i64,
}

pub struct OrderMonitor {
    state: Mutex<MonitorState>,
}

impl OrderMonitor {
    pub fn new(interval_secs: u64, owner: i64, started_at: u64) -> Self {
        Self {
            state: Mutex::new(MonitorState {
                enrolled: HashMap::new(),
                notified: HashMap::new(),
                last_tick: started_at,
                interval: interval_secs,
                owner,
            }),
        }
    }

    pub async fn enroll(&self, txid: &str, chat_id: i64, now: u64) {
        let mut state = self.state.lock().await;
        state.enrolled.insert(
            txid.to_string(),
            MonitoredOrder {
                txid: txid.to_string(),
                chat_id,
                enrolled_at: now,
            },
        );
        debug!("[monitor] enrolled {txid} for chat {chat_id}");
    }

    pub async fn enrolled(&self) -> Vec<MonitoredOrder> {
        let state = self.state.lock().await;
        let mut orders: Vec<MonitoredOrder> = state.enrolled.values().cloned().collect();
        orders.sort_by_key(|o| o.enrolled_at);
        orders
    }

    /// Run one query and send the notifications it yields.
    ///
    /// Returns how many notifications were sent. On error the window is not
    /// advanced, so the next tick covers the same range again.
    pub async fn tick(&self, ctx: &BotContext, now: u64) -> Result<usize, ApiError> {
        let start = {
            let state = self.state.lock().await;
            state.last_tick.saturating_sub(state.interval)
        };

        let closed = match ctx.client.closed_orders(start).await {
            Ok(closed) => closed,
            Err(e) => {
                warn!("[monitor] closed orders query failed: {e}");
                ctx.report_error(&format::api_error(&e)).await;
                return Err(e);
            }
        };

        let notifications = {
            let mut state = self.state.lock().await;
            let mut notifications = Vec::new();
            for order in closed {
                if !order.status.is_final() {
                    continue;
                }
                let enrolled = state.enrolled.remove(&order.txid);
                if order.status != OrderStatus::Closed
                    || order.executed_volume.is_zero()
                    || state.notified.contains_key(&order.txid)
                {
                    continue;
                }
                let chat_id = enrolled.map(|o| o.chat_id).unwrap_or(state.owner);
                notifications.push((chat_id, order));
            }
            notifications
        };

        // the state lock is not held across sends
        let mut delivered = Vec::new();
        for (chat_id, order) in notifications {
            let text = format!(
                "✅ Trade executed: {}\n{}",
                order.txid,
                trim_zeros_in_text(&order.description)
            );
            match ctx.sink.send(chat_id, &text, Keyboard::None).await {
                Ok(()) => {
                    info!("[monitor] notified {} to chat {chat_id}", order.txid);
                    let closed_at = order.close_time.unwrap_or(now as f64);
                    delivered.push((order.txid, closed_at));
                }
                Err(e) => warn!("[monitor] notification for {} failed: {e:#}", order.txid),
            }
        }

        let sent = delivered.len();
        let mut state = self.state.lock().await;
        state.notified.extend(delivered);
        let next_start = now.saturating_sub(state.interval) as f64;
        state.notified.retain(|_, closed_at| *closed_at >= next_start);
        state.last_tick = now;
        Ok(sent)
    }

    /// Timer loop; exits when the lifecycle leaves `Running`.
    pub async fn run(ctx: Arc<BotContext>, mut lifecycle: watch::Receiver<Lifecycle>) {
        let interval_secs = ctx.monitor.state.lock().await.interval.max(1);
        let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
        interval.tick().await; // skip the immediate first tick
        info!("[monitor] checking closed orders every {interval_secs}s");

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if !ctx.config.read().await.check_trade {
                        continue;
                    }
                    // errors are logged and reported inside tick
                    let _ = ctx.monitor.tick(&ctx, now_secs()).await;
                }
                changed = lifecycle.changed() => {
                    if changed.is_err() || !lifecycle.borrow().is_running() {
                        break;
                    }
                }
            }
        }
        info!("[monitor] stopped");
    }
}
