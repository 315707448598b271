//! Liquidate every holding into the quote currency.

use ktb_core::decimal::{round_volume, trim_zeros, trim_zeros_in_text};
use ktb_core::time_util::now_secs;
use ktb_core::{Direction, OrderRequest, OrderType};
use ktb_kraken::{AddOrderOutcome, ApiError};
use tracing::{info, warn};

use crate::chat::{self, Keyboard};
use crate::context::BotContext;
use crate::format;
use crate::workflow::min_order;

/// Cancel all open orders, then market-sell every non-quote balance that
/// trades against the quote currency.
pub async fn execute(ctx: &BotContext, chat_id: i64) {
    if let Err(e) = run(ctx, chat_id).await {
        warn!("[trade] sell all aborted: {e}");
        ctx.send(chat_id, &format::api_error(&e), chat::main_menu()).await;
    }
}

async fn run(ctx: &BotContext, chat_id: i64) -> Result<(), ApiError> {
    let open_orders = ctx.client.open_orders().await?;
    for order in &open_orders {
        ctx.client.cancel_order(&order.txid).await?;
        info!("[trade] canceled {}", order.txid);
    }
    if !open_orders.is_empty() {
        let text = format!("Canceled {} open order(s)", open_orders.len());
        ctx.send(chat_id, &text, Keyboard::None).await;
    }

    let quote = ctx.quote().await;
    let quote_code = ctx.directory.code(&quote).unwrap_or(&quote).to_string();
    let balances = ctx.client.balance().await?;

    let mut sold = 0;
    for (code, amount) in balances.nonzero() {
        if code == quote_code {
            continue;
        }
        let asset = ctx.directory.display(code).to_string();
        let Some(pair) = ctx.directory.pair_for(&asset, &quote) else {
            info!("[trade] sell all: no {asset}/{quote} pair, keeping {amount}");
            continue;
        };

        let volume = round_volume(amount);
        let minimum = min_order(ctx, &asset, &pair.name).await;
        if let Some(min) = minimum.filter(|min| volume < *min) {
            warn!("[trade] sell all: {asset} volume {volume} below minimum {min}");
            let text = format!(
                "⚠️ Skipped {asset}: {} is below the minimum order size of {}",
                trim_zeros(volume),
                trim_zeros(min)
            );
            ctx.send(chat_id, &text, Keyboard::None).await;
            continue;
        }
        if volume.is_zero() {
            continue;
        }

        let request = OrderRequest {
            direction: Direction::Sell,
            pair: pair.name.clone(),
            order_type: OrderType::Market,
            price: None,
            volume,
        };
        let text = match ctx.client.add_order(&request).await? {
            AddOrderOutcome::Placed { txids, description } => {
                sold += 1;
                if ctx.config.read().await.check_trade {
                    for txid in &txids {
                        ctx.monitor.enroll(txid, chat_id, now_secs()).await;
                    }
                }
                format!("✅ {}\n{}", txids.join(", "), trim_zeros_in_text(&description))
            }
            AddOrderOutcome::Undefined(raw) => format!("Undefined state: {raw}"),
        };
        ctx.send(chat_id, &text, Keyboard::None).await;
    }

    let summary = if sold == 0 {
        "Nothing to sell".to_string()
    } else {
        format!("Placed {sold} market sell order(s)")
    };
    ctx.send(chat_id, &summary, chat::main_menu()).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testing::{Harness, OWNER};

    #[tokio::test]
    async fn cancels_then_sells_everything_above_minimum() {
        let h = Harness::new();
        h.exchange.respond(
            "OpenOrders",
            json!({"open": {"OA": {
                "status": "open",
                "descr": {"pair": "ETHEUR", "type": "sell", "ordertype": "limit",
                          "price": "400", "order": "sell 1.00000000 ETHEUR @ limit 400"},
                "vol": "1.00000000", "vol_exec": "0.00000000"
            }}}),
        );
        h.exchange.respond("CancelOrder", json!({"count": 1}));
        h.exchange.respond(
            "Balance",
            json!({"ZEUR": "100.0", "XETH": "1.5", "XXMR": "0.01", "DOGE": "50"}),
        );
        h.exchange.respond(
            "AddOrder",
            json!({"descr": {"order": "sell 1.50000000 ETHEUR @ market"}, "txid": ["OS1"]}),
        );

        execute(&h.ctx, OWNER).await;

        assert_eq!(h.exchange.calls("CancelOrder")[0], vec![("txid".to_string(), "OA".to_string())]);
        let adds = h.exchange.calls("AddOrder");
        assert_eq!(adds.len(), 1);
        assert!(adds[0].contains(&("pair".into(), "XETHZEUR".into())));
        assert!(adds[0].contains(&("ordertype".into(), "market".into())));
        assert!(adds[0].contains(&("volume".into(), "1.50000000".into())));

        let text = h.sink.all_text(OWNER);
        assert!(text.contains("Skipped XMR"));
        assert!(text.contains("sell 1.5 ETHEUR @ market"));
        assert_eq!(h.sink.last_text(OWNER), "Placed 1 market sell order(s)");
    }

    #[tokio::test]
    async fn cancel_failure_stops_before_selling() {
        let h = Harness::new();
        h.exchange.respond(
            "OpenOrders",
            json!({"open": {"OA": {
                "status": "open",
                "descr": {"pair": "ETHEUR", "type": "buy", "ordertype": "limit",
                          "price": "100", "order": "buy 1.00000000 ETHEUR @ limit 100"},
                "vol": "1.00000000", "vol_exec": "0.00000000"
            }}}),
        );
        h.exchange.fail("CancelOrder", &["EOrder:Unknown order"]);

        execute(&h.ctx, OWNER).await;

        assert_eq!(h.exchange.call_count("Balance"), 0);
        assert_eq!(h.exchange.call_count("AddOrder"), 0);
        assert_eq!(h.sink.last_text(OWNER), "❌ Order error: Unknown order");
    }
}
