//! The `/trade` conversation.
//!
//! ```text
//! AwaitDirection ─► AwaitAsset ─► AwaitPrice ─► AwaitVolumeMode ─► AwaitVolumeValue ─► AwaitConfirmation ─► submit
//!       │                                              └─── ALL ──────────────────────────────┘
//!       └─ SELL ALL ─► AwaitSellAllConfirmation ─► sell_all
//! ```
//!
//! Chat text is turned into a [`TradeInput`] first; [`advance`] is a
//! function of the current [`TradeState`] and that input. `CANCEL` leaves
//! from any state; input that does not fit the state re-prompts it.

use ktb_core::decimal::{parse_positive_input, round_volume, trim_zeros, trim_zeros_in_text};
use ktb_core::time_util::now_secs;
use ktb_core::{Direction, OrderRequest, OrderType};
use ktb_kraken::{AddOrderOutcome, ApiError};
use rust_decimal::Decimal;
use tracing::{info, warn};

use crate::chat::{self, Keyboard, labels};
use crate::context::BotContext;
use crate::{format, reservation, sell_all};

#[derive(Debug, Clone, PartialEq)]
pub enum PriceChoice {
    Limit(Decimal),
    /// Market order; `reference` is the last trade price used for estimates.
    Market { reference: Decimal },
}

impl PriceChoice {
    pub fn value(&self) -> Decimal {
        match self {
            Self::Limit(price) => *price,
            Self::Market { reference } => *reference,
        }
    }

    pub fn is_market(&self) -> bool {
        matches!(self, Self::Market { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeMode {
    /// Volume of the asset itself.
    Direct,
    /// Amount in the quote currency, divided by the price.
    QuoteAmount,
    /// Everything not reserved by open orders.
    AllAvailable,
}

/// Asset chosen for the trade and the pair it resolves to.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeTarget {
    pub direction: Direction,
    /// Display name (`"ETH"`).
    pub asset: String,
    /// Exchange pair code (`"XETHZEUR"`).
    pub pair: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingOrder {
    pub target: TradeTarget,
    pub price: PriceChoice,
    /// Cut to 8 fractional digits.
    pub volume: Decimal,
}

impl PendingOrder {
    pub fn summary(&self, quote: &str) -> String {
        let TradeTarget {
            direction, asset, ..
        } = &self.target;
        let volume = trim_zeros(self.volume);
        let head = match &self.price {
            PriceChoice::Limit(price) => {
                format!("{direction} {volume} {asset} @ limit {}", trim_zeros(*price))
            }
            PriceChoice::Market { .. } => format!("{direction} {volume} {asset} @ market price"),
        };
        let total = match self.total() {
            Some(total) => trim_zeros(total.round_dp(8)),
            None => "?".to_string(),
        };
        let approx = if self.price.is_market() { "≈ " } else { "" };
        format!("{head}\nTotal value: {approx}{total} {quote}")
    }

    /// Volume times price; `None` when it does not fit a `Decimal`.
    pub fn total(&self) -> Option<Decimal> {
        self.volume.checked_mul(self.price.value())
    }

    pub fn request(&self) -> OrderRequest {
        let (order_type, price) = match &self.price {
            PriceChoice::Limit(price) => (OrderType::Limit, Some(*price)),
            PriceChoice::Market { .. } => (OrderType::Market, None),
        };
        OrderRequest {
            direction: self.target.direction,
            pair: self.target.pair.clone(),
            order_type,
            price,
            volume: self.volume,
        }
    }
}

/// Per-chat conversation state. Each variant holds what was collected so far.
#[derive(Debug, Clone, PartialEq)]
pub enum TradeState {
    AwaitDirection,
    AwaitAsset {
        direction: Direction,
    },
    AwaitPrice {
        target: TradeTarget,
    },
    AwaitVolumeMode {
        target: TradeTarget,
        price: PriceChoice,
    },
    AwaitVolumeValue {
        target: TradeTarget,
        price: PriceChoice,
        mode: VolumeMode,
    },
    AwaitConfirmation {
        order: PendingOrder,
    },
    AwaitSellAllConfirmation,
}

/// Chat text classified for the conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum TradeInput {
    Direction(Direction),
    SellAll,
    Asset(String),
    MarketPrice,
    Mode(VolumeMode),
    /// Strictly positive decimal.
    Number(Decimal),
    Yes,
    No,
    Cancel,
    Unrecognized,
}

impl TradeInput {
    pub fn parse(text: &str, quote: &str, assets: &[String]) -> Self {
        let text = text.trim();
        let upper = text.to_ascii_uppercase();
        match upper.as_str() {
            labels::CANCEL => Self::Cancel,
            labels::YES => Self::Yes,
            labels::NO => Self::No,
            labels::BUY => Self::Direction(Direction::Buy),
            labels::SELL => Self::Direction(Direction::Sell),
            labels::SELL_ALL => Self::SellAll,
            labels::MARKET_PRICE => Self::MarketPrice,
            labels::VOLUME => Self::Mode(VolumeMode::Direct),
            labels::ALL => Self::Mode(VolumeMode::AllAvailable),
            _ if upper == quote.to_ascii_uppercase() => Self::Mode(VolumeMode::QuoteAmount),
            _ if assets.iter().any(|a| a.eq_ignore_ascii_case(text)) => Self::Asset(upper),
            _ => parse_positive_input(text)
                .map(Self::Number)
                .unwrap_or(Self::Unrecognized),
        }
    }
}

/// Open a conversation and ask for the direction.
pub async fn start(ctx: &BotContext, chat_id: i64) -> TradeState {
    let state = TradeState::AwaitDirection;
    prompt(ctx, chat_id, &state).await;
    state
}

/// Classify `text` and advance `state`. `None` ends the conversation.
pub async fn handle_text(ctx: &BotContext, chat_id: i64, state: TradeState, text: &str) -> Option<TradeState> {
    let (quote, assets) = {
        let cfg = ctx.config.read().await;
        (cfg.trade_to_currency.clone(), cfg.trade_assets.clone())
    };
    let input = TradeInput::parse(text, &quote, &assets);
    advance(ctx, chat_id, state, input).await
}

pub async fn advance(
    ctx: &BotContext,
    chat_id: i64,
    state: TradeState,
    input: TradeInput,
) -> Option<TradeState> {
    let quote = ctx.quote().await;
    let next = match (state, input) {
        (_, TradeInput::Cancel)
        | (TradeState::AwaitConfirmation { .. }, TradeInput::No)
        | (TradeState::AwaitSellAllConfirmation, TradeInput::No) => {
            ctx.send(chat_id, "Canceled", chat::main_menu()).await;
            return None;
        }

        (TradeState::AwaitDirection, TradeInput::Direction(direction)) => {
            TradeState::AwaitAsset { direction }
        }
        (TradeState::AwaitDirection, TradeInput::SellAll) => TradeState::AwaitSellAllConfirmation,

        (TradeState::AwaitAsset { direction }, TradeInput::Asset(asset)) => {
            let Some(pair) = ctx.directory.pair_for(&asset, &quote) else {
                let text = format!("❌ Kraken has no {asset}/{quote} pair");
                ctx.send(chat_id, &text, Keyboard::None).await;
                let state = TradeState::AwaitAsset { direction };
                prompt(ctx, chat_id, &state).await;
                return Some(state);
            };
            TradeState::AwaitPrice {
                target: TradeTarget {
                    direction,
                    asset,
                    pair: pair.name.clone(),
                },
            }
        }

        (TradeState::AwaitPrice { target }, TradeInput::Number(price)) => TradeState::AwaitVolumeMode {
            target,
            price: PriceChoice::Limit(price),
        },
        (TradeState::AwaitPrice { target }, TradeInput::MarketPrice) => {
            let reference = match last_price(ctx, &target.pair).await {
                Ok(price) => price,
                Err(e) => return abort(ctx, chat_id, &e).await,
            };
            let text = format!("Market price of {}: {} {quote}", target.asset, trim_zeros(reference));
            ctx.send(chat_id, &text, Keyboard::None).await;
            TradeState::AwaitVolumeMode {
                target,
                price: PriceChoice::Market { reference },
            }
        }

        (TradeState::AwaitVolumeMode { target, price }, TradeInput::Mode(VolumeMode::AllAvailable)) => {
            match all_available(ctx, chat_id, target, price, &quote).await {
                Some(state) => state,
                None => return None,
            }
        }
        (TradeState::AwaitVolumeMode { target, price }, TradeInput::Mode(mode)) => {
            TradeState::AwaitVolumeValue {
                target,
                price,
                mode,
            }
        }

        (
            TradeState::AwaitVolumeValue {
                target,
                price,
                mode,
            },
            TradeInput::Number(value),
        ) => {
            let volume = match mode {
                VolumeMode::QuoteAmount => value.checked_div(price.value()),
                VolumeMode::Direct | VolumeMode::AllAvailable => Some(value),
            };
            match volume {
                Some(volume) => check_volume(ctx, chat_id, target, price, mode, round_volume(volume)).await,
                None => too_large(ctx, chat_id, target, price, mode).await,
            }
        }

        (TradeState::AwaitConfirmation { order }, TradeInput::Yes) => {
            submit(ctx, chat_id, &order).await;
            return None;
        }
        (TradeState::AwaitSellAllConfirmation, TradeInput::Yes) => {
            sell_all::execute(ctx, chat_id).await;
            return None;
        }

        (state, _) => {
            ctx.send(chat_id, "❌ Invalid input", Keyboard::None).await;
            state
        }
    };

    prompt(ctx, chat_id, &next).await;
    Some(next)
}

/// Ask the question belonging to `state`.
async fn prompt(ctx: &BotContext, chat_id: i64, state: &TradeState) {
    let quote = ctx.quote().await;
    let (text, keyboard) = match state {
        TradeState::AwaitDirection => ("BUY or SELL?".to_string(), chat::direction_keyboard()),
        TradeState::AwaitAsset { direction } => (
            format!("Which asset do you want to {direction}?"),
            chat::asset_keyboard(&ctx.trade_assets().await),
        ),
        TradeState::AwaitPrice { target } => (
            format!("Enter price per unit of {} in {quote}", target.asset),
            chat::price_keyboard(),
        ),
        TradeState::AwaitVolumeMode { target, .. } => (
            format!(
                "How do you want to enter the amount?\n{quote}: value in {quote}\n{}: volume of {}\n{}: all available funds",
                labels::VOLUME,
                target.asset,
                labels::ALL
            ),
            chat::volume_mode_keyboard(&quote),
        ),
        TradeState::AwaitVolumeValue { target, mode, .. } => {
            let text = match mode {
                VolumeMode::QuoteAmount => format!("Enter amount in {quote}"),
                VolumeMode::Direct | VolumeMode::AllAvailable => {
                    format!("Enter volume of {}", target.asset)
                }
            };
            (text, chat::cancel_keyboard())
        }
        TradeState::AwaitConfirmation { order } => (
            format!("{}\n\nPlace order?", order.summary(&quote)),
            chat::confirm_keyboard(),
        ),
        TradeState::AwaitSellAllConfirmation => (
            format!("Cancel all open orders and sell every asset for {quote} at market price?"),
            chat::confirm_keyboard(),
        ),
    };
    ctx.send(chat_id, &text, keyboard).await;
}

/// Show the exchange error and end the conversation.
async fn abort(ctx: &BotContext, chat_id: i64, e: &ApiError) -> Option<TradeState> {
    warn!("[trade] aborted: {e}");
    ctx.send(chat_id, &format::api_error(e), chat::main_menu()).await;
    None
}

async fn last_price(ctx: &BotContext, pair: &str) -> Result<Decimal, ApiError> {
    let pairs = [pair.to_string()];
    let prices = ctx.client.ticker(&pairs).await?;
    let price = prices
        .get(pair)
        .or_else(|| prices.values().next())
        .copied()
        .ok_or_else(|| ApiError::malformed(format!("no ticker for {pair}")))?;
    if price <= Decimal::ZERO {
        return Err(ApiError::malformed(format!("last trade price of {pair} is {price}")));
    }
    Ok(price)
}

/// Minimum order volume: configured override first, then the pair's `ordermin`.
pub(crate) async fn min_order(ctx: &BotContext, asset: &str, pair: &str) -> Option<Decimal> {
    let configured = ctx
        .config
        .read()
        .await
        .min_order_sizes
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(asset))
        .map(|(_, min)| *min);
    configured.or_else(|| ctx.directory.pair(pair).and_then(|p| p.order_min))
}

async fn all_available(
    ctx: &BotContext,
    chat_id: i64,
    target: TradeTarget,
    price: PriceChoice,
    quote: &str,
) -> Option<TradeState> {
    let balances = match ctx.client.balance().await {
        Ok(b) => b,
        Err(e) => return abort(ctx, chat_id, &e).await,
    };
    let open_orders = match ctx.client.open_orders().await {
        Ok(o) => o,
        Err(e) => return abort(ctx, chat_id, &e).await,
    };
    let free = reservation::available(
        &target.asset,
        quote,
        target.direction,
        &balances,
        &open_orders,
        &ctx.directory,
    );
    let volume = match target.direction {
        Direction::Buy => free.checked_div(price.value()),
        Direction::Sell => Some(free),
    };
    let Some(volume) = volume.map(round_volume) else {
        return Some(too_large(ctx, chat_id, target, price, VolumeMode::AllAvailable).await);
    };
    info!("[trade] available for {} {}: {free} -> volume {volume}", target.direction, target.asset);
    Some(check_volume(ctx, chat_id, target, price, VolumeMode::AllAvailable, volume).await)
}

/// Back to volume entry after an amount whose volume or total overflows.
async fn too_large(
    ctx: &BotContext,
    chat_id: i64,
    target: TradeTarget,
    price: PriceChoice,
    mode: VolumeMode,
) -> TradeState {
    warn!("[trade] amount for {} {} out of range", target.direction, target.asset);
    ctx.send(chat_id, "❌ Amount too large", Keyboard::None).await;
    TradeState::AwaitVolumeValue {
        target,
        price,
        mode: direct_if_all(mode),
    }
}

fn direct_if_all(mode: VolumeMode) -> VolumeMode {
    match mode {
        VolumeMode::AllAvailable => VolumeMode::Direct,
        other => other,
    }
}

/// Confirmation if `volume` meets the minimum, otherwise back to volume entry.
async fn check_volume(
    ctx: &BotContext,
    chat_id: i64,
    target: TradeTarget,
    price: PriceChoice,
    mode: VolumeMode,
    volume: Decimal,
) -> TradeState {
    let minimum = min_order(ctx, &target.asset, &target.pair).await;
    if volume.is_zero() || minimum.is_some_and(|m| volume < m) {
        let text = match minimum {
            Some(m) => format!(
                "❌ Volume {} is below the minimum order size of {} {}",
                trim_zeros(volume),
                trim_zeros(m),
                target.asset
            ),
            None => "❌ Volume must be greater than zero".to_string(),
        };
        ctx.send(chat_id, &text, Keyboard::None).await;
        return TradeState::AwaitVolumeValue {
            target,
            price,
            mode: direct_if_all(mode),
        };
    }
    let order = PendingOrder {
        target,
        price,
        volume,
    };
    if order.total().is_none() {
        let PendingOrder { target, price, .. } = order;
        return too_large(ctx, chat_id, target, price, mode).await;
    }
    TradeState::AwaitConfirmation { order }
}

async fn submit(ctx: &BotContext, chat_id: i64, order: &PendingOrder) {
    let request = order.request();
    match ctx.client.add_order(&request).await {
        Err(e) => {
            warn!("[trade] order rejected: {e}");
            ctx.send(chat_id, &format::api_error(&e), chat::main_menu()).await;
        }
        Ok(AddOrderOutcome::Placed { txids, description }) => {
            info!("[trade] placed {txids:?}: {description}");
            let text = format!(
                "✅ Order placed: {}\n{}",
                txids.join(", "),
                trim_zeros_in_text(&description)
            );
            ctx.send(chat_id, &text, chat::main_menu()).await;
            if ctx.config.read().await.check_trade {
                for txid in &txids {
                    ctx.monitor.enroll(txid, chat_id, now_secs()).await;
                }
            }
        }
        Ok(AddOrderOutcome::Undefined(raw)) => {
            warn!("[trade] AddOrder returned neither error nor txid: {raw}");
            ctx.send(chat_id, &format!("Undefined state: {raw}"), chat::main_menu()).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;
    use crate::testing::{Harness, OWNER};

    fn assets() -> Vec<String> {
        vec!["XBT".into(), "ETH".into(), "XMR".into()]
    }

    fn eth(direction: Direction) -> TradeTarget {
        TradeTarget {
            direction,
            asset: "ETH".into(),
            pair: "XETHZEUR".into(),
        }
    }

    async fn say(h: &Harness, state: TradeState, text: &str) -> Option<TradeState> {
        handle_text(&h.ctx, OWNER, state, text).await
    }

    #[test]
    fn input_classification() {
        let a = assets();
        assert_eq!(TradeInput::parse("buy", "EUR", &a), TradeInput::Direction(Direction::Buy));
        assert_eq!(TradeInput::parse("eth", "EUR", &a), TradeInput::Asset("ETH".into()));
        assert_eq!(TradeInput::parse("EUR", "EUR", &a), TradeInput::Mode(VolumeMode::QuoteAmount));
        assert_eq!(TradeInput::parse("All", "EUR", &a), TradeInput::Mode(VolumeMode::AllAvailable));
        assert_eq!(TradeInput::parse("20,5", "EUR", &a), TradeInput::Number(dec!(20.5)));
        assert_eq!(TradeInput::parse("0", "EUR", &a), TradeInput::Unrecognized);
        assert_eq!(TradeInput::parse("-3", "EUR", &a), TradeInput::Unrecognized);
        assert_eq!(TradeInput::parse("DOGE", "EUR", &a), TradeInput::Unrecognized);
        assert_eq!(TradeInput::parse(" cancel ", "EUR", &a), TradeInput::Cancel);
    }

    #[test]
    fn summary_formats() {
        let limit = PendingOrder {
            target: eth(Direction::Sell),
            price: PriceChoice::Limit(dec!(300)),
            volume: dec!(2.00000000),
        };
        assert_eq!(limit.summary("EUR"), "sell 2 ETH @ limit 300\nTotal value: 600 EUR");

        let market = PendingOrder {
            target: eth(Direction::Buy),
            price: PriceChoice::Market { reference: dec!(301.5) },
            volume: dec!(0.5),
        };
        assert_eq!(market.summary("EUR"), "buy 0.5 ETH @ market price\nTotal value: ≈ 150.75 EUR");
        assert_eq!(market.request().order_type, OrderType::Market);
        assert_eq!(market.request().price, None);
    }

    #[tokio::test]
    async fn full_buy_with_quote_amount() {
        let h = Harness::new();
        h.exchange.respond(
            "AddOrder",
            json!({"descr": {"order": "buy 5.00000000 ETHEUR @ limit 20"}, "txid": ["OBUY1"]}),
        );

        let state = start(&h.ctx, OWNER).await;
        let state = say(&h, state, "BUY").await.unwrap();
        let state = say(&h, state, "ETH").await.unwrap();
        assert!(matches!(state, TradeState::AwaitPrice { .. }));
        let state = say(&h, state, "20").await.unwrap();
        let state = say(&h, state, "EUR").await.unwrap();
        let state = say(&h, state, "100").await.unwrap();

        let TradeState::AwaitConfirmation { order } = &state else {
            panic!("expected confirmation, got {state:?}");
        };
        assert_eq!(order.volume, dec!(5));
        assert!(h.sink.last_text(OWNER).starts_with("buy 5 ETH @ limit 20\nTotal value: 100 EUR"));

        assert_eq!(say(&h, state, "YES").await, None);
        let params = &h.exchange.calls("AddOrder")[0];
        assert!(params.contains(&("volume".into(), "5.00000000".into())));
        assert!(params.contains(&("pair".into(), "XETHZEUR".into())));
        assert!(params.contains(&("price".into(), "20".into())));
        assert!(h.sink.last_text(OWNER).contains("OBUY1"));
        assert_eq!(h.ctx.monitor.enrolled().await.len(), 1);
    }

    #[tokio::test]
    async fn sell_all_available_nets_open_sells() {
        let h = Harness::new();
        h.exchange.respond("Balance", json!({"ZEUR": "10.0", "XETH": "2.5"}));
        h.exchange.respond(
            "OpenOrders",
            json!({"open": {"OS1": {
                "status": "open",
                "descr": {"pair": "ETHEUR", "type": "sell", "ordertype": "limit",
                          "price": "400", "order": "sell 0.50000000 ETHEUR @ limit 400"},
                "vol": "0.50000000", "vol_exec": "0.00000000"
            }}}),
        );
        h.exchange.respond(
            "AddOrder",
            json!({"descr": {"order": "sell 2.00000000 ETHEUR @ limit 300"}, "txid": ["OSELL1"]}),
        );

        let state = TradeState::AwaitVolumeMode {
            target: eth(Direction::Sell),
            price: PriceChoice::Limit(dec!(300)),
        };
        let state = say(&h, state, "ALL").await.unwrap();
        let TradeState::AwaitConfirmation { order } = &state else {
            panic!("expected confirmation, got {state:?}");
        };
        assert_eq!(order.volume, dec!(2));
        assert!(h.sink.last_text(OWNER).starts_with("sell 2 ETH @ limit 300\nTotal value: 600 EUR"));

        say(&h, state, "yes").await;
        let params = &h.exchange.calls("AddOrder")[0];
        assert!(params.contains(&("volume".into(), "2.00000000".into())));
        assert!(params.contains(&("type".into(), "sell".into())));
    }

    #[tokio::test]
    async fn below_minimum_returns_to_volume_entry() {
        let h = Harness::new();
        let state = TradeState::AwaitVolumeValue {
            target: eth(Direction::Buy),
            price: PriceChoice::Limit(dec!(20)),
            mode: VolumeMode::Direct,
        };
        let next = say(&h, state.clone(), "0.001").await;
        assert_eq!(next, Some(state));
        assert!(h.sink.all_text(OWNER).contains("below the minimum order size of 0.01 ETH"));
        assert_eq!(h.exchange.call_count("AddOrder"), 0);
    }

    #[tokio::test]
    async fn all_available_below_minimum_falls_back_to_direct_entry() {
        let h = Harness::new();
        h.exchange.respond("Balance", json!({"ZEUR": "0.1"}));
        h.exchange.respond("OpenOrders", json!({"open": {}}));

        let state = TradeState::AwaitVolumeMode {
            target: eth(Direction::Buy),
            price: PriceChoice::Limit(dec!(20)),
        };
        let next = say(&h, state, "ALL").await;
        assert!(matches!(
            next,
            Some(TradeState::AwaitVolumeValue { mode: VolumeMode::Direct, .. })
        ));
        assert_eq!(h.exchange.call_count("AddOrder"), 0);
    }

    #[tokio::test]
    async fn insufficient_funds_ends_session_without_enrollment() {
        let h = Harness::new();
        h.exchange.fail("AddOrder", &["EOrder:Insufficient funds"]);
        let state = TradeState::AwaitConfirmation {
            order: PendingOrder {
                target: eth(Direction::Buy),
                price: PriceChoice::Limit(dec!(20)),
                volume: dec!(5),
            },
        };
        assert_eq!(say(&h, state, "YES").await, None);
        assert!(h.sink.last_text(OWNER).contains("Insufficient funds"));
        assert!(h.ctx.monitor.enrolled().await.is_empty());
    }

    #[tokio::test]
    async fn undefined_state_is_shown_verbatim() {
        let h = Harness::new();
        h.exchange.respond("AddOrder", json!({"descr": {"order": "?"}}));
        let state = TradeState::AwaitConfirmation {
            order: PendingOrder {
                target: eth(Direction::Sell),
                price: PriceChoice::Limit(dec!(300)),
                volume: dec!(1),
            },
        };
        assert_eq!(say(&h, state, "YES").await, None);
        assert!(h.sink.last_text(OWNER).starts_with("Undefined state: {"));
        assert!(h.ctx.monitor.enrolled().await.is_empty());
    }

    #[tokio::test]
    async fn market_price_uses_last_trade() {
        let h = Harness::new();
        h.exchange.respond("Ticker", json!({"XETHZEUR": {"c": ["250.00000", "0.1"]}}));
        let state = TradeState::AwaitPrice { target: eth(Direction::Buy) };
        let state = say(&h, state, "market price").await.unwrap();
        assert_eq!(
            state,
            TradeState::AwaitVolumeMode {
                target: eth(Direction::Buy),
                price: PriceChoice::Market { reference: dec!(250) },
            }
        );
        assert!(h.sink.all_text(OWNER).contains("Market price of ETH: 250 EUR"));
    }

    #[tokio::test]
    async fn invalid_input_reprompts_and_cancel_leaves() {
        let h = Harness::new();
        let state = TradeState::AwaitPrice { target: eth(Direction::Buy) };
        let same = say(&h, state.clone(), "1.2.3").await;
        assert_eq!(same, Some(state.clone()));
        assert!(h.sink.all_text(OWNER).contains("Invalid input"));

        assert_eq!(say(&h, state, "CANCEL").await, None);
        assert_eq!(h.sink.last_text(OWNER), "Canceled");
        assert_eq!(h.sink.last_keyboard(OWNER), chat::main_menu());
    }

    #[tokio::test]
    async fn overflowing_total_stays_in_volume_entry() {
        let h = Harness::new();
        let state = TradeState::AwaitVolumeValue {
            target: eth(Direction::Buy),
            price: PriceChoice::Limit(dec!(1000)),
            mode: VolumeMode::Direct,
        };
        let next = say(&h, state.clone(), "9999999999999999999999999999").await;
        assert_eq!(next, Some(state));
        assert!(h.sink.all_text(OWNER).contains("Amount too large"));
        assert_eq!(h.sink.last_text(OWNER), "Enter volume of ETH");
    }

    #[tokio::test]
    async fn overflowing_quote_amount_stays_in_volume_entry() {
        let h = Harness::new();
        let state = TradeState::AwaitVolumeValue {
            target: eth(Direction::Buy),
            price: PriceChoice::Limit(Decimal::new(1, 25)),
            mode: VolumeMode::QuoteAmount,
        };
        let next = say(&h, state.clone(), "99999999999999999999").await;
        assert_eq!(next, Some(state));
        assert!(h.sink.all_text(OWNER).contains("Amount too large"));
        assert_eq!(h.sink.last_text(OWNER), "Enter amount in EUR");
    }

    #[test]
    fn summary_of_unrepresentable_total() {
        let order = PendingOrder {
            target: eth(Direction::Buy),
            price: PriceChoice::Limit(dec!(1000)),
            volume: Decimal::MAX,
        };
        assert_eq!(order.total(), None);
        assert!(order.summary("EUR").ends_with("Total value: ? EUR"));
    }

    #[tokio::test]
    async fn unknown_pair_keeps_asking_for_asset() {
        let mut config = crate::testing::config();
        config.trade_assets.push("DOGE".into());
        let h = Harness::with_config(config);
        let state = TradeState::AwaitAsset { direction: Direction::Buy };
        assert_eq!(say(&h, state.clone(), "DOGE").await, Some(state));
        assert!(h.sink.all_text(OWNER).contains("no DOGE/EUR pair"));
    }
}
