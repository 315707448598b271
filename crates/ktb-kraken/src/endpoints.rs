//! Typed endpoint helpers and their result parsers.
//!
//! Each helper is `#[track_caller]` so the call log names the bot code that
//! asked for the data, not this module.

use std::collections::HashMap;
use std::future::Future;
use std::panic::Location;

use ktb_core::decimal::{format_volume, parse_exchange_decimal, trim_zeros};
use ktb_core::{
    AssetDirectory, Balances, Direction, OpenOrder, OrderDescription, OrderRequest, OrderStatus,
    OrderType,
};
use rust_decimal::Decimal;
use serde_json::Value;

use crate::client::KrakenClient;
use crate::error::ApiError;
use crate::Params;

/// Result of `AddOrder` when the exchange reported no error.
#[derive(Debug, Clone, PartialEq)]
pub enum AddOrderOutcome {
    Placed {
        txids: Vec<String>,
        description: String,
    },
    /// Neither an error nor a transaction id; carries the raw result.
    Undefined(Value),
}

impl KrakenClient {
    #[track_caller]
    pub fn balance(&self) -> impl Future<Output = Result<Balances, ApiError>> + Send + '_ {
        let caller = Location::caller();
        async move {
            let value = self.call_at(caller, "Balance", Vec::new(), true).await?;
            parse_balances(&value)
        }
    }

    #[track_caller]
    pub fn open_orders(&self) -> impl Future<Output = Result<Vec<OpenOrder>, ApiError>> + Send + '_ {
        let caller = Location::caller();
        async move {
            let value = self.call_at(caller, "OpenOrders", Vec::new(), true).await?;
            parse_orders(&value, "open")
        }
    }

    /// Orders closed since `start` (unix seconds).
    #[track_caller]
    pub fn closed_orders(
        &self,
        start: u64,
    ) -> impl Future<Output = Result<Vec<OpenOrder>, ApiError>> + Send + '_ {
        let caller = Location::caller();
        async move {
            let params = vec![("start".to_string(), start.to_string())];
            let value = self.call_at(caller, "ClosedOrders", params, true).await?;
            parse_orders(&value, "closed")
        }
    }

    #[track_caller]
    pub fn add_order<'a>(
        &'a self,
        order: &'a OrderRequest,
    ) -> impl Future<Output = Result<AddOrderOutcome, ApiError>> + Send + 'a {
        let caller = Location::caller();
        async move {
            let value = self
                .call_at(caller, "AddOrder", order_params(order), true)
                .await?;
            Ok(parse_add_order(value))
        }
    }

    /// Cancel one order; returns how many orders the exchange canceled.
    #[track_caller]
    pub fn cancel_order<'a>(
        &'a self,
        txid: &'a str,
    ) -> impl Future<Output = Result<u64, ApiError>> + Send + 'a {
        let caller = Location::caller();
        async move {
            let params = vec![("txid".to_string(), txid.to_string())];
            let value = self.call_at(caller, "CancelOrder", params, true).await?;
            Ok(value.get("count").and_then(Value::as_u64).unwrap_or(0))
        }
    }

    /// Last trade price per pair, keyed by the pair name the exchange returns.
    #[track_caller]
    pub fn ticker<'a>(
        &'a self,
        pairs: &'a [String],
    ) -> impl Future<Output = Result<HashMap<String, Decimal>, ApiError>> + Send + 'a {
        let caller = Location::caller();
        async move {
            let params = vec![("pair".to_string(), pairs.join(","))];
            let value = self.call_at(caller, "Ticker", params, false).await?;
            parse_ticker(&value)
        }
    }

    /// Build the asset directory from `Assets` and `AssetPairs`.
    #[track_caller]
    pub fn load_directory(&self) -> impl Future<Output = Result<AssetDirectory, ApiError>> + Send + '_ {
        let caller = Location::caller();
        async move {
            let assets = self.call_at(caller, "Assets", Vec::new(), false).await?;
            let pairs = self.call_at(caller, "AssetPairs", Vec::new(), false).await?;
            if !assets.is_object() || !pairs.is_object() {
                return Err(ApiError::malformed("asset lists are not objects"));
            }
            let mut directory = AssetDirectory::new();
            directory.load_assets(&assets);
            directory.load_asset_pairs(&pairs);
            Ok(directory)
        }
    }
}

/// `AddOrder` parameters. Volume always carries 8 fractional digits.
pub fn order_params(order: &OrderRequest) -> Params {
    let mut params = vec![
        ("type".to_string(), order.direction.as_str().to_string()),
        ("ordertype".to_string(), order.order_type.as_str().to_string()),
        ("pair".to_string(), order.pair.clone()),
        ("volume".to_string(), format_volume(order.volume)),
    ];
    if let (OrderType::Limit, Some(price)) = (order.order_type, order.price) {
        params.push(("price".to_string(), trim_zeros(price)));
    }
    params
}

pub fn parse_balances(value: &Value) -> Result<Balances, ApiError> {
    let Some(map) = value.as_object() else {
        return Err(ApiError::malformed("balance is not an object"));
    };
    map.iter()
        .map(|(code, amount)| {
            let amount = amount
                .as_str()
                .ok_or_else(|| ApiError::malformed(format!("balance of {code}")))?;
            let amount = parse_exchange_decimal(amount).map_err(ApiError::malformed)?;
            Ok((code.clone(), amount))
        })
        .collect()
}

/// Parse the `open` or `closed` map of an orders result, oldest first.
pub fn parse_orders(value: &Value, key: &str) -> Result<Vec<OpenOrder>, ApiError> {
    let Some(map) = value.get(key).and_then(Value::as_object) else {
        return Err(ApiError::malformed(format!("missing `{key}` orders")));
    };
    let mut orders: Vec<(f64, OpenOrder)> = map
        .iter()
        .map(|(txid, info)| {
            let opened = info.get("opentm").and_then(Value::as_f64).unwrap_or(0.0);
            parse_order(txid, info).map(|o| (opened, o))
        })
        .collect::<Result<_, _>>()?;
    orders.sort_by(|a, b| a.0.total_cmp(&b.0));
    Ok(orders.into_iter().map(|(_, o)| o).collect())
}

fn decimal_field(value: Option<&Value>, key: &str) -> Option<Decimal> {
    value?
        .get(key)?
        .as_str()
        .and_then(|s| parse_exchange_decimal(s).ok())
}

fn parse_order(txid: &str, info: &Value) -> Result<OpenOrder, ApiError> {
    let descr = info.get("descr");
    let text = descr
        .and_then(|d| d.get("order"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let fallback = OrderDescription::parse(&text);
    let str_field = |key: &str| descr.and_then(|d| d.get(key)).and_then(Value::as_str);

    let direction = str_field("type")
        .and_then(|t| t.parse::<Direction>().ok())
        .or(fallback.as_ref().map(|f| f.direction))
        .ok_or_else(|| ApiError::malformed(format!("order {txid} has no type")))?;
    let pair = str_field("pair")
        .map(str::to_string)
        .or(fallback.as_ref().map(|f| f.pair.clone()))
        .ok_or_else(|| ApiError::malformed(format!("order {txid} has no pair")))?;
    let order_type = str_field("ordertype")
        .map(OrderType::from_kraken)
        .or(fallback.as_ref().map(|f| f.order_type))
        .unwrap_or(OrderType::Other);
    let price = decimal_field(descr, "price")
        .filter(|p| !p.is_zero())
        .or(fallback.as_ref().and_then(|f| f.price))
        .or(decimal_field(Some(info), "price"))
        .unwrap_or(Decimal::ZERO);
    let volume = decimal_field(Some(info), "vol")
        .or(fallback.as_ref().map(|f| f.volume))
        .ok_or_else(|| ApiError::malformed(format!("order {txid} has no volume")))?;

    Ok(OpenOrder {
        txid: txid.to_string(),
        direction,
        pair,
        order_type,
        price,
        volume,
        executed_volume: decimal_field(Some(info), "vol_exec").unwrap_or(Decimal::ZERO),
        status: info
            .get("status")
            .and_then(Value::as_str)
            .map(OrderStatus::from_kraken)
            .unwrap_or(OrderStatus::Open),
        description: text,
        close_time: info.get("closetm").and_then(Value::as_f64),
    })
}

pub fn parse_add_order(value: Value) -> AddOrderOutcome {
    let txids: Vec<String> = value
        .get("txid")
        .and_then(Value::as_array)
        .map(|ids| {
            ids.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    if txids.is_empty() {
        return AddOrderOutcome::Undefined(value);
    }
    let description = value
        .get("descr")
        .and_then(|d| d.get("order"))
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    AddOrderOutcome::Placed { txids, description }
}

pub fn parse_ticker(value: &Value) -> Result<HashMap<String, Decimal>, ApiError> {
    let Some(map) = value.as_object() else {
        return Err(ApiError::malformed("ticker is not an object"));
    };
    map.iter()
        .map(|(pair, info)| {
            let last = info
                .get("c")
                .and_then(|c| c.get(0))
                .and_then(Value::as_str)
                .ok_or_else(|| ApiError::malformed(format!("no last trade for {pair}")))?;
            let price = parse_exchange_decimal(last).map_err(ApiError::malformed)?;
            Ok((pair.clone(), price))
        })
        .collect()
}
