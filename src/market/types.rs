//! Market data records.
//!
//! Wire records (`Deserialize`) mirror the server's JSON field names;
//! the rest are the ticker's own view of one report cycle.

use chrono::NaiveDateTime;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::ApiError;

/// One entry of a bulk quote response.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawQuote {
    pub symbol: String,
    pub ask: f64,
    pub bid: f64,
    /// Spread in the provider's native precision
    #[serde(rename = "spreadTable")]
    pub spread_table: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TickPrices {
    pub quotations: Vec<RawQuote>,
}

/// Symbol metadata.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SymbolInfo {
    #[serde(rename = "categoryName")]
    pub category_name: String,
    pub currency: String,
    #[serde(default)]
    pub digits: u32,
}

/// A daily candle in absolute price points (`price * 10^digits`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    /// Candle start, milliseconds since the Unix epoch
    pub ctm: i64,
    pub open: f64,
    pub close: f64,
}

/// Candle as sent by the server: `close` is a shift from `open`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub(crate) struct WireCandle {
    pub ctm: i64,
    pub open: f64,
    pub close: f64,
}

impl From<WireCandle> for Candle {
    fn from(wire: WireCandle) -> Self {
        Candle {
            ctm: wire.ctm,
            open: wire.open,
            close: wire.open + wire.close,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ChartRange {
    pub digits: u32,
    #[serde(rename = "rateInfos")]
    pub rate_infos: Vec<WireCandle>,
}

/// Account margin snapshot.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AccountSnapshot {
    pub equity: f64,
    pub currency: String,
    #[serde(rename = "margin_free")]
    pub free_margin: f64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenTrade {
    #[serde(default)]
    pub profit: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServerTime {
    pub time: i64,
}

/// Everything the report shows for one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct Quote {
    pub ask: f64,
    pub bid: f64,
    pub spread: f64,
    pub category: String,
    pub currency: String,
    pub daily_change_percent: f64,
}

impl Quote {
    pub fn new(raw: &RawQuote, info: &SymbolInfo, daily_change_percent: f64) -> Self {
        Self {
            ask: raw.ask,
            bid: raw.bid,
            spread: raw.spread_table,
            category: info.category_name.clone(),
            currency: info.currency.clone(),
            daily_change_percent,
        }
    }
}

/// Input of one report: fetched fresh every cycle, never kept.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSnapshot {
    /// Server time, in the local timezone of this machine
    pub timestamp: NaiveDateTime,
    pub account: AccountSnapshot,
    pub total_profit: f64,
    /// In configured symbol order
    pub quotes: Vec<(String, Quote)>,
}

/// Decode a command payload into a typed record.
pub(crate) fn decode<T: DeserializeOwned>(command: &str, payload: Value) -> Result<T, ApiError> {
    serde_json::from_value(payload)
        .map_err(|e| ApiError::MalformedPayload(format!("{}: {}", command, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_candle_close_is_shift() {
        let wire: WireCandle =
            serde_json::from_value(json!({"ctm": 1, "open": 10000.0, "close": -250.0, "vol": 3}))
                .unwrap();
        let candle = Candle::from(wire);
        assert_eq!(candle.open, 10000.0);
        assert_eq!(candle.close, 9750.0);
    }

    #[test]
    fn test_decode_account_snapshot() {
        let payload = json!({
            "balance": 995800.0, "credit": 0.0, "currency": "PLN",
            "equity": 995985.9, "margin": 572634.43, "margin_free": 423351.47,
            "margin_level": 173.93
        });
        let account: AccountSnapshot = decode("getMarginLevel", payload).unwrap();
        assert_eq!(account.currency, "PLN");
        assert_eq!(account.free_margin, 423351.47);
    }

    #[test]
    fn test_decode_missing_field() {
        let err = decode::<SymbolInfo>("getSymbol", json!({"currency": "USD"})).unwrap_err();
        assert!(matches!(err, ApiError::MalformedPayload(_)));
        assert!(err.to_string().contains("getSymbol"));
    }

    #[test]
    fn test_open_trade_null_profit() {
        let trade: OpenTrade = serde_json::from_value(json!({"profit": null})).unwrap();
        assert_eq!(trade.profit, None);
    }
}
