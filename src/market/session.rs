//! # Market Session
//!
//! A logged-in connection to the quote provider with typed fetches on top of
//! [`MarketApi`].
//!
//! ## Failure Policy
//!
//! | Operation | On failure |
//! |-----------|------------|
//! | `connect` | `Auth` or `Connect` error, transport closed |
//! | `ping` | `false`, never an error |
//! | `fetch_quotes`, `fetch_symbol_info`, `fetch_account_snapshot`, ... | [`ApiError`] |
//! | `fetch_daily_change` | `0.0` |
//! | `disconnect` | nothing, idempotent |

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::api::MarketApi;
use super::daily_change::daily_change;
use super::types::{
    AccountSnapshot, Candle, ChartRange, OpenTrade, RawQuote, ServerTime, SymbolInfo, TickPrices,
    decode,
};
use super::xapi::LOGIN_COMMAND;
use crate::config::Config;
use crate::error::{ApiError, TickerError};

/// Name the session announces at login
pub const APP_NAME: &str = "cat-ticker";

/// Daily candles requested per symbol (counted back from now). Weekends and
/// holidays mean fewer than five trading days may come back.
const DAILY_CANDLE_TICKS: i64 = -5;

/// Candle period in minutes
const DAILY_PERIOD_MINUTES: u32 = 24 * 60;

/// # Market Session
pub struct MarketSession<A: MarketApi> {
    api: A,
    exchange_tz: Tz,
    connected: bool,
}

impl<A: MarketApi> MarketSession<A> {
    /// Open the endpoint selected by the account kind and log in.
    ///
    /// ## Errors
    ///
    /// - [`TickerError::Connect`] if the server cannot be reached
    /// - [`TickerError::Auth`] if the credentials are refused
    pub async fn connect(mut api: A, config: &Config) -> Result<Self, TickerError> {
        let endpoint = config.endpoint();
        let credentials = &config.credentials;
        info!(%endpoint, account = %credentials.account, "connecting to market server");

        if let Err(e) = api.open(&endpoint).await {
            api.close().await;
            return Err(TickerError::Connect(e.to_string()));
        }

        let arguments = json!({
            "userId": credentials.user_id,
            "password": credentials.password,
            "appName": APP_NAME,
        });

        match api.execute(LOGIN_COMMAND, Some(arguments)).await {
            Ok(_) => {
                info!(user_id = credentials.user_id, "logged in");
                Ok(Self {
                    api,
                    exchange_tz: config.exchange_tz,
                    connected: true,
                })
            }
            Err(e) => {
                api.close().await;
                Err(match e {
                    ApiError::AuthRejected(msg) => TickerError::Auth(msg),
                    ApiError::Unreachable(msg) | ApiError::MalformedPayload(msg) => {
                        TickerError::Connect(msg)
                    }
                })
            }
        }
    }

    /// Whether the session has not been disconnected yet.
    pub fn is_alive(&self) -> bool {
        self.connected
    }

    async fn call(&mut self, command: &str, arguments: Option<Value>) -> Result<Value, ApiError> {
        if !self.connected {
            return Err(ApiError::Unreachable("session closed".to_string()));
        }
        self.api.execute(command, arguments).await
    }

    /// Send a keep-alive. `false` means the session must be presumed dead.
    pub async fn ping(&mut self) -> bool {
        match self.call("ping", None).await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "ping not acknowledged");
                false
            }
        }
    }

    /// Fetch current quotes for all `symbols` in one request.
    ///
    /// Fails with [`ApiError::MalformedPayload`] when the response is empty
    /// or lacks any of the requested symbols.
    pub async fn fetch_quotes(
        &mut self,
        symbols: &[String],
    ) -> Result<HashMap<String, RawQuote>, ApiError> {
        let command = "getTickPrices";
        let payload = self
            .call(command, Some(json!({ "symbols": symbols, "level": 0, "timestamp": 0 })))
            .await?;
        let prices: TickPrices = decode(command, payload)?;

        if prices.quotations.is_empty() {
            return Err(ApiError::MalformedPayload(format!("{}: no quotations", command)));
        }

        let quotes: HashMap<String, RawQuote> = prices
            .quotations
            .into_iter()
            .map(|q| (q.symbol.clone(), q))
            .collect();

        if let Some(missing) = symbols.iter().find(|s| !quotes.contains_key(s.as_str())) {
            return Err(ApiError::MalformedPayload(format!(
                "{}: no quotation for {}",
                command, missing
            )));
        }

        debug!(count = quotes.len(), "quotes fetched");
        Ok(quotes)
    }

    /// Fetch category, currency and precision of one symbol.
    pub async fn fetch_symbol_info(&mut self, symbol: &str) -> Result<SymbolInfo, ApiError> {
        let command = "getSymbol";
        let payload = self.call(command, Some(json!({ "symbol": symbol }))).await?;
        decode(command, payload)
    }

    /// Daily change of `current_price` in percent; `0.0` on any anomaly.
    pub async fn fetch_daily_change(&mut self, symbol: &str, current_price: f64) -> f64 {
        self.fetch_daily_change_at(symbol, current_price, Utc::now()).await
    }

    /// [`fetch_daily_change`](Self::fetch_daily_change) anchored at `now`.
    pub async fn fetch_daily_change_at(
        &mut self,
        symbol: &str,
        current_price: f64,
        now: DateTime<Utc>,
    ) -> f64 {
        let command = "getChartRangeRequest";
        let arguments = json!({
            "info": {
                "symbol": symbol,
                "ticks": DAILY_CANDLE_TICKS,
                "period": DAILY_PERIOD_MINUTES,
                "start": now.timestamp_millis(),
            }
        });

        let range: ChartRange = match self.call(command, Some(arguments)).await {
            Ok(payload) => match decode(command, payload) {
                Ok(range) => range,
                Err(e) => {
                    debug!(symbol, error = %e, "no usable daily candles");
                    return 0.0;
                }
            },
            Err(e) => {
                debug!(symbol, error = %e, "daily candles unavailable");
                return 0.0;
            }
        };

        let candles: Vec<Candle> = range.rate_infos.into_iter().map(Candle::from).collect();
        daily_change(&candles, range.digits, current_price, now, self.exchange_tz)
    }

    /// Fetch equity, currency and free margin.
    pub async fn fetch_account_snapshot(&mut self) -> Result<AccountSnapshot, ApiError> {
        let command = "getMarginLevel";
        let payload = self.call(command, None).await?;
        decode(command, payload)
    }

    /// Sum of the profits of all open positions.
    pub async fn fetch_open_profit(&mut self) -> Result<f64, ApiError> {
        let command = "getTrades";
        let payload = self.call(command, Some(json!({ "openedOnly": true }))).await?;
        let trades: Vec<OpenTrade> = decode(command, payload)?;
        Ok(trades.iter().filter_map(|t| t.profit).sum())
    }

    /// Current server time.
    pub async fn server_time(&mut self) -> Result<DateTime<Utc>, ApiError> {
        let command = "getServerTime";
        let payload = self.call(command, None).await?;
        let time: ServerTime = decode(command, payload)?;
        Utc.timestamp_millis_opt(time.time)
            .single()
            .ok_or_else(|| ApiError::MalformedPayload(format!("{}: bad timestamp {}", command, time.time)))
    }

    /// The provider's full symbol catalogue, as returned.
    pub async fn all_symbols(&mut self) -> Result<Value, ApiError> {
        self.call("getAllSymbols", None).await
    }

    /// Log out and close. Safe to call any number of times.
    pub async fn disconnect(&mut self) {
        if self.connected {
            self.connected = false;
            self.api.close().await;
            info!("market session closed");
        }
    }
}
