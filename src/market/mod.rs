//! # Market Data Session
//!
//! This module owns everything on the brokerage side of the ticker.
//!
//! ## Modules
//!
//! - [`api`]: the [`MarketApi`] request/response seam and [`Endpoint`]
//! - [`xapi`]: JSON-over-TLS adapter for the xAPI brokerage server
//! - [`session`]: [`MarketSession`], a logged-in session with typed fetches
//! - [`daily_change`]: the daily change percentage computation
//! - [`types`]: quotes, candles, account snapshot
//!
//! ## Command Flow
//!
//! ```text
//! MarketSession ──execute("getTickPrices", {...})──► MarketApi ──► server
//!               ◄──────── returnData (JSON) ─────────
//! ```
//!
//! Every command is a name plus a JSON object of named arguments. The server
//! answers with a status flag and a payload; failures of any kind surface as
//! one of the three [`ApiError`](crate::error::ApiError) variants.

pub mod api;
pub mod daily_change;
pub mod session;
pub mod types;
pub mod xapi;

pub use api::{Endpoint, MarketApi};
pub use session::MarketSession;
pub use types::{AccountSnapshot, Candle, MarketSnapshot, Quote, RawQuote, SymbolInfo};
pub use xapi::XapiClient;
