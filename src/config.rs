//! # Configuration
//!
//! Process configuration is read once at startup and frozen into an
//! immutable [`Config`], which is passed by reference to the scheduler and
//! both sessions.
//!
//! ## Layering
//!
//! ```text
//! built-in defaults  <  JSON file (--config)  <  CLI flags / environment
//! ```
//!
//! Every layer is a [`PartialConfig`]; [`PartialConfig::merge`] lets the
//! right-hand side win field by field and [`PartialConfig::resolve`]
//! validates the result. Credentials and the printer name have no defaults;
//! the binary prompts for them interactively before resolving.
//!
//! ## Example file
//!
//! ```json
//! {
//!   "user_id": 1234567,
//!   "account": "demo",
//!   "symbols": ["EURUSD", "GOLD"],
//!   "printer_name": "GB02",
//!   "report_minutes": 15
//! }
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::TickerError;
use crate::market::Endpoint;

/// Symbols printed when none are configured.
pub const DEFAULT_SYMBOLS: &[&str] = &[
    // ETF
    "SXR8.DE", "SXRV.DE", "XDWT.DE",
    // stocks
    "MSFT.US_9", "AAPL.US_9", "IBM.US_9", "META.US_9",
    // forex CFD
    "EURUSD", "EURCHF",
    // crypto CFD
    "BITCOIN", "ETHEREUM",
    // commodity CFD
    "GOLD", "OIL", "NATGAS",
];

/// The provider recommends one ping every 10 minutes.
pub const DEFAULT_PING_MINUTES: u64 = 10;
pub const DEFAULT_REPORT_MINUTES: u64 = 15;
pub const DEFAULT_TICK_MS: u64 = 500;

pub const DEFAULT_MARKET_HOST: &str = "xapi.xtb.com";

/// Candle timestamps from the provider are in this zone.
pub const DEFAULT_EXCHANGE_TZ: &str = "Europe/Warsaw";

pub const DEFAULT_CONNECT_ATTEMPTS: u32 = 3;
pub const DEFAULT_CALL_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_PRINT_TIMEOUT_SECS: u64 = 120;

/// Longest accepted ping or report interval (one week).
pub const MAX_INTERVAL_MINUTES: u64 = 7 * 24 * 60;
/// Longest accepted call or print deadline (one day).
pub const MAX_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Thermal energy and speed for the report itself (darkest, slow).
pub const DEFAULT_ENERGY: u16 = 0xffff;
pub const DEFAULT_SPEED: u16 = 64;

/// Thermal energy and speed for the trailing blank feed.
pub const DEFAULT_FEED_ENERGY: u16 = 0x4000;
pub const DEFAULT_FEED_SPEED: u16 = 8;

/// Printer name recorded by [`PartialConfig::resolve_without_printer`]
pub const NO_PRINTER: &str = "-";

// ============================================================================
// CREDENTIALS
// ============================================================================

/// Which brokerage account the session logs into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Real,
    Demo,
}

impl AccountKind {
    /// TLS port of the request/response endpoint for this account kind.
    pub fn port(self) -> u16 {
        match self {
            AccountKind::Real => 5112,
            AccountKind::Demo => 5124,
        }
    }

    /// Upper-case label used in the report footer.
    pub fn label(self) -> &'static str {
        match self {
            AccountKind::Real => "REAL",
            AccountKind::Demo => "DEMO",
        }
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Login credentials for the market session.
#[derive(Clone)]
pub struct Credentials {
    pub user_id: u64,
    pub password: String,
    pub account: AccountKind,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user_id", &self.user_id)
            .field("password", &"<redacted>")
            .field("account", &self.account)
            .finish()
    }
}

// ============================================================================
// RESOLVED CONFIG
// ============================================================================

/// Printer-side settings.
#[derive(Debug, Clone)]
pub struct PrintSettings {
    /// Advertised Bluetooth name of the target printer
    pub printer_name: String,
    pub energy: u16,
    pub speed: u16,
    pub feed_energy: u16,
    pub feed_speed: u16,
    /// Height in dots of the blank feed printed after each report (0 = off)
    pub extra_feed: u16,
    /// Discovery + connect attempts at startup
    pub connect_attempts: u32,
}

/// Immutable run configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    /// Ordered, non-empty; order is the report's line order
    pub symbols: Vec<String>,
    pub ping_interval: Duration,
    pub report_interval: Duration,
    /// Idle sleep between scheduler ticks
    pub tick_interval: Duration,
    /// Deadline for each market call
    pub call_timeout: Duration,
    /// Deadline for one print job and for each printer connect attempt
    pub print_timeout: Duration,
    /// Run the first report on the first tick instead of after one interval
    pub report_on_start: bool,
    pub market_host: String,
    pub exchange_tz: Tz,
    /// Monospaced TrueType font; the embedded bitmap font when unset
    pub font_path: Option<PathBuf>,
    pub print: PrintSettings,
}

impl Config {
    /// Market endpoint selected by the account kind.
    pub fn endpoint(&self) -> Endpoint {
        Endpoint {
            host: self.market_host.clone(),
            port: self.credentials.account.port(),
        }
    }

    /// Report cadence in whole minutes, as printed in the header.
    pub fn report_minutes(&self) -> u64 {
        self.report_interval.as_secs() / 60
    }
}

// ============================================================================
// PARTIAL CONFIG (LAYERS)
// ============================================================================

/// One configuration layer. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PartialConfig {
    pub user_id: Option<u64>,
    pub password: Option<String>,
    pub account: Option<AccountKind>,
    pub symbols: Option<Vec<String>>,
    pub ping_minutes: Option<u64>,
    pub report_minutes: Option<u64>,
    pub printer_name: Option<String>,
    pub font_path: Option<PathBuf>,
    pub extra_feed: Option<u16>,
    pub energy: Option<u16>,
    pub speed: Option<u16>,
    pub feed_energy: Option<u16>,
    pub feed_speed: Option<u16>,
    pub connect_attempts: Option<u32>,
    pub timezone: Option<String>,
    pub market_host: Option<String>,
    pub call_timeout_secs: Option<u64>,
    pub print_timeout_secs: Option<u64>,
    pub report_on_start: Option<bool>,
}

impl PartialConfig {
    /// Parse a layer from JSON text.
    pub fn from_json(text: &str) -> Result<Self, TickerError> {
        serde_json::from_str(text).map_err(|e| TickerError::Config(format!("invalid config: {}", e)))
    }

    /// Read a layer from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, TickerError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            TickerError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }

    /// Overlay `other` on top of `self`; fields set in `other` win.
    pub fn merge(self, other: PartialConfig) -> Self {
        Self {
            user_id: other.user_id.or(self.user_id),
            password: other.password.or(self.password),
            account: other.account.or(self.account),
            symbols: other.symbols.or(self.symbols),
            ping_minutes: other.ping_minutes.or(self.ping_minutes),
            report_minutes: other.report_minutes.or(self.report_minutes),
            printer_name: other.printer_name.or(self.printer_name),
            font_path: other.font_path.or(self.font_path),
            extra_feed: other.extra_feed.or(self.extra_feed),
            energy: other.energy.or(self.energy),
            speed: other.speed.or(self.speed),
            feed_energy: other.feed_energy.or(self.feed_energy),
            feed_speed: other.feed_speed.or(self.feed_speed),
            connect_attempts: other.connect_attempts.or(self.connect_attempts),
            timezone: other.timezone.or(self.timezone),
            market_host: other.market_host.or(self.market_host),
            call_timeout_secs: other.call_timeout_secs.or(self.call_timeout_secs),
            print_timeout_secs: other.print_timeout_secs.or(self.print_timeout_secs),
            report_on_start: other.report_on_start.or(self.report_on_start),
        }
    }

    /// Fill defaults, validate and freeze.
    pub fn resolve(self) -> Result<Config, TickerError> {
        let user_id = self
            .user_id
            .filter(|&id| id != 0)
            .ok_or_else(|| TickerError::Config("user id is required".to_string()))?;
        let password = self
            .password
            .filter(|p| !p.is_empty())
            .ok_or_else(|| TickerError::Config("password is required".to_string()))?;
        let account = self
            .account
            .ok_or_else(|| TickerError::Config("account kind is required".to_string()))?;
        let printer_name = self
            .printer_name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| TickerError::Config("printer name is required".to_string()))?;

        let symbols = self
            .symbols
            .unwrap_or_else(|| DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect());
        if symbols.is_empty() {
            return Err(TickerError::Config("symbol list is empty".to_string()));
        }
        if symbols.iter().any(|s| s.trim().is_empty()) {
            return Err(TickerError::Config("symbol list contains a blank entry".to_string()));
        }

        let ping_minutes = bounded(
            "ping_minutes",
            self.ping_minutes.unwrap_or(DEFAULT_PING_MINUTES),
            MAX_INTERVAL_MINUTES,
        )?;
        let report_minutes = bounded(
            "report_minutes",
            self.report_minutes.unwrap_or(DEFAULT_REPORT_MINUTES),
            MAX_INTERVAL_MINUTES,
        )?;
        let call_timeout = bounded(
            "call_timeout_secs",
            self.call_timeout_secs.unwrap_or(DEFAULT_CALL_TIMEOUT_SECS),
            MAX_TIMEOUT_SECS,
        )?;
        let print_timeout = bounded(
            "print_timeout_secs",
            self.print_timeout_secs.unwrap_or(DEFAULT_PRINT_TIMEOUT_SECS),
            MAX_TIMEOUT_SECS,
        )?;

        let speed = self.speed.unwrap_or(DEFAULT_SPEED);
        let feed_speed = self.feed_speed.unwrap_or(DEFAULT_FEED_SPEED);
        for (name, value) in [("speed", speed), ("feed_speed", feed_speed)] {
            if value == 0 || value > u8::MAX as u16 {
                return Err(TickerError::Config(format!(
                    "{} must be in 1..=255, got {}",
                    name, value
                )));
            }
        }

        let connect_attempts = self.connect_attempts.unwrap_or(DEFAULT_CONNECT_ATTEMPTS);
        if connect_attempts == 0 {
            return Err(TickerError::Config("connect_attempts must be at least 1".to_string()));
        }

        let tz_name = self.timezone.as_deref().unwrap_or(DEFAULT_EXCHANGE_TZ);
        let exchange_tz: Tz = tz_name
            .parse()
            .map_err(|e| TickerError::Config(format!("unknown timezone '{}': {}", tz_name, e)))?;

        Ok(Config {
            credentials: Credentials {
                user_id,
                password,
                account,
            },
            symbols,
            ping_interval: Duration::from_secs(ping_minutes * 60),
            report_interval: Duration::from_secs(report_minutes * 60),
            tick_interval: Duration::from_millis(DEFAULT_TICK_MS),
            call_timeout: Duration::from_secs(call_timeout),
            print_timeout: Duration::from_secs(print_timeout),
            report_on_start: self.report_on_start.unwrap_or(false),
            market_host: self
                .market_host
                .unwrap_or_else(|| DEFAULT_MARKET_HOST.to_string()),
            exchange_tz,
            font_path: self.font_path,
            print: PrintSettings {
                printer_name,
                energy: self.energy.unwrap_or(DEFAULT_ENERGY),
                speed,
                feed_energy: self.feed_energy.unwrap_or(DEFAULT_FEED_ENERGY),
                feed_speed,
                extra_feed: self.extra_feed.unwrap_or(0),
                connect_attempts,
            },
        })
    }

    /// Resolve for commands that never open the printer (`preview`,
    /// `symbols`); a missing printer name is not an error there.
    pub fn resolve_without_printer(mut self) -> Result<Config, TickerError> {
        if self.printer_name.as_deref().is_none_or(|n| n.trim().is_empty()) {
            self.printer_name = Some(NO_PRINTER.to_string());
        }
        self.resolve()
    }
}

fn bounded(name: &str, value: u64, max: u64) -> Result<u64, TickerError> {
    if value == 0 {
        Err(TickerError::Config(format!("{} must be positive", name)))
    } else if value > max {
        Err(TickerError::Config(format!("{} must be at most {}", name, max)))
    } else {
        Ok(value)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn complete() -> PartialConfig {
        PartialConfig {
            user_id: Some(42),
            password: Some("hunter2".into()),
            account: Some(AccountKind::Demo),
            printer_name: Some("GB02".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_defaults() {
        let config = complete().resolve().unwrap();
        assert_eq!(config.symbols.len(), DEFAULT_SYMBOLS.len());
        assert_eq!(config.ping_interval, Duration::from_secs(600));
        assert_eq!(config.report_interval, Duration::from_secs(900));
        assert_eq!(config.tick_interval, Duration::from_millis(500));
        assert_eq!(config.report_minutes(), 15);
        assert_eq!(config.exchange_tz, chrono_tz::Europe::Warsaw);
        assert_eq!(config.print.energy, 0xffff);
        assert_eq!(config.print.speed, 64);
        assert_eq!(config.print.extra_feed, 0);
        assert_eq!(config.print.connect_attempts, 3);
        assert!(!config.report_on_start);
    }

    #[test]
    fn test_endpoint_by_account_kind() {
        let mut partial = complete();
        assert_eq!(partial.clone().resolve().unwrap().endpoint().port, 5124);
        partial.account = Some(AccountKind::Real);
        let endpoint = partial.resolve().unwrap().endpoint();
        assert_eq!(endpoint.host, "xapi.xtb.com");
        assert_eq!(endpoint.port, 5112);
    }

    #[test]
    fn test_merge_prefers_override() {
        let file = PartialConfig::from_json(r#"{"report_minutes": 5, "symbols": ["GOLD"]}"#).unwrap();
        let cli = PartialConfig {
            report_minutes: Some(1),
            ..Default::default()
        };
        let config = complete().merge(file).merge(cli).resolve().unwrap();
        assert_eq!(config.report_interval, Duration::from_secs(60));
        assert_eq!(config.symbols, vec!["GOLD".to_string()]);
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(PartialConfig::from_json(r#"{"colour": "red"}"#).is_err());
    }

    #[test]
    fn test_missing_credentials() {
        let mut partial = complete();
        partial.password = None;
        assert!(matches!(partial.resolve(), Err(TickerError::Config(_))));

        let mut partial = complete();
        partial.user_id = Some(0);
        assert!(partial.resolve().is_err());
    }

    #[test]
    fn test_printer_name_optional_without_printer() {
        let mut partial = complete();
        partial.printer_name = None;
        assert!(partial.clone().resolve().is_err());
        let config = partial.resolve_without_printer().unwrap();
        assert_eq!(config.print.printer_name, NO_PRINTER);
    }

    #[test]
    fn test_empty_symbols_rejected() {
        let mut partial = complete();
        partial.symbols = Some(vec![]);
        assert!(partial.resolve().is_err());
    }

    #[test]
    fn test_speed_range() {
        let mut partial = complete();
        partial.speed = Some(256);
        assert!(partial.resolve().is_err());
    }

    #[test]
    fn test_interval_bounds() {
        let mut partial = complete();
        partial.ping_minutes = Some(u64::MAX);
        assert!(matches!(partial.resolve(), Err(TickerError::Config(_))));

        let mut partial = complete();
        partial.report_minutes = Some(MAX_INTERVAL_MINUTES + 1);
        assert!(partial.resolve().is_err());

        let mut partial = complete();
        partial.report_minutes = Some(MAX_INTERVAL_MINUTES);
        let config = partial.resolve().unwrap();
        assert_eq!(config.report_interval, Duration::from_secs(7 * 24 * 3600));

        let mut partial = complete();
        partial.call_timeout_secs = Some(u64::MAX);
        assert!(partial.resolve().is_err());

        let mut partial = complete();
        partial.report_minutes = Some(0);
        assert!(partial.resolve().is_err());
    }

    #[test]
    fn test_bad_timezone() {
        let mut partial = complete();
        partial.timezone = Some("Mars/Olympus".into());
        assert!(partial.resolve().is_err());
    }

    #[test]
    fn test_password_not_in_debug() {
        let config = complete().resolve().unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }
}
