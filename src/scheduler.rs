//! # Scheduler
//!
//! The control loop that keeps the market session alive and prints a report
//! every report interval until the user cancels or something breaks.
//!
//! ## States
//!
//! ```text
//! Connecting ──both sessions up──▶ Running ──cancel──────────────▶ ShuttingDown ──▶ Terminated(UserCancelled)
//!     │                              ├─ping false/timeout──────────▶ ShuttingDown ──▶ Terminated(PingFailure)
//!     │                              ├─fetch failed────────────────▶ ShuttingDown ──▶ Terminated(DataFailure)
//!     │                              └─print failed────────────────▶ ShuttingDown ──▶ Terminated(PrintFailure)
//!     └─any failure──▶ ShuttingDown ──▶ Terminated(StartupFailure)
//! ```
//!
//! ## One Tick
//!
//! | Order | Check | Action |
//! |-------|-------|--------|
//! | 1 | cancel signal | stop |
//! | 2 | keep-alive timer due | reset timer, ping |
//! | 3 | report timer due | reset timer, fetch, render, print |
//!
//! Idle ticks sleep `tick_interval`. Every external call runs under a
//! timeout so a stalled server or printer cannot hold the loop forever.
//! There is no reconnect: every failure after startup is final, and both
//! sessions are released exactly once on the way out.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use chrono::Local;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::TickerError;
use crate::market::{MarketApi, MarketSession, MarketSnapshot, Quote};
use crate::printer::PrinterSession;
use crate::render::ReportRenderer;
use crate::render::report::blank_feed;
use crate::transport::PrinterBackend;

// ============================================================================
// TERMINATION
// ============================================================================

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    UserCancelled,
    StartupFailure,
    PingFailure,
    DataFailure,
    PrintFailure,
}

impl TerminationReason {
    /// Process exit code for this reason.
    pub fn exit_code(self) -> i32 {
        match self {
            TerminationReason::UserCancelled => 0,
            TerminationReason::StartupFailure => 2,
            TerminationReason::PingFailure => 3,
            TerminationReason::DataFailure => 4,
            TerminationReason::PrintFailure => 5,
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TerminationReason::UserCancelled => "cancelled",
            TerminationReason::StartupFailure => "startup failed",
            TerminationReason::PingFailure => "ping unsuccessful",
            TerminationReason::DataFailure => "failed to get market data",
            TerminationReason::PrintFailure => "failed to communicate with printer",
        };
        f.write_str(text)
    }
}

/// Final outcome of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Termination {
    pub reason: TerminationReason,
    pub message: String,
}

impl Termination {
    pub fn new(reason: TerminationReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> i32 {
        self.reason.exit_code()
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.reason, self.message)
    }
}

/// Scheduler lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum State {
    Connecting,
    Running,
    ShuttingDown,
    Terminated(Termination),
}

/// Progress the loop reports to whoever drives the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Pinging,
    Retrieving,
    Printing,
    Waiting,
}

// ============================================================================
// CANCELLATION
// ============================================================================

/// Polled once at the start of every tick; `true` ends the run.
pub trait CancelSignal {
    fn cancelled(&mut self) -> bool;
}

impl<F: FnMut() -> bool> CancelSignal for F {
    fn cancelled(&mut self) -> bool {
        self()
    }
}

// ============================================================================
// HELPERS
// ============================================================================

/// Run `fut` with a deadline, turning expiry into [`TickerError::Timeout`].
pub async fn bounded<T, E, F>(limit: Duration, what: &str, fut: F) -> Result<T, TickerError>
where
    F: Future<Output = Result<T, E>>,
    E: Into<TickerError>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(TickerError::Timeout(format!(
            "{} did not finish within {:?}",
            what, limit
        ))),
    }
}

/// Gather everything one report needs from the market session.
///
/// Quotes are fetched in one request; category, currency and daily change
/// are then fetched per symbol in configured order; a symbol listed twice is
/// printed twice. A symbol whose daily change cannot be computed gets `0.0`;
/// any other failure, a timed-out daily change included, aborts the cycle.
pub async fn collect_snapshot<A: MarketApi>(
    market: &mut MarketSession<A>,
    config: &Config,
) -> Result<MarketSnapshot, TickerError> {
    let limit = config.call_timeout;

    let raw = bounded(limit, "getTickPrices", market.fetch_quotes(&config.symbols)).await?;

    let mut quotes = Vec::with_capacity(config.symbols.len());
    for symbol in &config.symbols {
        let Some(raw_quote) = raw.get(symbol) else {
            return Err(TickerError::Data(format!("no quotation for {}", symbol)));
        };
        let info = bounded(limit, "getSymbol", market.fetch_symbol_info(symbol)).await?;
        // an abandoned request leaves the market connection unusable
        let change = tokio::time::timeout(limit, market.fetch_daily_change(symbol, raw_quote.bid))
            .await
            .map_err(|_| {
                TickerError::Timeout(format!(
                    "getChartRangeRequest for {} did not finish within {:?}",
                    symbol, limit
                ))
            })?;
        quotes.push((symbol.clone(), Quote::new(raw_quote, &info, change)));
    }

    let account = bounded(limit, "getMarginLevel", market.fetch_account_snapshot()).await?;
    let total_profit = bounded(limit, "getTrades", market.fetch_open_profit()).await?;
    let server_time = bounded(limit, "getServerTime", market.server_time()).await?;

    Ok(MarketSnapshot {
        timestamp: server_time.with_timezone(&Local).naive_local(),
        account,
        total_profit,
        quotes,
    })
}

// ============================================================================
// SCHEDULER
// ============================================================================

/// # Scheduler
///
/// Owns both sessions for the whole run. Drive it with [`run`](Self::run),
/// or step it with [`connect`](Self::connect), [`tick`](Self::tick) and
/// [`shutdown`](Self::shutdown).
pub struct Scheduler<A: MarketApi, B: PrinterBackend, C: CancelSignal> {
    config: Config,
    renderer: ReportRenderer,
    cancel: C,
    market: Option<MarketSession<A>>,
    printer: Option<PrinterSession<B>>,
    state: State,
    next_ping: Instant,
    next_report: Instant,
    on_status: Box<dyn FnMut(Status)>,
}

impl<A: MarketApi, B: PrinterBackend, C: CancelSignal> Scheduler<A, B, C> {
    pub fn new(config: Config, renderer: ReportRenderer, cancel: C) -> Self {
        let now = Instant::now();
        Self {
            config,
            renderer,
            cancel,
            market: None,
            printer: None,
            state: State::Connecting,
            next_ping: now,
            next_report: now,
            on_status: Box::new(|_| {}),
        }
    }

    /// Report progress to `sink`.
    pub fn with_status(mut self, sink: impl FnMut(Status) + 'static) -> Self {
        self.on_status = Box::new(sink);
        self
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    /// Run until cancelled or a failure, then release both sessions.
    pub async fn run(&mut self, api: A, backend: B) -> Termination {
        if let Err(termination) = self.connect(api, backend).await {
            return self.shutdown(termination).await;
        }

        loop {
            if let Some(termination) = self.tick().await {
                return self.shutdown(termination).await;
            }
            tokio::time::sleep(self.config.tick_interval).await;
        }
    }

    /// Log in to the market, then find the printer.
    ///
    /// On success the scheduler is `Running` with both timers starting now.
    /// On failure whatever was already connected stays owned here and is
    /// released by [`shutdown`](Self::shutdown).
    pub async fn connect(&mut self, api: A, backend: B) -> Result<(), Termination> {
        self.state = State::Connecting;
        let startup = |e: TickerError| Termination::new(TerminationReason::StartupFailure, e.to_string());

        let market = bounded(
            self.config.call_timeout,
            "market login",
            MarketSession::connect(api, &self.config),
        )
        .await
        .map_err(startup)?;
        self.market = Some(market);

        let print = &self.config.print;
        info!(printer = print.printer_name.as_str(), "connecting to printer");
        let printer = PrinterSession::establish(
            backend,
            &print.printer_name,
            print.connect_attempts,
            self.config.print_timeout,
        )
        .await
        .map_err(startup)?;
        info!(device = %printer.device(), "printer ready");
        self.printer = Some(printer);

        self.enter_running();
        Ok(())
    }

    fn enter_running(&mut self) {
        let now = Instant::now();
        self.next_ping = now + self.config.ping_interval;
        self.next_report = if self.config.report_on_start {
            now
        } else {
            now + self.config.report_interval
        };
        self.state = State::Running;
        info!(
            report_minutes = self.config.report_minutes(),
            "connected, ticker running"
        );
        (self.on_status)(Status::Waiting);
    }

    /// One pass of the loop. `Some` means the run is over and the scheduler
    /// is `ShuttingDown` until [`shutdown`](Self::shutdown) runs.
    pub async fn tick(&mut self) -> Option<Termination> {
        let outcome = self.step().await;
        if outcome.is_some() && self.state == State::Running {
            self.state = State::ShuttingDown;
        }
        outcome
    }

    async fn step(&mut self) -> Option<Termination> {
        match &self.state {
            State::Running => {}
            State::Terminated(termination) => return Some(termination.clone()),
            State::Connecting | State::ShuttingDown => {
                return Some(Termination::new(
                    TerminationReason::StartupFailure,
                    "scheduler is not running",
                ));
            }
        }

        if self.cancel.cancelled() {
            return Some(Termination::new(
                TerminationReason::UserCancelled,
                "cancelled by user",
            ));
        }

        let now = Instant::now();
        let ping_due = now >= self.next_ping;
        let report_due = now >= self.next_report;

        if ping_due {
            self.next_ping = now + self.config.ping_interval;
            if !self.keep_alive().await {
                let e = TickerError::Ping("market server did not answer the keep-alive".into());
                return Some(Termination::new(TerminationReason::PingFailure, e.to_string()));
            }
        }

        if report_due {
            self.next_report = Instant::now() + self.config.report_interval;
            if let Err(termination) = self.report_cycle().await {
                return Some(termination);
            }
        }

        if ping_due || report_due {
            (self.on_status)(Status::Waiting);
        }
        None
    }

    async fn keep_alive(&mut self) -> bool {
        let Some(market) = self.market.as_mut().filter(|m| m.is_alive()) else {
            return false;
        };
        (self.on_status)(Status::Pinging);
        debug!("pinging market server");
        match tokio::time::timeout(self.config.call_timeout, market.ping()).await {
            Ok(alive) => alive,
            Err(_) => {
                warn!("ping timed out");
                false
            }
        }
    }

    async fn report_cycle(&mut self) -> Result<(), Termination> {
        let data = |e: TickerError| Termination::new(TerminationReason::DataFailure, e.to_string());
        let print = |e: TickerError| Termination::new(TerminationReason::PrintFailure, e.to_string());

        (self.on_status)(Status::Retrieving);
        let market = self
            .market
            .as_mut()
            .filter(|m| m.is_alive())
            .ok_or_else(|| data(TickerError::Data("market session closed".to_string())))?;
        let snapshot = collect_snapshot(market, &self.config).await.map_err(data)?;

        let image = self.renderer.render(&snapshot);

        (self.on_status)(Status::Printing);
        let settings = &self.config.print;
        let printer = self
            .printer
            .as_mut()
            .filter(|p| p.is_alive())
            .ok_or_else(|| print(TickerError::Print("printer session closed".to_string())))?;
        bounded(
            self.config.print_timeout,
            "print job",
            printer.submit(&image, settings.energy, settings.speed),
        )
        .await
        .map_err(print)?;

        if settings.extra_feed > 0 {
            let feed = blank_feed(printer.printer().width_dots as usize, settings.extra_feed);
            bounded(
                self.config.print_timeout,
                "paper feed",
                printer.submit(&feed, settings.feed_energy, settings.feed_speed),
            )
            .await
            .map_err(print)?;
        }

        info!(symbols = snapshot.quotes.len(), "report printed");
        Ok(())
    }

    /// Release both sessions and record the termination.
    ///
    /// Each session is taken out of the scheduler before release, so a
    /// second call finds nothing left to release.
    pub async fn shutdown(&mut self, termination: Termination) -> Termination {
        self.state = State::ShuttingDown;

        if let Some(mut printer) = self.printer.take() {
            if tokio::time::timeout(self.config.call_timeout, printer.release())
                .await
                .is_err()
            {
                warn!("printer release timed out");
            }
        }
        if let Some(mut market) = self.market.take() {
            if tokio::time::timeout(self.config.call_timeout, market.disconnect())
                .await
                .is_err()
            {
                warn!("market logout timed out");
            }
        }

        match termination.reason {
            TerminationReason::UserCancelled => info!(%termination, "ticker stopped"),
            _ => error!(%termination, "ticker stopped"),
        }
        self.state = State::Terminated(termination.clone());
        termination
    }
}
