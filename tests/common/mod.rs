//! In-memory market server and printer for integration tests.
//!
//! Both mocks append to one shared [`Log`] so tests can assert on the order
//! of calls across the two sessions.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cat_ticker::config::{AccountKind, Config, PartialConfig};
use cat_ticker::error::{ApiError, TickerError};
use cat_ticker::market::{Endpoint, MarketApi};
use cat_ticker::protocol::commands::{CMD_DRAW_BITMAP, CMD_FEED_PAPER, CMD_LATTICE, MAGIC};
use cat_ticker::transport::{DeviceDescriptor, PrinterBackend};
use chrono::Utc;
use serde_json::{Value, json};

pub const PRINTER: &str = "GB01";
pub const PRINTER_ADDRESS: &str = "AA:BB:CC:DD:EE:01";

/// Shared call log.
#[derive(Debug, Clone, Default)]
pub struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.entries().iter().filter(|e| *e == entry).count()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().position(|e| e == entry)
    }
}

/// Test configuration: two symbols, 1 min ping, 2 min report.
pub fn config() -> Config {
    partial().resolve().unwrap()
}

pub fn partial() -> PartialConfig {
    PartialConfig {
        user_id: Some(1000),
        password: Some("secret".into()),
        account: Some(AccountKind::Demo),
        printer_name: Some(PRINTER.into()),
        symbols: Some(vec!["AAA".into(), "BBB".into()]),
        ping_minutes: Some(1),
        report_minutes: Some(2),
        ..Default::default()
    }
}

// ============================================================================
// MARKET
// ============================================================================

/// What the mock market server answers.
#[derive(Debug, Clone, Default)]
pub struct MarketScript {
    pub open_error: Option<ApiError>,
    pub login_error: Option<ApiError>,
    /// Ping answers in order; `true` once exhausted
    pub pings: Vec<bool>,
    /// Commands that never answer
    pub stalled: Vec<String>,
    /// Commands answered with `MalformedPayload`
    pub failing: Vec<String>,
    /// Overrides for command payloads
    pub payloads: HashMap<String, Value>,
}

pub struct MockMarket {
    log: Log,
    script: MarketScript,
    pings_seen: usize,
}

impl MockMarket {
    pub fn new(log: &Log, script: MarketScript) -> Self {
        Self {
            log: log.clone(),
            script,
            pings_seen: 0,
        }
    }

    fn payload(&self, command: &str) -> Value {
        if let Some(payload) = self.script.payloads.get(command) {
            return payload.clone();
        }
        match command {
            "getTickPrices" => json!({
                "quotations": [
                    { "symbol": "BBB", "ask": 99.75, "bid": 99.5, "spreadTable": 0.25 },
                    { "symbol": "AAA", "ask": 101.5, "bid": 101.23, "spreadTable": 0.27 },
                ]
            }),
            "getSymbol" => json!({ "categoryName": "STC", "currency": "USD", "digits": 2 }),
            "getChartRangeRequest" => {
                // penultimate candle closes at 100.00, latest candle is today
                let now = Utc::now().timestamp_millis();
                json!({
                    "digits": 2,
                    "rateInfos": [
                        { "ctm": now - 86_400_000, "open": 10000.0, "close": 0.0 },
                        { "ctm": now, "open": 10000.0, "close": 50.0 },
                    ]
                })
            }
            "getMarginLevel" => json!({ "equity": 10234.5, "currency": "EUR", "margin_free": 8000.0 }),
            "getTrades" => json!([{ "profit": 100.0 }, { "profit": 20.0 }, { "profit": null }]),
            "getServerTime" => json!({ "time": 1_709_630_100_000i64 }),
            "getAllSymbols" => json!([{ "symbol": "AAA" }, { "symbol": "BBB" }]),
            _ => Value::Null,
        }
    }
}

#[async_trait]
impl MarketApi for MockMarket {
    async fn open(&mut self, _endpoint: &Endpoint) -> Result<(), ApiError> {
        self.log.push("market.open");
        match &self.script.open_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    async fn execute(&mut self, command: &str, _arguments: Option<Value>) -> Result<Value, ApiError> {
        self.log.push(format!("market.{}", command));

        if command == "login" {
            if let Some(e) = &self.script.login_error {
                return Err(e.clone());
            }
        }
        if self.script.stalled.iter().any(|c| c == command) {
            tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
        }
        if command == "ping" {
            let ok = self.script.pings.get(self.pings_seen).copied().unwrap_or(true);
            self.pings_seen += 1;
            if !ok {
                return Err(ApiError::Unreachable("connection reset".into()));
            }
        }
        if self.script.failing.iter().any(|c| c == command) {
            return Err(ApiError::MalformedPayload(format!("{}: scripted failure", command)));
        }

        Ok(self.payload(command))
    }

    async fn close(&mut self) {
        self.log.push("market.close");
    }
}

// ============================================================================
// PRINTER
// ============================================================================

/// What the mock printer does.
#[derive(Debug, Clone)]
pub struct PrinterScript {
    pub devices: Vec<DeviceDescriptor>,
    pub connect_error: bool,
    /// How long connecting takes
    pub connect_delay: Duration,
    pub write_error: bool,
}

impl Default for PrinterScript {
    fn default() -> Self {
        Self {
            devices: vec![
                DeviceDescriptor {
                    name: "Other".into(),
                    address: "11:22:33:44:55:66".into(),
                },
                DeviceDescriptor {
                    name: PRINTER.into(),
                    address: PRINTER_ADDRESS.into(),
                },
            ],
            connect_error: false,
            connect_delay: Duration::ZERO,
            write_error: false,
        }
    }
}

impl PrinterScript {
    pub fn absent() -> Self {
        Self {
            devices: Vec::new(),
            ..Default::default()
        }
    }
}

pub struct MockPrinter {
    log: Log,
    script: PrinterScript,
    jobs: Arc<Mutex<Vec<Vec<u8>>>>,
    connected: bool,
}

impl MockPrinter {
    pub fn new(log: &Log, script: PrinterScript) -> Self {
        Self {
            log: log.clone(),
            script,
            jobs: Arc::default(),
            connected: false,
        }
    }

    /// Handle on every job written, for inspection after the backend moved.
    pub fn jobs(&self) -> Arc<Mutex<Vec<Vec<u8>>>> {
        Arc::clone(&self.jobs)
    }
}

#[async_trait]
impl PrinterBackend for MockPrinter {
    async fn scan(&mut self) -> Result<Vec<DeviceDescriptor>, TickerError> {
        self.log.push("printer.scan");
        Ok(self.script.devices.clone())
    }

    async fn connect(&mut self, device: &DeviceDescriptor) -> Result<(), TickerError> {
        self.log.push("printer.connect");
        tokio::time::sleep(self.script.connect_delay).await;
        if self.script.connect_error {
            return Err(TickerError::Connect(format!("{} refused", device)));
        }
        self.connected = true;
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), TickerError> {
        self.log.push("printer.write");
        if !self.connected {
            return Err(TickerError::Print("not connected".into()));
        }
        if self.script.write_error {
            return Err(TickerError::Print("link lost".into()));
        }
        self.jobs.lock().unwrap().push(data.to_vec());
        Ok(())
    }

    async fn release(&mut self) {
        self.log.push("printer.release");
        self.connected = false;
    }
}

// ============================================================================
// JOB INSPECTION
// ============================================================================

/// Split a job into (command, payload) frames.
pub fn frames(job: &[u8]) -> Vec<(u8, Vec<u8>)> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < job.len() {
        assert_eq!(&job[i..i + 2], &MAGIC, "frame preamble at {}", i);
        let cmd = job[i + 2];
        let len = job[i + 4] as usize | (job[i + 5] as usize) << 8;
        out.push((cmd, job[i + 6..i + 6 + len].to_vec()));
        i += 6 + len + 2;
    }
    out
}

/// Width in dots and height in rows of the image printed by a job.
pub fn job_image_size(job: &[u8]) -> (usize, usize) {
    let frames = frames(job);
    let start = frames
        .iter()
        .position(|(cmd, _)| *cmd == CMD_LATTICE)
        .expect("lattice start");
    let end = start
        + 1
        + frames[start + 1..]
            .iter()
            .position(|(cmd, _)| *cmd == CMD_LATTICE)
            .expect("lattice end");

    let mut width = 0;
    let mut height = 0;
    for (cmd, payload) in &frames[start + 1..end] {
        match *cmd {
            CMD_DRAW_BITMAP => {
                width = payload.len() * 8;
                height += 1;
            }
            CMD_FEED_PAPER => height += payload[0] as usize | (payload[1] as usize) << 8,
            _ => {}
        }
    }
    (width, height)
}
