//! # Cat Ticker - Market Quotes on a Thermal Printer
//!
//! Cat Ticker keeps a session open to a brokerage's market-data API and
//! periodically prints a quote sheet on a small Bluetooth LE "cat" thermal
//! printer. It provides:
//!
//! - **Market session**: login, keep-alive and typed fetches over xAPI
//! - **Report rendering**: a fixed-layout 1-bit sheet, 384 dots wide
//! - **Protocol implementation**: cat printer command frames with CRC-8
//! - **Transport**: Bluetooth LE via btleplug
//! - **Scheduler**: the dual-timer loop tying it all together
//!
//! ## Quick Start
//!
//! ```no_run
//! use cat_ticker::{
//!     config::PartialConfig,
//!     market::XapiClient,
//!     printer::PrinterConfig,
//!     render::ReportRenderer,
//!     scheduler::Scheduler,
//!     transport::BleTransport,
//! };
//!
//! # async fn demo() -> Result<(), cat_ticker::TickerError> {
//! let config = PartialConfig::from_file("ticker.json")?.resolve()?;
//! let renderer = ReportRenderer::from_config(&config)?;
//!
//! // Stop after 100 ticks instead of waiting for a key
//! let mut ticks = 0;
//! let cancel = move || {
//!     ticks += 1;
//!     ticks > 100
//! };
//!
//! let mut scheduler = Scheduler::new(config, renderer, cancel);
//! let termination = scheduler
//!     .run(XapiClient::new(), BleTransport::new(PrinterConfig::CAT_384))
//!     .await;
//! println!("{}", termination);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`config`] | Layered, validated run configuration |
//! | [`market`] | Market API seam, xAPI client, market session |
//! | [`render`] | Bitmaps, fonts and the report layout |
//! | [`protocol`] | Cat printer command builders |
//! | [`transport`] | Printer backends |
//! | [`printer`] | Printer configurations and session |
//! | [`scheduler`] | Control loop and termination policy |
//! | [`console`] | Prompts, status line, keyboard cancel |
//! | [`error`] | Error types |
//!
//! ## Supported Printers
//!
//! Currently tested with:
//! - GB01/GB02/GT01 cat printers (58mm paper, 384 dots, BLE)

pub mod config;
pub mod console;
pub mod error;
pub mod market;
pub mod printer;
pub mod protocol;
pub mod render;
pub mod scheduler;
pub mod transport;

// Re-exports for convenience
pub use config::Config;
pub use error::TickerError;
pub use printer::PrinterConfig;
pub use scheduler::{Scheduler, Termination, TerminationReason};
pub use transport::BleTransport;
