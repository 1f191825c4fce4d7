//! # Printer Module
//!
//! This module provides printer-specific configurations and the printer
//! session.
//!
//! ## Modules
//!
//! - [`config`]: Printer head width and BLE write tuning
//! - [`session`]: Connect, print and release over a [`PrinterBackend`](crate::transport::PrinterBackend)

pub mod config;
pub mod session;

pub use config::PrinterConfig;
pub use session::PrinterSession;
