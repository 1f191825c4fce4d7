//! # Printer Transport Layer
//!
//! This module provides communication backends for sending print jobs to
//! printers.
//!
//! ## Available Transports
//!
//! - [`ble`]: Bluetooth LE via btleplug (cat printers)
//!
//! Anything implementing [`PrinterBackend`] can stand in for the radio; the
//! integration tests use an in-memory one.

pub mod ble;

use std::fmt;

use async_trait::async_trait;

use crate::error::TickerError;

pub use ble::BleTransport;

/// A printer seen during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDescriptor {
    /// Advertised local name (may be empty)
    pub name: String,
    /// Platform address, `XX:XX:XX:XX:XX:XX` on Linux
    pub address: String,
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            f.write_str(&self.address)
        } else {
            write!(f, "{} ({})", self.name, self.address)
        }
    }
}

/// Link to a printer.
///
/// The backend holds at most one connected device. [`release`] drops it and
/// leaves the backend ready for another [`connect`].
///
/// [`release`]: PrinterBackend::release
/// [`connect`]: PrinterBackend::connect
#[async_trait]
pub trait PrinterBackend: Send {
    /// Scan once and return every device seen.
    async fn scan(&mut self) -> Result<Vec<DeviceDescriptor>, TickerError>;

    /// Connect to a scanned device and get ready to write.
    async fn connect(&mut self, device: &DeviceDescriptor) -> Result<(), TickerError>;

    /// Send raw bytes to the connected device.
    async fn write(&mut self, data: &[u8]) -> Result<(), TickerError>;

    /// Disconnect. Best-effort, safe to call repeatedly.
    async fn release(&mut self);
}
