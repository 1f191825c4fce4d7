//! # Bluetooth LE Transport
//!
//! This module talks to cat printers over Bluetooth Low Energy using
//! btleplug (BlueZ on Linux, CoreBluetooth on macOS, WinRT on Windows).
//!
//! ## Connection Sequence
//!
//! ```text
//! scan (SCAN_WINDOW) → peripherals → connect(address) → discover services
//!                                                     → find ae01 characteristic
//! ```
//!
//! Printers do not need pairing. The adapter must be powered on and the
//! user must be allowed to use it (on Linux, member of the `bluetooth`
//! group or running with BlueZ's default policy).
//!
//! ## Chunked Writes
//!
//! The printer exposes a single write-without-response characteristic with a
//! small buffer. Jobs are written in [`PrinterConfig::max_chunk_bytes`]
//! chunks with [`PrinterConfig::chunk_delay_ms`] between them.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{DeviceDescriptor, PrinterBackend};
use crate::error::TickerError;
use crate::printer::PrinterConfig;

/// Print data characteristic
pub const WRITE_CHARACTERISTIC: Uuid = Uuid::from_u128(0x0000ae01_0000_1000_8000_00805f9b34fb);

/// How long one scan listens for advertisements
pub const SCAN_WINDOW: Duration = Duration::from_secs(4);

/// # BLE Printer Transport
///
/// ## Example
///
/// ```no_run
/// use cat_ticker::transport::{BleTransport, PrinterBackend};
/// use cat_ticker::printer::PrinterConfig;
///
/// # async fn demo() -> Result<(), cat_ticker::error::TickerError> {
/// let mut transport = BleTransport::new(PrinterConfig::CAT_384);
/// let devices = transport.scan().await?;
/// if let Some(device) = devices.iter().find(|d| d.name == "GB01") {
///     transport.connect(device).await?;
///     transport.write(&[0x51, 0x78]).await?;
///     transport.release().await;
/// }
/// # Ok(())
/// # }
/// ```
pub struct BleTransport {
    adapter: Option<Adapter>,
    seen: HashMap<String, Peripheral>,
    link: Option<(Peripheral, Characteristic)>,
    scan_window: Duration,
    chunk_size: usize,
    chunk_delay: Duration,
}

impl BleTransport {
    pub fn new(printer: PrinterConfig) -> Self {
        Self {
            adapter: None,
            seen: HashMap::new(),
            link: None,
            scan_window: SCAN_WINDOW,
            chunk_size: printer.max_chunk_bytes.max(1) as usize,
            chunk_delay: Duration::from_millis(printer.chunk_delay_ms),
        }
    }

    /// Set how long each scan listens.
    pub fn set_scan_window(&mut self, window: Duration) {
        self.scan_window = window;
    }

    /// First Bluetooth adapter of the host, opened once.
    async fn adapter(&mut self) -> Result<Adapter, TickerError> {
        if let Some(adapter) = &self.adapter {
            return Ok(adapter.clone());
        }

        let manager = Manager::new()
            .await
            .map_err(|e| TickerError::Connect(format!("Bluetooth unavailable: {}", e)))?;
        let adapter = manager
            .adapters()
            .await
            .map_err(|e| TickerError::Connect(format!("Failed to list adapters: {}", e)))?
            .into_iter()
            .next()
            .ok_or_else(|| TickerError::Connect("No Bluetooth adapter found".to_string()))?;

        self.adapter = Some(adapter.clone());
        Ok(adapter)
    }
}

#[async_trait]
impl PrinterBackend for BleTransport {
    async fn scan(&mut self) -> Result<Vec<DeviceDescriptor>, TickerError> {
        let adapter = self.adapter().await?;

        adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| TickerError::Connect(format!("Scan failed: {}", e)))?;
        tokio::time::sleep(self.scan_window).await;
        if let Err(e) = adapter.stop_scan().await {
            debug!(error = %e, "stop_scan failed");
        }

        let peripherals = adapter
            .peripherals()
            .await
            .map_err(|e| TickerError::Connect(format!("Scan failed: {}", e)))?;

        self.seen.clear();
        let mut devices = Vec::with_capacity(peripherals.len());
        for peripheral in peripherals {
            let address = peripheral.address().to_string();
            let name = match peripheral.properties().await {
                Ok(Some(props)) => props.local_name.unwrap_or_default(),
                _ => String::new(),
            };
            devices.push(DeviceDescriptor {
                name,
                address: address.clone(),
            });
            self.seen.insert(address, peripheral);
        }

        debug!(count = devices.len(), "scan finished");
        Ok(devices)
    }

    async fn connect(&mut self, device: &DeviceDescriptor) -> Result<(), TickerError> {
        self.release().await;

        let peripheral = self.seen.get(&device.address).cloned().ok_or_else(|| {
            TickerError::Connect(format!("{} was not seen in the last scan", device))
        })?;

        peripheral
            .connect()
            .await
            .map_err(|e| TickerError::Connect(format!("Failed to connect to {}: {}", device, e)))?;

        let characteristic = match find_write_characteristic(&peripheral).await {
            Ok(c) => c,
            Err(e) => {
                let _ = peripheral.disconnect().await;
                return Err(e);
            }
        };

        info!(%device, "printer link up");
        self.link = Some((peripheral, characteristic));
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), TickerError> {
        let Some((peripheral, characteristic)) = &self.link else {
            return Err(TickerError::Print("Printer not connected".to_string()));
        };

        for chunk in data.chunks(self.chunk_size) {
            peripheral
                .write(characteristic, chunk, WriteType::WithoutResponse)
                .await
                .map_err(|e| TickerError::Print(format!("Write failed: {}", e)))?;

            if !self.chunk_delay.is_zero() {
                tokio::time::sleep(self.chunk_delay).await;
            }
        }

        Ok(())
    }

    async fn release(&mut self) {
        if let Some((peripheral, _)) = self.link.take() {
            if let Err(e) = peripheral.disconnect().await {
                warn!(error = %e, "printer disconnect failed");
            }
        }
    }
}

async fn find_write_characteristic(peripheral: &Peripheral) -> Result<Characteristic, TickerError> {
    peripheral
        .discover_services()
        .await
        .map_err(|e| TickerError::Connect(format!("Service discovery failed: {}", e)))?;

    peripheral
        .characteristics()
        .into_iter()
        .find(|c| c.uuid == WRITE_CHARACTERISTIC)
        .ok_or_else(|| {
            TickerError::Connect(format!(
                "Device has no print characteristic {}",
                WRITE_CHARACTERISTIC
            ))
        })
}

/// Validate a Bluetooth MAC address format (XX:XX:XX:XX:XX:XX).
pub fn is_valid_mac(mac: &str) -> bool {
    let parts: Vec<&str> = mac.split(':').collect();
    if parts.len() != 6 {
        return false;
    }
    parts
        .iter()
        .all(|part| part.len() == 2 && part.chars().all(|c| c.is_ascii_hexdigit()))
}

// ============================================================================
// TESTS
// ============================================================================
