//! # Printer Session
//!
//! A connected printer behind any [`PrinterBackend`].
//!
//! ## Startup Policy
//!
//! [`PrinterSession::establish`] makes up to `attempts` scan+connect tries.
//! Every failed try (target not advertised, connect refused, timed out)
//! releases whatever the backend half-opened before the next one. Running out
//! of attempts is returned as an error and the caller gives up.
//!
//! ## Targets
//!
//! The target is matched against the advertised name. A target that looks
//! like a MAC address also matches the device address, case-insensitively.

use std::time::Duration;

use tracing::{debug, info, warn};

use super::config::PrinterConfig;
use crate::error::TickerError;
use crate::protocol::graphics;
use crate::render::Bitmap;
use crate::transport::ble::is_valid_mac;
use crate::transport::{DeviceDescriptor, PrinterBackend};

/// Pause between failed establish attempts
const RETRY_DELAY: Duration = Duration::from_secs(1);

/// # Printer Session
pub struct PrinterSession<B: PrinterBackend> {
    backend: B,
    device: DeviceDescriptor,
    printer: PrinterConfig,
    released: bool,
}

impl<B: PrinterBackend> PrinterSession<B> {
    /// Scan once and keep the devices that match `filter`.
    pub async fn discover(
        backend: &mut B,
        filter: &str,
    ) -> Result<Vec<DeviceDescriptor>, TickerError> {
        let devices = backend.scan().await?;
        Ok(devices
            .into_iter()
            .filter(|d| matches_target(d, filter))
            .collect())
    }

    /// Connect to a discovered device, giving up after `timeout`.
    ///
    /// On failure the backend is released and handed back with the error so
    /// that the caller can retry on it.
    pub async fn connect(
        mut backend: B,
        device: DeviceDescriptor,
        timeout: Duration,
    ) -> Result<Self, (B, TickerError)> {
        let outcome = tokio::time::timeout(timeout, backend.connect(&device)).await;
        let error = match outcome {
            Ok(Ok(())) => {
                info!(%device, "printer connected");
                return Ok(Self {
                    backend,
                    device,
                    printer: PrinterConfig::default(),
                    released: false,
                });
            }
            Ok(Err(e)) => e,
            Err(_) => TickerError::Timeout(format!("connecting to {} took over {:?}", device, timeout)),
        };
        backend.release().await;
        Err((backend, error))
    }

    /// Find and connect to `target`, trying up to `attempts` times.
    ///
    /// ## Errors
    ///
    /// [`TickerError::Connect`] carrying the last failure once every attempt
    /// is used up.
    pub async fn establish(
        mut backend: B,
        target: &str,
        attempts: u32,
        attempt_timeout: Duration,
    ) -> Result<Self, TickerError> {
        let attempts = attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            if attempt > 1 {
                tokio::time::sleep(RETRY_DELAY).await;
            }
            debug!(attempt, attempts, target, "looking for printer");

            let found =
                tokio::time::timeout(attempt_timeout, Self::discover(&mut backend, target)).await;
            let device = match found {
                Ok(Ok(devices)) => devices
                    .into_iter()
                    .next()
                    .ok_or_else(|| format!("printer {} not found", target)),
                Ok(Err(e)) => Err(e.to_string()),
                Err(_) => Err(format!("printer scan timed out after {:?}", attempt_timeout)),
            };
            let device = match device {
                Ok(device) => device,
                Err(e) => {
                    warn!(attempt, "{}", e);
                    last_error = e;
                    backend.release().await;
                    continue;
                }
            };

            match Self::connect(backend, device, attempt_timeout).await {
                Ok(session) => return Ok(session),
                Err((returned, e)) => {
                    warn!(attempt, error = %e, "printer connect failed");
                    last_error = e.to_string();
                    backend = returned;
                }
            }
        }

        Err(TickerError::Connect(format!(
            "{} (after {} attempts)",
            last_error, attempts
        )))
    }

    /// The connected device.
    pub fn device(&self) -> &DeviceDescriptor {
        &self.device
    }

    /// Hardware geometry of the connected printer.
    pub fn printer(&self) -> &PrinterConfig {
        &self.printer
    }

    /// Whether [`release`](Self::release) has not been called yet.
    pub fn is_alive(&self) -> bool {
        !self.released
    }

    /// Print one image as one job.
    ///
    /// ## Errors
    ///
    /// [`TickerError::Print`] when the image is not printer-wide, `speed`
    /// does not fit in a byte, the session is released, or the write fails.
    pub async fn submit(&mut self, image: &Bitmap, energy: u16, speed: u16) -> Result<(), TickerError> {
        if self.released {
            return Err(TickerError::Print("printer session released".to_string()));
        }
        if image.width() != self.printer.width_dots as usize {
            return Err(TickerError::Print(format!(
                "image is {} dots wide, printer needs {}",
                image.width(),
                self.printer.width_dots
            )));
        }
        let speed = u8::try_from(speed)
            .map_err(|_| TickerError::Print(format!("speed {} out of range 0..=255", speed)))?;

        let job = graphics::print_job(image, energy, speed);
        debug!(bytes = job.len(), rows = image.height(), "submitting print job");
        self.backend.write(&job).await
    }

    /// Disconnect. Safe to call any number of times.
    pub async fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.backend.release().await;
            info!(device = %self.device, "printer released");
        }
    }
}

/// Whether a scanned device is the one the user asked for.
pub fn matches_target(device: &DeviceDescriptor, target: &str) -> bool {
    if target.is_empty() {
        return false;
    }
    device.name == target || (is_valid_mac(target) && device.address.eq_ignore_ascii_case(target))
}
