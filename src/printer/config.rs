//! # Printer Profile
//!
//! Geometry and link tuning of the cat printer family (GB01, GB02, GT01 and
//! relabelled clones). Every one of them has a 384-dot head on 58mm paper
//! and a small receive buffer behind its BLE write characteristic.
//!
//! ```
//! use cat_ticker::printer::PrinterConfig;
//!
//! let printer = PrinterConfig::CAT_384;
//! assert_eq!(printer.width_dots, 384);
//! ```

/// Head width and BLE write tuning.
///
/// ```text
/// job bytes ──chunks of max_chunk_bytes──▶ ae01 ──sleep chunk_delay_ms──▶ next chunk
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrinterConfig {
    /// Dots per row; every printed bitmap must be exactly this wide
    pub width_dots: u16,

    /// Largest single write over BLE
    pub max_chunk_bytes: u16,

    /// Pause between chunk writes so the receive buffer drains
    pub chunk_delay_ms: u64,
}

impl PrinterConfig {
    /// 58mm cat printer, 384 dots at 203 DPI.
    pub const CAT_384: Self = Self {
        width_dots: 384,
        max_chunk_bytes: 128,
        chunk_delay_ms: 20,
    };
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self::CAT_384
    }
}
