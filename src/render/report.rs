//! # Ticker Report
//!
//! Lays out one [`MarketSnapshot`] as a printed ticker sheet.
//!
//! ## Geometry
//!
//! The sheet is composed landscape and then turned to fit the printer's
//! fixed 384-dot transport width:
//!
//! ```text
//!  0 ┌──────────────────────────────────────── 850 ───┐ border
//!  5 │        header (67, 5)                          │
//! 39 │ body line 1 (4, 39)                            │
//!    │ body line 2        22 px pitch                 │
//!    │ ...                                            │
//! 360│ footer (6, 360)                                │
//! 383└────────────────────────────────────────────────┘ border
//!
//!                  rotate 90° counter-clockwise
//!                              ↓
//!                  384 dots wide × 850 rows
//! ```
//!
//! Rendering is a pure function of its input: the same snapshot always gives
//! the same bitmap.

use chrono::NaiveDateTime;
use tracing::warn;

use super::bitmap::{Bitmap, Canvas};
use super::font::Typeface;
use crate::config::{AccountKind, Config};
use crate::error::TickerError;
use crate::market::{AccountSnapshot, MarketSnapshot, Quote};

pub const CANVAS_WIDTH: usize = 850;
pub const CANVAS_HEIGHT: usize = 384;

const HEADER_ORIGIN: (i32, i32) = (67, 5);
const BODY_ORIGIN: (i32, i32) = (4, 39);
const FOOTER_ORIGIN: (i32, i32) = (6, 360);
const BODY_LINE_PITCH: i32 = 22;

const HEADER_PX: f32 = 19.0;
const BODY_PX: f32 = 17.0;

/// Text content of one report, before rasterizing.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportText {
    pub header: String,
    pub body: Vec<String>,
    pub footer: String,
}

/// Renders snapshots into printable bitmaps.
#[derive(Debug, Clone)]
pub struct ReportRenderer {
    typeface: Typeface,
    account: AccountKind,
    report_minutes: u64,
}

impl ReportRenderer {
    pub fn new(typeface: Typeface, account: AccountKind, report_minutes: u64) -> Self {
        Self {
            typeface,
            account,
            report_minutes,
        }
    }

    /// Renderer for a run, loading the configured font.
    pub fn from_config(config: &Config) -> Result<Self, TickerError> {
        let typeface = Typeface::load(config.font_path.as_deref())?;
        Ok(Self::new(typeface, config.credentials.account, config.report_minutes()))
    }

    /// Body lines that fit between the header and the footer.
    pub fn max_body_lines() -> usize {
        ((FOOTER_ORIGIN.1 - BODY_ORIGIN.1) / BODY_LINE_PITCH) as usize
    }

    /// Format the three text regions.
    pub fn compose(&self, snapshot: &MarketSnapshot) -> ReportText {
        ReportText {
            header: format_header(snapshot.timestamp, self.report_minutes),
            body: snapshot
                .quotes
                .iter()
                .map(|(symbol, quote)| format_quote_line(symbol, quote))
                .collect(),
            footer: format_footer(self.account, &snapshot.account, snapshot.total_profit),
        }
    }

    /// Render a snapshot into a printer-width bitmap (384 × 850).
    pub fn render(&self, snapshot: &MarketSnapshot) -> Bitmap {
        self.render_text(&self.compose(snapshot))
    }

    /// Rasterize already composed text.
    pub fn render_text(&self, text: &ReportText) -> Bitmap {
        let mut canvas = Canvas::new(CANVAS_WIDTH, CANVAS_HEIGHT);

        canvas.hline(0);
        canvas.hline(CANVAS_HEIGHT as i32 - 1);

        self.typeface
            .draw(&mut canvas, HEADER_ORIGIN.0, HEADER_ORIGIN.1, &text.header, HEADER_PX);

        let max_lines = Self::max_body_lines();
        if text.body.len() > max_lines {
            warn!(
                lines = text.body.len(),
                max_lines, "report body does not fit, dropping trailing lines"
            );
        }
        for (i, line) in text.body.iter().take(max_lines).enumerate() {
            let y = BODY_ORIGIN.1 + i as i32 * BODY_LINE_PITCH;
            self.typeface.draw(&mut canvas, BODY_ORIGIN.0, y, line, BODY_PX);
        }

        self.typeface
            .draw(&mut canvas, FOOTER_ORIGIN.0, FOOTER_ORIGIN.1, &text.footer, HEADER_PX);

        canvas.rotate_ccw().to_bitmap()
    }
}

/// A blank strip used only to feed paper.
pub fn blank_feed(width: usize, height: u16) -> Bitmap {
    Bitmap::blank(width, height as usize)
}

// ============================================================================
// LINE FORMATS
// ============================================================================

/// `Quotes as of 17-Oct-2026 09:15:00 (print-out every 15 min.):`
pub fn format_header(timestamp: NaiveDateTime, report_minutes: u64) -> String {
    format!(
        "Quotes as of {} (print-out every {} min.):",
        timestamp.format("%d-%b-%Y %H:%M:%S"),
        report_minutes
    )
}

/// One fixed-width body line.
///
/// ```text
///       EURUSD (FX, USD): ASK:     1.09 BID:     1.08 [ 1D:  +0.12% ] SPRD: 0.00007
/// ```
pub fn format_quote_line(symbol: &str, quote: &Quote) -> String {
    let category = format!("({}, {})", quote.category, quote.currency);
    format!(
        "{:>12} {:>10}: ASK:{:9.2} BID:{:9.2} [ 1D: {:+6.2}% ] SPRD: {}",
        symbol, category, quote.ask, quote.bid, quote.daily_change_percent, quote.spread
    )
}

/// `DEMO acc value:   10234.50EUR  profits:    +120.00EUR  unused:    8000.00EUR`
pub fn format_footer(kind: AccountKind, account: &AccountSnapshot, total_profit: f64) -> String {
    let cur = &account.currency;
    format!(
        "{} acc value: {:10.2}{}  profits: {:+10.2}{}  unused: {:10.2}{}",
        kind.label(),
        account.equity,
        cur,
        total_profit,
        cur,
        account.free_margin,
        cur
    )
}

// ============================================================================
// TESTS
// ============================================================================
