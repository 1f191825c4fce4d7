//! Glyph rasterizing for report text.
//!
//! Two typefaces are supported, both monospaced so the report's numeric
//! columns line up:
//!
//! - [`Typeface::Spleen`]: the embedded Spleen 8×16 bitmap font, used when
//!   no font file is configured. Fixed size.
//! - [`Typeface::TrueType`]: any TTF/OTF file, rendered with ab_glyph at the
//!   requested pixel height and thresholded to 1 bit (no anti-aliasing,
//!   thermal heads cannot print gray).

use std::path::Path;

use ab_glyph::{Font, FontArc, ScaleFont};
use spleen_font::{FONT_8X16, PSF2Font};

use super::bitmap::Canvas;
use crate::error::TickerError;

/// Spleen cell size
pub const SPLEEN_WIDTH: usize = 8;
pub const SPLEEN_HEIGHT: usize = 16;

/// Coverage at or above which a TTF dot is printed
const COVERAGE_THRESHOLD: f32 = 0.5;

/// A monospaced typeface.
#[derive(Clone)]
pub enum Typeface {
    Spleen,
    TrueType(FontArc),
}

impl std::fmt::Debug for Typeface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Typeface::Spleen => f.write_str("Spleen"),
            Typeface::TrueType(_) => f.write_str("TrueType"),
        }
    }
}

impl Typeface {
    /// Load a font file, or fall back to the embedded bitmap font.
    pub fn load(path: Option<&Path>) -> Result<Self, TickerError> {
        let Some(path) = path else {
            return Ok(Typeface::Spleen);
        };
        let bytes = std::fs::read(path).map_err(|e| {
            TickerError::Render(format!("cannot read font {}: {}", path.display(), e))
        })?;
        let font = FontArc::try_from_vec(bytes).map_err(|e| {
            TickerError::Render(format!("invalid font {}: {}", path.display(), e))
        })?;
        Ok(Typeface::TrueType(font))
    }

    /// Draw `text` with its top-left corner at (x, y).
    pub fn draw(&self, canvas: &mut Canvas, x: i32, y: i32, text: &str, pixel_height: f32) {
        match self {
            Typeface::Spleen => draw_spleen(canvas, x, y, text),
            Typeface::TrueType(font) => draw_ttf(canvas, font, x, y, text, pixel_height),
        }
    }
}

fn draw_spleen(canvas: &mut Canvas, x: i32, y: i32, text: &str) {
    let Ok(mut font) = PSF2Font::new(FONT_8X16) else {
        tracing::warn!("embedded bitmap font failed to load");
        return;
    };

    for (i, ch) in text.chars().enumerate() {
        let cell_x = x + (i * SPLEEN_WIDTH) as i32;
        if ch == ' ' {
            continue;
        }

        let utf8 = ch.to_string();
        if let Some(rows) = font.glyph_for_utf8(utf8.as_bytes()) {
            for (row_y, row) in rows.enumerate() {
                for (col_x, on) in row.enumerate() {
                    if on {
                        canvas.set(cell_x + col_x as i32, y + row_y as i32);
                    }
                }
            }
        } else {
            draw_box(canvas, cell_x, y);
        }
    }
}

/// Outline drawn for characters the bitmap font lacks.
fn draw_box(canvas: &mut Canvas, x: i32, y: i32) {
    let (w, h) = (SPLEEN_WIDTH as i32, SPLEEN_HEIGHT as i32);
    for dx in 1..w - 1 {
        canvas.set(x + dx, y + 2);
        canvas.set(x + dx, y + h - 2);
    }
    for dy in 2..h - 1 {
        canvas.set(x + 1, y + dy);
        canvas.set(x + w - 2, y + dy);
    }
}

fn draw_ttf(canvas: &mut Canvas, font: &FontArc, x: i32, y: i32, text: &str, pixel_height: f32) {
    let scaled = font.as_scaled(pixel_height);
    let baseline_y = y as f32 + scaled.ascent();

    let mut caret_x = x as f32;
    for ch in text.chars() {
        let glyph_id = font.glyph_id(ch);
        let glyph = glyph_id.with_scale_and_position(pixel_height, ab_glyph::point(caret_x, baseline_y));
        caret_x += scaled.h_advance(glyph_id);

        if let Some(outlined) = font.outline_glyph(glyph) {
            let bounds = outlined.px_bounds();
            outlined.draw(|px, py, coverage| {
                if coverage >= COVERAGE_THRESHOLD {
                    canvas.set(px as i32 + bounds.min.x as i32, py as i32 + bounds.min.y as i32);
                }
            });
        }
    }
}
