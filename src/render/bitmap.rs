//! # Monochrome Raster Types
//!
//! - [`Canvas`]: an unpacked drawing surface (one `bool` per dot) used while
//!   laying out a report
//! - [`Bitmap`]: the packed, printer-ready result
//!
//! ## Bit Packing
//!
//! [`Bitmap`] rows are packed as bytes where each bit represents one dot:
//! - Bit 7 (MSB) = leftmost dot
//! - Bit 0 (LSB) = rightmost dot
//! - 1 = black (print), 0 = white (no print)
//!
//! ```text
//! Byte value 0xF0 = 11110000 = ████░░░░
//! Byte value 0x0F = 00001111 = ░░░░████
//! ```

use std::path::Path;

use crate::error::TickerError;

// ============================================================================
// BITMAP
// ============================================================================

/// Packed 1-bit image, `width.div_ceil(8)` bytes per row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    width: usize,
    height: usize,
    data: Vec<u8>,
}

impl Bitmap {
    /// An all-white image.
    pub fn blank(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            data: vec![0; width.div_ceil(8) * height],
        }
    }

    /// Pack row-major pixels (`true` = black).
    pub fn from_pixels(width: usize, height: usize, pixels: &[bool]) -> Self {
        assert_eq!(pixels.len(), width * height, "pixel count does not match size");
        let mut data = Vec::with_capacity(width.div_ceil(8) * height);
        for row in pixels.chunks(width.max(1)).take(height) {
            data.extend(pack_row(row));
        }
        Self { width, height, data }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width_bytes(&self) -> usize {
        self.width.div_ceil(8)
    }

    /// Packed bytes of row `y`.
    pub fn row(&self, y: usize) -> &[u8] {
        let wb = self.width_bytes();
        &self.data[y * wb..(y + 1) * wb]
    }

    /// Whether the dot at (x, y) is black.
    pub fn get(&self, x: usize, y: usize) -> bool {
        let byte = self.data[y * self.width_bytes() + x / 8];
        (byte >> (7 - (x % 8))) & 1 == 1
    }

    /// Number of black dots.
    pub fn black_dots(&self) -> usize {
        self.data.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Save as a grayscale PNG (black dots black, the rest white).
    pub fn save_png(&self, path: &Path) -> Result<(), TickerError> {
        use image::{GrayImage, Luma};

        let mut img = GrayImage::new(self.width as u32, self.height as u32);
        for y in 0..self.height {
            for x in 0..self.width {
                let color = if self.get(x, y) { 0u8 } else { 255u8 };
                img.put_pixel(x as u32, y as u32, Luma([color]));
            }
        }

        img.save(path)
            .map_err(|e| TickerError::Render(format!("Failed to save PNG: {}", e)))?;

        Ok(())
    }
}

/// Pack a row of boolean pixel values into bytes.
///
/// If the row length is not a multiple of 8, the last byte is padded
/// with zeros (white) on the right.
///
/// ## Example
///
/// ```
/// use cat_ticker::render::bitmap::pack_row;
///
/// let row = vec![true, true, true, true, false, false, false, false];
/// assert_eq!(pack_row(&row), vec![0xF0]);
///
/// let row = vec![true; 12];
/// assert_eq!(pack_row(&row), vec![0xFF, 0xF0]);
/// ```
pub fn pack_row(pixels: &[bool]) -> Vec<u8> {
    let mut bytes = vec![0u8; pixels.len().div_ceil(8)];

    for (i, &pixel) in pixels.iter().enumerate() {
        if pixel {
            bytes[i / 8] |= 1 << (7 - (i % 8));
        }
    }

    bytes
}

// ============================================================================
// CANVAS
// ============================================================================

/// Unpacked drawing surface. Writes outside the canvas are clipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Canvas {
    width: usize,
    height: usize,
    pixels: Vec<bool>,
}

impl Canvas {
    /// A white canvas.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            pixels: vec![false; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Blacken the dot at (x, y), ignoring coordinates off the canvas.
    #[inline]
    pub fn set(&mut self, x: i32, y: i32) {
        if x >= 0 && y >= 0 && (x as usize) < self.width && (y as usize) < self.height {
            self.pixels[y as usize * self.width + x as usize] = true;
        }
    }

    pub fn get(&self, x: usize, y: usize) -> bool {
        self.pixels[y * self.width + x]
    }

    /// Full-width horizontal line.
    pub fn hline(&mut self, y: i32) {
        for x in 0..self.width as i32 {
            self.set(x, y);
        }
    }

    /// Rotate 90° counter-clockwise; width and height swap.
    ///
    /// ```text
    /// ┌──────────┐        ┌────┐
    /// │A        B│        │B  D│
    /// │C        D│   →    │    │
    /// └──────────┘        │A  C│
    ///                     └────┘
    /// ```
    pub fn rotate_ccw(&self) -> Canvas {
        let (w, h) = (self.width, self.height);
        let mut out = Canvas::new(h, w);
        for ny in 0..w {
            for nx in 0..h {
                out.pixels[ny * h + nx] = self.pixels[nx * w + (w - 1 - ny)];
            }
        }
        out
    }

    /// Pack into a [`Bitmap`].
    pub fn to_bitmap(&self) -> Bitmap {
        Bitmap::from_pixels(self.width, self.height, &self.pixels)
    }
}

// ============================================================================
// TESTS
// ============================================================================
