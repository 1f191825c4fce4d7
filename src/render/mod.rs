//! # Rendering Module
//!
//! Turns market snapshots into 1-bit images for the thermal printer.
//!
//! ## Modules
//!
//! - [`bitmap`]: packed [`Bitmap`] and the drawing [`Canvas`]
//! - [`font`]: glyph rasterizing (embedded Spleen or a TrueType file)
//! - [`report`]: the ticker sheet layout
//!
//! ## Usage Example
//!
//! ```
//! use cat_ticker::render::Canvas;
//!
//! let mut canvas = Canvas::new(850, 384);
//! canvas.hline(0);
//!
//! // Landscape layouts are turned to the printer's 384-dot width
//! let bitmap = canvas.rotate_ccw().to_bitmap();
//! assert_eq!((bitmap.width(), bitmap.height()), (384, 850));
//! ```

pub mod bitmap;
pub mod font;
pub mod report;

pub use bitmap::{Bitmap, Canvas};
pub use report::{ReportRenderer, ReportText};
