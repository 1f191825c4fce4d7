//! # Cat Printer Protocol
//!
//! This module provides the byte-level command builders for Bluetooth LE
//! "cat" thermal printers.
//!
//! ## Module Structure
//!
//! - [`commands`]: frame format, CRC-8 and individual commands
//! - [`graphics`]: whole print jobs built from a [`Bitmap`](crate::render::Bitmap)
//!
//! ## Usage Example
//!
//! ```
//! use cat_ticker::protocol::graphics;
//! use cat_ticker::render::Bitmap;
//!
//! // A 384-dot wide, 10-row blank strip
//! let image = Bitmap::blank(384, 10);
//! let job = graphics::print_job(&image, 0x4000, 8);
//!
//! // Every frame starts with the 0x51 0x78 preamble
//! assert_eq!(&job[0..2], &[0x51, 0x78]);
//! ```

pub mod commands;
pub mod graphics;
