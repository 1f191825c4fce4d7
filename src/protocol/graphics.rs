//! # Print Jobs
//!
//! Turns a [`Bitmap`] into the full command sequence for one print job.
//!
//! ## Job Layout
//!
//! ```text
//! get state, 200 DPI, speed, energy, apply energy, update device
//! start lattice
//!   row | row | feed(n) | row | ...     (runs of blank rows become feeds)
//! end lattice
//! speed 8, feed(FINISH_FEED_DOTS), get state
//! ```
//!
//! ## Bit Order
//!
//! [`Bitmap`] rows are packed MSB-first (bit 7 = leftmost dot, as the rest of
//! the crate expects). The printer wants bit 0 leftmost, so each byte is
//! reversed on the way out.

use super::commands::{
    apply_energy, draw_row, end_lattice, feed_paper, get_device_state, set_dpi_200, set_energy,
    set_speed, start_lattice, update_device,
};
use crate::render::Bitmap;

/// Speed used while feeding out the end of a job
pub const FINISH_SPEED: u8 = 8;

/// Paper fed after every job so the print clears the tear bar
pub const FINISH_FEED_DOTS: u16 = 128;

/// Build one complete print job.
pub fn print_job(image: &Bitmap, energy: u16, speed: u8) -> Vec<u8> {
    let mut data = Vec::new();

    data.extend(get_device_state());
    data.extend(set_dpi_200());
    data.extend(set_speed(speed));
    data.extend(set_energy(energy));
    data.extend(apply_energy());
    data.extend(update_device());

    data.extend(start_lattice());
    data.extend(encode_rows(image));
    data.extend(end_lattice());

    data.extend(set_speed(FINISH_SPEED));
    data.extend(feed_paper(FINISH_FEED_DOTS));
    data.extend(get_device_state());

    data
}

/// Encode the rows of an image, collapsing blank runs into paper feeds.
pub fn encode_rows(image: &Bitmap) -> Vec<u8> {
    let mut data = Vec::new();
    let mut blank_run: usize = 0;

    for y in 0..image.height() {
        let row = image.row(y);
        if row.iter().all(|&b| b == 0) {
            blank_run += 1;
            continue;
        }
        flush_feed(&mut data, &mut blank_run);
        data.extend(draw_row(&to_device_order(row)));
    }
    flush_feed(&mut data, &mut blank_run);

    data
}

fn flush_feed(data: &mut Vec<u8>, blank_run: &mut usize) {
    while *blank_run > 0 {
        let step = (*blank_run).min(u16::MAX as usize);
        data.extend(feed_paper(step as u16));
        *blank_run -= step;
    }
}

/// Reverse the bit order of every byte (MSB-first → LSB-first).
///
/// ## Example
///
/// ```
/// use cat_ticker::protocol::graphics::to_device_order;
///
/// assert_eq!(to_device_order(&[0b1000_0000, 0b1100_0000]), vec![0b0000_0001, 0b0000_0011]);
/// ```
pub fn to_device_order(row: &[u8]) -> Vec<u8> {
    row.iter().map(|b| b.reverse_bits()).collect()
}
