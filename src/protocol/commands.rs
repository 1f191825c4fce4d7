//! # Cat Printer Commands
//!
//! This module implements the command framing used by the family of small
//! Bluetooth LE thermal printers sold under names like GB01, GB02, GT01 and
//! MX05 ("cat printers").
//!
//! ## Frame Structure
//!
//! Every command is one frame:
//!
//! ```text
//! ┌──────┬──────┬─────┬──────┬────────┬────────┬─────────┬──────┬──────┐
//! │ 0x51 │ 0x78 │ cmd │ 0x00 │ len lo │ len hi │ payload │ crc8 │ 0xFF │
//! └──────┴──────┴─────┴──────┴────────┴────────┴─────────┴──────┴──────┘
//! ```
//!
//! - `len` is the payload length, little-endian
//! - `crc8` covers the payload only (polynomial 0x07, init 0)
//!
//! ## Byte Order
//!
//! Multi-byte integers use **little-endian** encoding:
//! - `u16` value 0x1234 is sent as bytes `[0x34, 0x12]`

// ============================================================================
// FRAME CONSTANTS
// ============================================================================

/// Frame preamble
pub const MAGIC: [u8; 2] = [0x51, 0x78];

/// Frame terminator
pub const END: u8 = 0xFF;

pub const CMD_FEED_PAPER: u8 = 0xA1;
pub const CMD_DRAW_BITMAP: u8 = 0xA2;
pub const CMD_GET_DEVICE_STATE: u8 = 0xA3;
pub const CMD_SET_QUALITY: u8 = 0xA4;
pub const CMD_LATTICE: u8 = 0xA6;
pub const CMD_UPDATE_DEVICE: u8 = 0xA9;
pub const CMD_SET_ENERGY: u8 = 0xAF;
pub const CMD_SET_SPEED: u8 = 0xBD;
pub const CMD_APPLY_ENERGY: u8 = 0xBE;

/// Quality byte selecting 200 DPI
const QUALITY_200_DPI: u8 = 50;

const LATTICE_START: [u8; 11] = [
    0xAA, 0x55, 0x17, 0x38, 0x44, 0x5F, 0x5F, 0x5F, 0x44, 0x38, 0x2C,
];
const LATTICE_END: [u8; 11] = [
    0xAA, 0x55, 0x17, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x17,
];

// ============================================================================
// FRAMING
// ============================================================================

/// CRC-8 with polynomial 0x07 and zero init, as the printer firmware
/// checks it.
///
/// ## Example
///
/// ```
/// use cat_ticker::protocol::commands::crc8;
///
/// assert_eq!(crc8(b"123456789"), 0xF4);
/// ```
pub fn crc8(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |crc, &byte| {
        (0..8).fold(crc ^ byte, |crc, _| {
            if crc & 0x80 != 0 {
                (crc << 1) ^ 0x07
            } else {
                crc << 1
            }
        })
    })
}

/// Wrap a payload into a command frame.
///
/// Payloads are at most one bitmap row in practice; longer payloads are a
/// caller bug.
pub fn frame(command: u8, payload: &[u8]) -> Vec<u8> {
    debug_assert!(payload.len() <= u16::MAX as usize);
    let len = u16_le(payload.len() as u16);
    let mut out = Vec::with_capacity(payload.len() + 8);
    out.extend_from_slice(&MAGIC);
    out.push(command);
    out.push(0x00);
    out.extend_from_slice(&len);
    out.extend_from_slice(payload);
    out.push(crc8(payload));
    out.push(END);
    out
}

// ============================================================================
// DEVICE COMMANDS
// ============================================================================

/// # Get Device State (0xA3)
///
/// Asks the printer for its status. Sent at the start and end of a job; the
/// reply arrives on the notify characteristic and is not needed here.
///
/// ```
/// use cat_ticker::protocol::commands;
///
/// assert_eq!(
///     commands::get_device_state(),
///     vec![0x51, 0x78, 0xA3, 0x00, 0x01, 0x00, 0x00, 0x00, 0xFF]
/// );
/// ```
#[inline]
pub fn get_device_state() -> Vec<u8> {
    frame(CMD_GET_DEVICE_STATE, &[0x00])
}

/// # Set Print Quality (0xA4)
///
/// Selects 200 DPI output.
#[inline]
pub fn set_dpi_200() -> Vec<u8> {
    frame(CMD_SET_QUALITY, &[QUALITY_200_DPI])
}

/// # Set Feed Speed (0xBD)
///
/// Lower is faster. Slow speeds give the head time to heat and produce
/// darker output.
#[inline]
pub fn set_speed(speed: u8) -> Vec<u8> {
    frame(CMD_SET_SPEED, &[speed])
}

/// # Set Thermal Energy (0xAF)
///
/// Head energy, `0x0000..=0xFFFF`. Takes effect after [`apply_energy`].
#[inline]
pub fn set_energy(energy: u16) -> Vec<u8> {
    frame(CMD_SET_ENERGY, &u16_le(energy))
}

/// # Apply Energy (0xBE)
#[inline]
pub fn apply_energy() -> Vec<u8> {
    frame(CMD_APPLY_ENERGY, &[0x01])
}

/// # Update Device (0xA9)
#[inline]
pub fn update_device() -> Vec<u8> {
    frame(CMD_UPDATE_DEVICE, &[0x00])
}

/// # Start Lattice (0xA6)
///
/// Opens a printing section; bitmap rows follow.
#[inline]
pub fn start_lattice() -> Vec<u8> {
    frame(CMD_LATTICE, &LATTICE_START)
}

/// # End Lattice (0xA6)
#[inline]
pub fn end_lattice() -> Vec<u8> {
    frame(CMD_LATTICE, &LATTICE_END)
}

/// # Feed Paper (0xA1)
///
/// Advances the paper by `dots` rows without printing.
#[inline]
pub fn feed_paper(dots: u16) -> Vec<u8> {
    frame(CMD_FEED_PAPER, &u16_le(dots))
}

/// # Draw Bitmap Row (0xA2)
///
/// Prints one row of dots. The row is in device bit order: bit 0 of each
/// byte is the leftmost dot (see
/// [`to_device_order`](super::graphics::to_device_order)).
#[inline]
pub fn draw_row(row: &[u8]) -> Vec<u8> {
    frame(CMD_DRAW_BITMAP, row)
}

/// Convert a u16 to little-endian bytes.
#[inline]
pub const fn u16_le(value: u16) -> [u8; 2] {
    [value as u8, (value >> 8) as u8]
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc8_check_value() {
        assert_eq!(crc8(b"123456789"), 0xF4);
        assert_eq!(crc8(&[]), 0x00);
        assert_eq!(crc8(&[0x01]), 0x07);
    }

    #[test]
    fn test_frame_layout() {
        let f = frame(0xA1, &[0x10, 0x00]);
        assert_eq!(&f[0..2], &MAGIC);
        assert_eq!(f[2], 0xA1);
        assert_eq!(f[3], 0x00);
        assert_eq!(&f[4..6], &[0x02, 0x00]);
        assert_eq!(&f[6..8], &[0x10, 0x00]);
        assert_eq!(f[8], crc8(&[0x10, 0x00]));
        assert_eq!(f[9], END);
        assert_eq!(f.len(), 10);
    }

    #[test]
    fn test_known_frames() {
        assert_eq!(
            apply_energy(),
            vec![0x51, 0x78, 0xBE, 0x00, 0x01, 0x00, 0x01, 0x07, 0xFF]
        );
        assert_eq!(
            update_device(),
            vec![0x51, 0x78, 0xA9, 0x00, 0x01, 0x00, 0x00, 0x00, 0xFF]
        );
    }

    #[test]
    fn test_energy_little_endian() {
        let f = set_energy(0x4000);
        assert_eq!(&f[6..8], &[0x00, 0x40]);
    }

    #[test]
    fn test_speed_payload() {
        let f = set_speed(64);
        assert_eq!(f[4], 1);
        assert_eq!(f[6], 64);
    }

    #[test]
    fn test_lattice_frames_differ() {
        assert_ne!(start_lattice(), end_lattice());
        assert_eq!(start_lattice().len(), 11 + 8);
    }

    #[test]
    fn test_u16_le() {
        assert_eq!(u16_le(0x0000), [0x00, 0x00]);
        assert_eq!(u16_le(0x1234), [0x34, 0x12]);
        assert_eq!(u16_le(384), [0x80, 0x01]);
    }
}
