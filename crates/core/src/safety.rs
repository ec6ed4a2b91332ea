//! Safety layer: validates LED command parameters before any packet byte is
//! built.
//!
//! # Packet bounds
//!
//! The LED feature report is a fixed 38-byte frame:
//! - byte 0 is the report ID, bytes 1–2 carry the board and command id
//! - the color byte for LED `n` lands at offset `n + 4`
//! - byte 37 is the fixed `0xF0` trailer
//!
//! The color byte must never overwrite the trailer, so the largest usable
//! LED index is `37 - 4 - 1 = 32`.
//!
//! ## Safety Invariants
//! 1. LED indices are bounds-checked against [`MAX_LED_INDEX`]
//! 2. All validation happens BEFORE any HID communication

use crate::error::{Error, Result};
use crate::packet::{COLOR_OFFSET, PACKET_LEN};

/// Largest LED index whose color byte stays clear of the trailer.
pub const MAX_LED_INDEX: u8 = (PACKET_LEN - COLOR_OFFSET - 2) as u8;

/// Validate an LED index (0-based).
pub fn validate_led_index(index: u8) -> Result<u8> {
    if index > MAX_LED_INDEX {
        return Err(Error::OutOfRange {
            field: "led_index",
            value: index as u32,
            min: 0,
            max: MAX_LED_INDEX as u32,
        });
    }
    Ok(index)
}
