//! LED command packet encoding.
//!
//! Every LED command is a single 38-byte feature report:
//!
//! | offset        | value                                   |
//! |---------------|-----------------------------------------|
//! | 0             | report ID `0x02`                        |
//! | 1             | board code                              |
//! | 2             | command id (board-specific offset + LED)|
//! | `led + 4`     | color byte                              |
//! | 37            | trailer `0xF0`                          |
//!
//! All other bytes are zero. The color byte packs three 2-bit channel codes
//! under a fixed marker bit: `1 0 BB GG RR`.

use crate::error::{Error, Result};
use crate::led::{BoardType, LedColor, LedPower};
use crate::safety;

/// Total feature report length, including the report ID.
pub const PACKET_LEN: usize = 38;
/// Report ID in byte 0.
pub const REPORT_ID: u8 = 0x02;
/// Fixed trailer in the last byte.
pub const TRAILER: u8 = 0xF0;
/// Offset of the color byte for LED 0.
pub const COLOR_OFFSET: usize = 4;
/// Marker bit always set in the color byte.
pub const COLOR_MARKER: u8 = 0b1000_0000;

/// Command id for an LED on a given board.
pub fn command_id(board: BoardType, led_index: u8) -> Result<u8> {
    match board {
        BoardType::Default => Ok(0),
        BoardType::AddBoard => Ok(led_index),
        BoardType::OnBoard => Ok(4 + led_index),
        BoardType::SlaveBoard => Ok(24 + led_index),
        BoardType::ExtraBoard => Err(Error::UnsupportedBoard(board)),
    }
}

/// Pack three channel levels into the color byte.
pub fn color_byte(red: LedPower, green: LedPower, blue: LedPower) -> u8 {
    COLOR_MARKER | red.code() | (green.code() << 2) | (blue.code() << 4)
}

/// Encode an LED command into a feature report.
pub fn encode(
    board: BoardType,
    led_index: u8,
    red: LedPower,
    green: LedPower,
    blue: LedPower,
) -> Result<[u8; PACKET_LEN]> {
    let led_index = safety::validate_led_index(led_index)?;
    let command = command_id(board, led_index)?;

    let mut buf = [0u8; PACKET_LEN];
    buf[0] = REPORT_ID;
    buf[1] = board.code();
    buf[2] = command;
    buf[led_index as usize + COLOR_OFFSET] = color_byte(red, green, blue);
    buf[PACKET_LEN - 1] = TRAILER;
    Ok(buf)
}

/// Encode an LED command from an [`LedColor`].
pub fn encode_color(board: BoardType, led_index: u8, color: LedColor) -> Result<[u8; PACKET_LEN]> {
    encode(board, led_index, color.red, color.green, color.blue)
}
