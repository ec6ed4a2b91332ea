//! LED addressing model: board types, channel power levels, and colors.
//!
//! Virpil firmware drives each LED channel with one of four discrete power
//! levels. Colors are written by hand as 6 hex digits (two per channel), where
//! every pair must be one of the canonical level strings `00`, `40`, `80`, `FF`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Physical LED board a command is addressed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum BoardType {
    /// Not a physical board; used when resetting LEDs to their defaults.
    Default = 0x64,
    /// LEDs on an add-on module.
    AddBoard = 0x65,
    /// LEDs on the board directly connected to USB.
    OnBoard = 0x66,
    /// LEDs on a slave board chained behind the USB-connected board.
    SlaveBoard = 0x67,
    /// Extra board. Has a board code but no known command-id formula.
    ExtraBoard = 0x68,
}

impl BoardType {
    /// All board types.
    pub const ALL: &'static [BoardType] = &[
        BoardType::Default,
        BoardType::AddBoard,
        BoardType::OnBoard,
        BoardType::SlaveBoard,
        BoardType::ExtraBoard,
    ];

    /// Board code as written into byte 1 of the packet.
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Look up a board type from its raw code.
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0x64 => Ok(Self::Default),
            0x65 => Ok(Self::AddBoard),
            0x66 => Ok(Self::OnBoard),
            0x67 => Ok(Self::SlaveBoard),
            0x68 => Ok(Self::ExtraBoard),
            other => Err(Error::InvalidArgument {
                field: "board_type",
                value: other as u32,
            }),
        }
    }

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::AddBoard => "add-board",
            Self::OnBoard => "on-board",
            Self::SlaveBoard => "slave-board",
            Self::ExtraBoard => "extra-board",
        }
    }
}

impl TryFrom<u8> for BoardType {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        Self::from_code(code)
    }
}

impl std::fmt::Display for BoardType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (0x{:02X})", self.name(), self.code())
    }
}

/// Brightness of a single LED channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LedPower {
    /// Off.
    Zero,
    /// Sold as 30%, measures closer to 25%.
    Thirty,
    /// Sold as 60%, measures closer to 50%.
    Sixty,
    /// 100%.
    Full,
}

impl LedPower {
    /// All power levels, dimmest first.
    pub const ALL: &'static [LedPower] = &[
        LedPower::Zero,
        LedPower::Thirty,
        LedPower::Sixty,
        LedPower::Full,
    ];

    /// 2-bit code packed into the color byte.
    pub fn code(&self) -> u8 {
        match self {
            Self::Zero => 0,
            Self::Thirty => 1,
            Self::Sixty => 2,
            Self::Full => 3,
        }
    }

    /// Look up a power level from its 2-bit code.
    pub fn from_code(code: u8) -> Result<Self> {
        match code {
            0 => Ok(Self::Zero),
            1 => Ok(Self::Thirty),
            2 => Ok(Self::Sixty),
            3 => Ok(Self::Full),
            other => Err(Error::InvalidArgument {
                field: "led_power",
                value: other as u32,
            }),
        }
    }

    /// Canonical 2-digit hex string for this level.
    pub fn hex(&self) -> &'static str {
        match self {
            Self::Zero => "00",
            Self::Thirty => "40",
            Self::Sixty => "80",
            Self::Full => "FF",
        }
    }

    /// Parse a 2-digit hex channel (case-insensitive).
    ///
    /// Only the four canonical strings are accepted; `"7F"` is not rounded.
    pub fn from_hex(pair: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.hex().eq_ignore_ascii_case(pair))
    }
}

impl TryFrom<u8> for LedPower {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        Self::from_code(code)
    }
}

impl std::fmt::Display for LedPower {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let pct = match self {
            Self::Zero => "0%",
            Self::Thirty => "30%",
            Self::Sixty => "60%",
            Self::Full => "100%",
        };
        f.write_str(pct)
    }
}

/// An RGB color in LED power levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LedColor {
    pub red: LedPower,
    pub green: LedPower,
    pub blue: LedPower,
}

impl LedColor {
    pub const OFF: LedColor = LedColor::new(LedPower::Zero, LedPower::Zero, LedPower::Zero);

    pub const fn new(red: LedPower, green: LedPower, blue: LedPower) -> Self {
        Self { red, green, blue }
    }

    /// Channels as a `(red, green, blue)` tuple.
    pub fn channels(&self) -> (LedPower, LedPower, LedPower) {
        (self.red, self.green, self.blue)
    }
}

impl FromStr for LedColor {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (red, green, blue) = parse_color(s)?;
        Ok(Self { red, green, blue })
    }
}

impl std::fmt::Display for LedColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}", self.red.hex(), self.green.hex(), self.blue.hex())
    }
}

/// Parse a 6-digit color string like `"FF4000"` into channel power levels.
pub fn parse_color(color: &str) -> Result<(LedPower, LedPower, LedPower)> {
    let invalid = || Error::InvalidColor(color.to_string());
    if color.len() != 6 {
        return Err(invalid());
    }

    // `get` rather than indexing: a multi-byte char must not panic the slice.
    let channel = |range: std::ops::Range<usize>| {
        color
            .get(range)
            .and_then(LedPower::from_hex)
            .ok_or_else(invalid)
    };

    Ok((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}
