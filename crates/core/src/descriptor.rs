//! HID report descriptor scanning.
//!
//! Only what is needed to tell a device's LED control interface apart from
//! its sibling interfaces: the size of the largest feature report.

use std::collections::BTreeMap;

/// Long item prefix (`bSize = 2, bType = 3, bTag = 0xF`).
const LONG_ITEM: u8 = 0xFE;

/// Item prefixes with the size bits masked off.
mod item {
    pub const FEATURE: u8 = 0xB0;
    pub const REPORT_SIZE: u8 = 0x74;
    pub const REPORT_ID: u8 = 0x84;
    pub const REPORT_COUNT: u8 = 0x94;
    pub const PUSH: u8 = 0xA4;
    pub const POP: u8 = 0xB4;
}

#[derive(Debug, Clone, Copy, Default)]
struct Globals {
    report_size: u32,
    report_count: u32,
    report_id: u8,
}

/// Largest feature report in bytes, including the report ID byte.
///
/// Returns 0 when the descriptor declares no feature reports. A truncated
/// trailing item ends the scan without failing.
pub fn max_feature_report_len(descriptor: &[u8]) -> usize {
    let mut globals = Globals::default();
    let mut stack = Vec::new();
    let mut feature_bits: BTreeMap<u8, u32> = BTreeMap::new();

    let mut pos = 0;
    while pos < descriptor.len() {
        let prefix = descriptor[pos];

        if prefix == LONG_ITEM {
            // bDataSize, bLongItemTag, then data. None are defined by HID 1.11.
            let size = descriptor.get(pos + 1).copied().unwrap_or(0) as usize;
            pos += 3 + size;
            continue;
        }

        let size = match prefix & 0x03 {
            0 => 0,
            1 => 1,
            2 => 2,
            _ => 4,
        };
        let Some(data) = descriptor.get(pos + 1..pos + 1 + size) else {
            break;
        };
        let value = data
            .iter()
            .rev()
            .fold(0u32, |acc, &b| (acc << 8) | b as u32);

        match prefix & 0xFC {
            item::FEATURE => {
                let bits = globals.report_size.saturating_mul(globals.report_count);
                let total = feature_bits.entry(globals.report_id).or_default();
                *total = total.saturating_add(bits);
            }
            item::REPORT_SIZE => globals.report_size = value,
            item::REPORT_COUNT => globals.report_count = value,
            item::REPORT_ID => globals.report_id = value as u8,
            item::PUSH => stack.push(globals),
            item::POP => {
                if let Some(saved) = stack.pop() {
                    globals = saved;
                }
            }
            _ => {}
        }

        pos += 1 + size;
    }

    feature_bits
        .values()
        .filter(|&&bits| bits > 0)
        .map(|bits| bits.div_ceil(8) as usize + 1)
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Vendor collection with a 37-byte feature report under ID 2.
    const LED_INTERFACE: &[u8] = &[
        0x06, 0x00, 0xFF, // Usage Page (Vendor 0xFF00)
        0x09, 0x01, // Usage (1)
        0xA1, 0x01, // Collection (Application)
        0x85, 0x02, //   Report ID (2)
        0x75, 0x08, //   Report Size (8)
        0x95, 0x25, //   Report Count (37)
        0x09, 0x02, //   Usage (2)
        0xB1, 0x02, //   Feature (Data, Var, Abs)
        0xC0, // End Collection
    ];

    /// Joystick-style interface with only input reports.
    const INPUT_INTERFACE: &[u8] = &[
        0x05, 0x01, // Usage Page (Generic Desktop)
        0x09, 0x04, // Usage (Joystick)
        0xA1, 0x01, // Collection (Application)
        0x75, 0x10, //   Report Size (16)
        0x95, 0x04, //   Report Count (4)
        0x81, 0x02, //   Input (Data, Var, Abs)
        0xC0, // End Collection
    ];

    #[test]
    fn led_interface_has_38_byte_feature_report() {
        assert_eq!(max_feature_report_len(LED_INTERFACE), 38);
    }

    #[test]
    fn input_only_interface_has_none() {
        assert_eq!(max_feature_report_len(INPUT_INTERFACE), 0);
    }

    #[test]
    fn empty_descriptor() {
        assert_eq!(max_feature_report_len(&[]), 0);
    }

    #[test]
    fn picks_largest_report_id() {
        let desc = [
            0x85, 0x01, 0x75, 0x08, 0x95, 0x04, 0xB1, 0x02, // ID 1: 4 bytes
            0x85, 0x03, 0x95, 0x10, 0xB1, 0x02, // ID 3: 16 bytes
            0x85, 0x01, 0x95, 0x02, 0xB1, 0x02, // ID 1 again: +2 bytes
        ];
        assert_eq!(max_feature_report_len(&desc), 17);
    }

    #[test]
    fn partial_bytes_round_up() {
        let desc = [0x75, 0x01, 0x95, 0x03, 0xB1, 0x02];
        assert_eq!(max_feature_report_len(&desc), 2);
    }

    #[test]
    fn push_pop_restores_globals() {
        let desc = [
            0x75, 0x08, 0x95, 0x02, // size 8, count 2
            0xA4, // Push
            0x95, 0x40, // count 64
            0xB4, // Pop
            0xB1, 0x02, // Feature: 2 bytes
        ];
        assert_eq!(max_feature_report_len(&desc), 3);
    }

    #[test]
    fn multi_byte_values_are_little_endian() {
        let desc = [0x75, 0x08, 0x96, 0x00, 0x01, 0xB1, 0x02]; // count 256
        assert_eq!(max_feature_report_len(&desc), 257);
    }

    #[test]
    fn long_items_are_skipped() {
        let desc = [
            0xFE, 0x02, 0x10, 0xB1, 0x02, // long item whose data looks like Feature
            0x75, 0x08, 0x95, 0x01, 0xB1, 0x02,
        ];
        assert_eq!(max_feature_report_len(&desc), 2);
    }

    #[test]
    fn truncated_item_stops_scan() {
        let desc = [0x75, 0x08, 0x95, 0x01, 0xB1, 0x02, 0x96, 0x01];
        assert_eq!(max_feature_report_len(&desc), 2);
    }
}
