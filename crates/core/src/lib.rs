//! virpil-led-core: LED packet encoding, device registry, and hotplug tracking.
//!
//! This crate provides the cross-platform core logic for driving the RGB LEDs
//! of Virpil controllers through HID feature reports, and for keeping a live
//! view of which controllers are attached.

pub mod config;
pub mod descriptor;
pub mod device;
pub mod error;
pub mod hid;
pub mod led;
pub mod packet;
pub mod reconciler;
pub mod registry;
pub mod safety;
pub mod transport;

pub use config::{IdentityMode, MonitorConfig};
pub use device::{DeviceFamily, DeviceHandle};
pub use error::{Error, ErrorKind, Result};
pub use led::{BoardType, LedColor, LedPower};
pub use registry::{global, DeviceKey, DeviceRegistry, RegistryCell};

/// Virpil USB Vendor ID.
pub const VIRPIL_VID: u16 = 0x3344;

/// Known Virpil product IDs, grouped by product family.
pub mod pids {
    /// VPC Control Panel #1.
    pub const CONTROL_PANEL_1: &[u16] = &[0x0259];
    /// VPC Control Panel #2.
    pub const CONTROL_PANEL_2: &[u16] = &[0x025B, 0x825B];
    /// MongoosT-50CM2 throttle.
    pub const THROTTLE_CM2: &[u16] = &[0x8193];
    /// MongoosT-50CM3 throttle, both hardware revisions.
    pub const THROTTLE_CM3: &[u16] = &[0x0194, 0x8194];
}
