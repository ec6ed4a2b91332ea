//! Device model: known product families and open device handles.

use crate::config::IdentityMode;
use crate::error::Result;
use crate::led::{BoardType, LedColor, LedPower};
use crate::packet;
use crate::pids;
use crate::transport::{DeviceInfo, FeatureReportWriter, HidTransport};
use parking_lot::Mutex;
use tracing::{debug, info, trace};

/// Known Virpil product families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceFamily {
    ControlPanel1,
    ControlPanel2,
    ThrottleCm2,
    ThrottleCm3,
}

impl DeviceFamily {
    pub const ALL: &'static [DeviceFamily] = &[
        DeviceFamily::ControlPanel1,
        DeviceFamily::ControlPanel2,
        DeviceFamily::ThrottleCm2,
        DeviceFamily::ThrottleCm3,
    ];

    /// Look up family from USB product ID.
    pub fn from_pid(pid: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.pids().contains(&pid))
    }

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ControlPanel1 => "VPC Control Panel #1",
            Self::ControlPanel2 => "VPC Control Panel #2",
            Self::ThrottleCm2 => "VPC Throttle MongoosT-50CM2",
            Self::ThrottleCm3 => "VPC Throttle MongoosT-50CM3",
        }
    }

    /// All product IDs shipped for this family.
    pub fn pids(&self) -> &'static [u16] {
        match self {
            Self::ControlPanel1 => pids::CONTROL_PANEL_1,
            Self::ControlPanel2 => pids::CONTROL_PANEL_2,
            Self::ThrottleCm2 => pids::THROTTLE_CM2,
            Self::ThrottleCm3 => pids::THROTTLE_CM3,
        }
    }
}

impl std::fmt::Display for DeviceFamily {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// An open connection to one physical device's LED control interface.
///
/// A handle built without a backing device (a "null handle") accepts
/// commands but never performs I/O; `send_command` reports `false`.
pub struct DeviceHandle {
    vendor_id: u16,
    product_id: u16,
    identity: String,
    /// OS path the writer was opened on; empty for a null handle.
    path: String,
    writer: Mutex<Option<Box<dyn FeatureReportWriter>>>,
}

impl DeviceHandle {
    /// Wrap an already opened writer.
    pub fn new(
        vendor_id: u16,
        product_id: u16,
        identity: impl Into<String>,
        path: impl Into<String>,
        writer: Box<dyn FeatureReportWriter>,
    ) -> Self {
        Self {
            vendor_id,
            product_id,
            identity: identity.into(),
            path: path.into(),
            writer: Mutex::new(Some(writer)),
        }
    }

    /// A handle with no device behind it.
    pub fn null(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
            identity: String::new(),
            path: String::new(),
            writer: Mutex::new(None),
        }
    }

    /// Open the first control interface matching the vendor and product ID.
    ///
    /// Absence of a matching device yields a null handle, not an error.
    pub fn open_first(
        transport: &dyn HidTransport,
        vendor_id: u16,
        product_id: u16,
        mode: IdentityMode,
    ) -> Result<Self> {
        let found = transport
            .enumerate(&[vendor_id])?
            .into_iter()
            .find(|d| d.product_id == product_id && d.has_feature_reports());

        match found {
            Some(info) => Self::open(transport, &info, mode),
            None => {
                debug!(
                    vid = format_args!("0x{:04X}", vendor_id),
                    pid = format_args!("0x{:04X}", product_id),
                    "No matching device, returning null handle"
                );
                Ok(Self::null(vendor_id, product_id))
            }
        }
    }

    /// Open an enumerated interface.
    pub fn open(transport: &dyn HidTransport, info: &DeviceInfo, mode: IdentityMode) -> Result<Self> {
        let writer = transport.open(info)?;
        let identity = info.identity(mode);
        info!(
            vid = format_args!("0x{:04X}", info.vendor_id),
            pid = format_args!("0x{:04X}", info.product_id),
            identity = %identity,
            path = %info.path,
            "Opened device"
        );
        Ok(Self::new(
            info.vendor_id,
            info.product_id,
            identity,
            info.path.clone(),
            writer,
        ))
    }

    pub fn vendor_id(&self) -> u16 {
        self.vendor_id
    }

    pub fn product_id(&self) -> u16 {
        self.product_id
    }

    /// Serial number or friendly name, depending on the identity mode.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn family(&self) -> Option<DeviceFamily> {
        DeviceFamily::from_pid(self.product_id)
    }

    pub fn is_open(&self) -> bool {
        self.writer.lock().is_some()
    }

    /// Release the device connection. Later commands report `false`.
    pub fn close(&self) {
        if self.writer.lock().take().is_some() {
            debug!(
                pid = format_args!("0x{:04X}", self.product_id),
                identity = %self.identity,
                "Closed device"
            );
        }
    }

    /// Send an LED command.
    ///
    /// Returns `Ok(true)` once the report is written and `Ok(false)` when no
    /// device backs this handle. Bad arguments and write failures are errors;
    /// writes are never retried.
    pub fn send_command(
        &self,
        board: BoardType,
        led_index: u8,
        red: LedPower,
        green: LedPower,
        blue: LedPower,
    ) -> Result<bool> {
        let report = packet::encode(board, led_index, red, green, blue)?;

        let guard = self.writer.lock();
        let Some(writer) = guard.as_ref() else {
            return Ok(false);
        };

        debug!(
            pid = format_args!("0x{:04X}", self.product_id),
            board = %board,
            led = led_index,
            red = %red,
            green = %green,
            blue = %blue,
            "Sending LED command"
        );
        trace!(report_hex = format_args!("{:02X?}", report), "LED TX");

        writer.send_feature_report(&report)?;
        Ok(true)
    }

    /// Send an LED command from an [`LedColor`].
    pub fn send_color(&self, board: BoardType, led_index: u8, color: LedColor) -> Result<bool> {
        self.send_command(board, led_index, color.red, color.green, color.blue)
    }
}

impl std::fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("vendor_id", &format_args!("0x{:04X}", self.vendor_id))
            .field("product_id", &format_args!("0x{:04X}", self.product_id))
            .field("identity", &self.identity)
            .field("path", &self.path)
            .field("open", &self.is_open())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ErrorKind};
    use crate::transport::mock::{device, MockTransport};
    use crate::VIRPIL_VID;

    #[test]
    fn family_from_known_pid() {
        assert_eq!(
            DeviceFamily::from_pid(0x0259),
            Some(DeviceFamily::ControlPanel1)
        );
        assert_eq!(
            DeviceFamily::from_pid(0x025B),
            Some(DeviceFamily::ControlPanel2)
        );
        assert_eq!(
            DeviceFamily::from_pid(0x825B),
            Some(DeviceFamily::ControlPanel2)
        );
        assert_eq!(
            DeviceFamily::from_pid(0x8193),
            Some(DeviceFamily::ThrottleCm2)
        );
        assert_eq!(
            DeviceFamily::from_pid(0x0194),
            Some(DeviceFamily::ThrottleCm3)
        );
    }

    #[test]
    fn family_from_unknown_pid() {
        assert_eq!(DeviceFamily::from_pid(0x1234), None);
    }

    #[test]
    fn send_command_writes_packet() {
        let mock = MockTransport::with_devices(vec![device(VIRPIL_VID, 0x825B, "CP2")]);
        let handle =
            DeviceHandle::open_first(&mock, VIRPIL_VID, 0x825B, IdentityMode::Serial).unwrap();
        assert!(handle.is_open());
        assert_eq!(handle.identity(), "CP2");
        assert_eq!(handle.family(), Some(DeviceFamily::ControlPanel2));

        let sent = handle
            .send_command(
                BoardType::OnBoard,
                3,
                LedPower::Full,
                LedPower::Zero,
                LedPower::Sixty,
            )
            .unwrap();
        assert!(sent);

        let writes = mock.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].1.len(), packet::PACKET_LEN);
        assert_eq!(writes[0].1[2], 7);
        assert_eq!(writes[0].1[7], 0xA3);
    }

    #[test]
    fn open_first_skips_sibling_interfaces() {
        let mut sibling = device(VIRPIL_VID, 0x825B, "CP2");
        sibling.path = "/dev/hidraw-input".into();
        sibling.max_feature_report_len = 0;
        let control = device(VIRPIL_VID, 0x825B, "CP2");
        let mock = MockTransport::with_devices(vec![sibling, control.clone()]);

        let handle =
            DeviceHandle::open_first(&mock, VIRPIL_VID, 0x825B, IdentityMode::Serial).unwrap();
        assert!(handle.is_open());
        assert_eq!(handle.path(), control.path);
        assert_eq!(mock.open_count("/dev/hidraw-input"), 0);
        assert_eq!(mock.open_count(&control.path), 1);
    }

    #[test]
    fn null_handle_returns_false_without_io() {
        let mock = MockTransport::new();
        let handle =
            DeviceHandle::open_first(&mock, VIRPIL_VID, 0x8194, IdentityMode::Serial).unwrap();
        assert!(!handle.is_open());

        let sent = handle
            .send_command(
                BoardType::OnBoard,
                0,
                LedPower::Full,
                LedPower::Full,
                LedPower::Full,
            )
            .unwrap();
        assert!(!sent);
        assert!(mock.writes().is_empty());
    }

    #[test]
    fn null_handle_still_rejects_bad_arguments() {
        let handle = DeviceHandle::null(VIRPIL_VID, 0x8194);
        let result = handle.send_command(
            BoardType::ExtraBoard,
            0,
            LedPower::Full,
            LedPower::Full,
            LedPower::Full,
        );
        assert!(matches!(result, Err(Error::UnsupportedBoard(_))));
    }

    #[test]
    fn write_failure_is_transport_error() {
        let mock = MockTransport::with_devices(vec![device(VIRPIL_VID, 0x8193, "T")]);
        let handle =
            DeviceHandle::open_first(&mock, VIRPIL_VID, 0x8193, IdentityMode::Serial).unwrap();
        mock.set_fail_writes(true);

        let err = handle
            .send_color(BoardType::SlaveBoard, 1, "FFFFFF".parse().unwrap())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransportFailure);
    }

    #[test]
    fn closed_handle_stops_sending() {
        let mock = MockTransport::with_devices(vec![device(VIRPIL_VID, 0x0259, "CP1")]);
        let handle =
            DeviceHandle::open_first(&mock, VIRPIL_VID, 0x0259, IdentityMode::Serial).unwrap();
        handle.close();
        assert!(!handle.is_open());
        let sent = handle
            .send_color(BoardType::AddBoard, 0, LedColor::OFF)
            .unwrap();
        assert!(!sent);
        assert!(mock.writes().is_empty());
    }
}
