//! HID transport abstraction for device communication.
//!
//! Provides a trait-based transport layer so that real HID devices and
//! mock devices share the same interface.

use crate::config::IdentityMode;
use crate::error::Result;
use std::sync::Arc;

/// Callback fired whenever the attached device set may have changed.
///
/// May be invoked from any thread, and more than once for a single change.
pub type ChangeListener = Arc<dyn Fn() + Send + Sync>;

/// One candidate HID interface as reported by enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub vendor_id: u16,
    pub product_id: u16,
    /// OS device path, unique per attached interface.
    pub path: String,
    pub serial: Option<String>,
    pub product_name: Option<String>,
    /// Largest feature report in bytes (including report ID), 0 if none.
    pub max_feature_report_len: usize,
}

impl DeviceInfo {
    /// Whether this interface is the LED control channel.
    ///
    /// Composite devices expose sibling interfaces; only the control one
    /// declares feature reports.
    pub fn has_feature_reports(&self) -> bool {
        self.max_feature_report_len > 0
    }

    /// Identity string under the given mode, falling back to the device path
    /// when the attribute is missing or blank.
    pub fn identity(&self, mode: IdentityMode) -> String {
        let attr = match mode {
            IdentityMode::Serial => self.serial.as_deref(),
            IdentityMode::FriendlyName => self.product_name.as_deref(),
        };
        match attr.map(str::trim) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => self.path.clone(),
        }
    }
}

/// Blocking feature-report writer for one open device.
pub trait FeatureReportWriter: Send {
    /// Write a feature report; `data[0]` is the report ID.
    fn send_feature_report(&self, data: &[u8]) -> Result<()>;
}

/// Abstraction over HID enumeration, open, and change notification.
pub trait HidTransport: Send + Sync {
    /// List interfaces whose vendor ID is in `vendor_ids`.
    fn enumerate(&self, vendor_ids: &[u16]) -> Result<Vec<DeviceInfo>>;

    /// Open an enumerated interface for writing.
    fn open(&self, info: &DeviceInfo) -> Result<Box<dyn FeatureReportWriter>>;

    /// Register a listener for device-set changes.
    fn watch(&self, listener: ChangeListener) -> Result<()>;
}

/// A mock HID transport for testing.
///
/// Holds a scripted set of attached devices and records every write.
#[cfg(test)]
pub mod mock {
    use super::*;
    use crate::error::Error;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    type Hook = Box<dyn FnOnce() + Send>;

    /// Build a control-interface `DeviceInfo` with a serial number.
    pub fn device(vendor_id: u16, product_id: u16, serial: &str) -> DeviceInfo {
        DeviceInfo {
            vendor_id,
            product_id,
            path: format!("/dev/hidraw-{product_id:04x}-{serial}"),
            serial: Some(serial.to_string()),
            product_name: Some(format!("VPC Device {product_id:04X}")),
            max_feature_report_len: 38,
        }
    }

    /// Mock transport with mutable device list.
    #[derive(Default)]
    pub struct MockTransport {
        devices: Mutex<Vec<DeviceInfo>>,
        listeners: Mutex<Vec<ChangeListener>>,
        writes: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
        opens: Mutex<HashMap<String, usize>>,
        fail_writes: Arc<AtomicBool>,
        fail_enumerate: AtomicBool,
        enumerate_hook: Mutex<Option<Hook>>,
        open_hook: Mutex<Option<Hook>>,
    }

    impl MockTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_devices(devices: Vec<DeviceInfo>) -> Self {
            let mock = Self::new();
            mock.set_devices(devices);
            mock
        }

        /// Replace the attached device set (does not notify).
        pub fn set_devices(&self, devices: Vec<DeviceInfo>) {
            *self.devices.lock().unwrap() = devices;
        }

        /// Fire all registered listeners on the calling thread.
        pub fn notify(&self) {
            let listeners = self.listeners.lock().unwrap().clone();
            for listener in listeners {
                listener();
            }
        }

        pub fn listener_count(&self) -> usize {
            self.listeners.lock().unwrap().len()
        }

        /// All writes so far as `(path, bytes)`.
        pub fn writes(&self) -> Vec<(String, Vec<u8>)> {
            self.writes.lock().unwrap().clone()
        }

        /// How many times the interface at `path` was opened.
        pub fn open_count(&self, path: &str) -> usize {
            self.opens.lock().unwrap().get(path).copied().unwrap_or(0)
        }

        pub fn set_fail_writes(&self, fail: bool) {
            self.fail_writes.store(fail, Ordering::SeqCst);
        }

        pub fn set_fail_enumerate(&self, fail: bool) {
            self.fail_enumerate.store(fail, Ordering::SeqCst);
        }

        /// Run `hook` inside the next `enumerate`, after the snapshot is taken.
        pub fn on_next_enumerate(&self, hook: impl FnOnce() + Send + 'static) {
            *self.enumerate_hook.lock().unwrap() = Some(Box::new(hook));
        }

        /// Run `hook` inside the next `open`, after the open is counted.
        pub fn on_next_open(&self, hook: impl FnOnce() + Send + 'static) {
            *self.open_hook.lock().unwrap() = Some(Box::new(hook));
        }
    }

    struct MockWriter {
        path: String,
        writes: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
        fail: Arc<AtomicBool>,
    }

    impl FeatureReportWriter for MockWriter {
        fn send_feature_report(&self, data: &[u8]) -> Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::Hid(format!("mock: write to {} failed", self.path)));
            }
            self.writes
                .lock()
                .unwrap()
                .push((self.path.clone(), data.to_vec()));
            Ok(())
        }
    }

    impl HidTransport for MockTransport {
        fn enumerate(&self, vendor_ids: &[u16]) -> Result<Vec<DeviceInfo>> {
            if self.fail_enumerate.load(Ordering::SeqCst) {
                return Err(Error::Hid("mock: enumeration failed".into()));
            }
            let snapshot: Vec<DeviceInfo> = self
                .devices
                .lock()
                .unwrap()
                .iter()
                .filter(|d| vendor_ids.contains(&d.vendor_id))
                .cloned()
                .collect();

            let hook = self.enumerate_hook.lock().unwrap().take();
            if let Some(hook) = hook {
                hook();
            }
            Ok(snapshot)
        }

        fn open(&self, info: &DeviceInfo) -> Result<Box<dyn FeatureReportWriter>> {
            *self
                .opens
                .lock()
                .unwrap()
                .entry(info.path.clone())
                .or_insert(0) += 1;

            let hook = self.open_hook.lock().unwrap().take();
            if let Some(hook) = hook {
                hook();
            }
            Ok(Box::new(MockWriter {
                path: info.path.clone(),
                writes: Arc::clone(&self.writes),
                fail: Arc::clone(&self.fail_writes),
            }))
        }

        fn watch(&self, listener: ChangeListener) -> Result<()> {
            self.listeners.lock().unwrap().push(listener);
            Ok(())
        }
    }
}
