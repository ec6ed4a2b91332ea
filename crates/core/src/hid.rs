//! `hidapi`-backed transport.
//!
//! hidapi has no native hotplug events, so [`HidapiTransport::watch`] starts a
//! background thread that re-enumerates on a fixed period and fires the
//! listeners whenever the set of attached HID paths changes.

use crate::descriptor;
use crate::error::{Error, Result};
use crate::transport::{ChangeListener, DeviceInfo, FeatureReportWriter, HidTransport};
use hidapi::{HidApi, HidDevice};
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap};
use std::ffi::CString;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Upper bound on a HID report descriptor (`HID_API_MAX_REPORT_DESCRIPTOR_SIZE`).
const MAX_REPORT_DESCRIPTOR_SIZE: usize = 4096;

/// Cross-platform HID transport over `hidapi`.
pub struct HidapiTransport {
    api: Arc<Mutex<HidApi>>,
    /// Max feature report length per device path; reading it requires an open.
    feature_lens: Mutex<HashMap<String, usize>>,
    listeners: Arc<Mutex<Vec<ChangeListener>>>,
    watcher_started: AtomicBool,
    stop: Arc<AtomicBool>,
    poll_interval: Duration,
}

impl HidapiTransport {
    pub fn new(poll_interval: Duration) -> Result<Self> {
        let api = HidApi::new().map_err(|e| Error::Hid(format!("hidapi init: {e}")))?;
        Ok(Self {
            api: Arc::new(Mutex::new(api)),
            feature_lens: Mutex::new(HashMap::new()),
            listeners: Arc::new(Mutex::new(Vec::new())),
            watcher_started: AtomicBool::new(false),
            stop: Arc::new(AtomicBool::new(false)),
            poll_interval,
        })
    }

    fn feature_report_len(&self, api: &HidApi, info: &hidapi::DeviceInfo) -> usize {
        let path = info.path().to_string_lossy().into_owned();
        if let Some(len) = self.feature_lens.lock().get(&path) {
            return *len;
        }

        let len = match info.open_device(api) {
            Ok(device) => {
                let mut buf = [0u8; MAX_REPORT_DESCRIPTOR_SIZE];
                match device.get_report_descriptor(&mut buf) {
                    Ok(n) => descriptor::max_feature_report_len(&buf[..n]),
                    Err(e) => {
                        debug!(path = %path, error = %e, "Report descriptor unavailable");
                        0
                    }
                }
            }
            Err(e) => {
                // Not cached: permissions may be fixed before the next pass.
                debug!(path = %path, error = %e, "Cannot open interface to inspect it");
                return 0;
            }
        };

        trace!(path = %path, feature_len = len, "Inspected HID interface");
        self.feature_lens.lock().insert(path, len);
        len
    }

    fn start_watcher(&self) -> Result<()> {
        let api = Arc::clone(&self.api);
        let listeners = Arc::clone(&self.listeners);
        let stop = Arc::clone(&self.stop);
        let interval = self.poll_interval;
        let mut known = attached_paths(&api);

        thread::Builder::new()
            .name("hid-hotplug-watcher".into())
            .spawn(move || {
                info!(interval_ms = interval.as_millis() as u64, "HID hotplug watcher started");
                while !stop.load(Ordering::Relaxed) {
                    thread::sleep(interval);
                    if stop.load(Ordering::Relaxed) {
                        break;
                    }

                    notify_if_changed(&mut known, attached_paths(&api), &listeners);
                }
                debug!("HID hotplug watcher stopped");
            })
            .map_err(|e| Error::Hid(format!("spawn hotplug watcher: {e}")))?;
        Ok(())
    }
}

/// Replace `known` with `current` and fire every listener if they differ.
///
/// Listeners run on a cloned list, without holding the listener lock.
fn notify_if_changed(
    known: &mut BTreeSet<String>,
    current: BTreeSet<String>,
    listeners: &Mutex<Vec<ChangeListener>>,
) -> bool {
    if current == *known {
        return false;
    }
    debug!(
        before = known.len(),
        after = current.len(),
        "HID device list changed"
    );
    *known = current;

    let to_notify = listeners.lock().clone();
    for listener in to_notify {
        listener();
    }
    true
}

/// Refresh the hidapi device list and return every attached path.
fn attached_paths(api: &Mutex<HidApi>) -> BTreeSet<String> {
    let mut api = api.lock();
    if let Err(e) = api.refresh_devices() {
        warn!(error = %e, "Failed to refresh HID device list");
    }
    api.device_list()
        .map(|d| d.path().to_string_lossy().into_owned())
        .collect()
}

impl HidTransport for HidapiTransport {
    fn enumerate(&self, vendor_ids: &[u16]) -> Result<Vec<DeviceInfo>> {
        let mut api = self.api.lock();
        api.refresh_devices()?;

        let mut devices = Vec::new();
        for info in api.device_list() {
            if !vendor_ids.contains(&info.vendor_id()) {
                continue;
            }
            devices.push(DeviceInfo {
                vendor_id: info.vendor_id(),
                product_id: info.product_id(),
                path: info.path().to_string_lossy().into_owned(),
                serial: info.serial_number().map(str::to_string),
                product_name: info.product_string().map(str::to_string),
                max_feature_report_len: self.feature_report_len(&api, info),
            });
        }

        self.feature_lens
            .lock()
            .retain(|path, _| devices.iter().any(|d| &d.path == path));

        debug!(count = devices.len(), "HID enumeration complete");
        Ok(devices)
    }

    fn open(&self, info: &DeviceInfo) -> Result<Box<dyn FeatureReportWriter>> {
        let path = CString::new(info.path.as_str())
            .map_err(|_| Error::Hid(format!("device path contains NUL: {:?}", info.path)))?;
        let device = self.api.lock().open_path(&path).map_err(|e| {
            Error::Hid(format!(
                "open HID device (VID=0x{:04X} PID=0x{:04X}): {e}",
                info.vendor_id, info.product_id
            ))
        })?;
        Ok(Box::new(HidapiWriter { device }))
    }

    fn watch(&self, listener: ChangeListener) -> Result<()> {
        self.listeners.lock().push(listener);
        if !self.watcher_started.swap(true, Ordering::SeqCst) {
            if let Err(e) = self.start_watcher() {
                self.watcher_started.store(false, Ordering::SeqCst);
                return Err(e);
            }
        }
        Ok(())
    }
}

impl Drop for HidapiTransport {
    fn drop(&mut self) {
        // Not joined: the last reference may be dropped on the watcher thread.
        self.stop.store(true, Ordering::Relaxed);
    }
}

struct HidapiWriter {
    device: HidDevice,
}

impl FeatureReportWriter for HidapiWriter {
    fn send_feature_report(&self, data: &[u8]) -> Result<()> {
        self.device
            .send_feature_report(data)
            .map_err(|e| Error::Hid(format!("send_feature_report: {e}")))
    }
}
