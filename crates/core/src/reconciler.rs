//! Hotplug reconciliation: diff the attached device set against the registry.
//!
//! Change notifications arrive in bursts and on arbitrary threads. Each call
//! takes a position from a monotonically increasing generation counter, then
//! waits for the pass lock. A pass that finds a newer position already
//! admitted gives up, so the newest notification always runs last and
//! determines the final registry state.
//!
//! Superseded checks happen on entry, after enumeration, and finally under the
//! registry write lock, so an abandoned pass never mutates the registry.
//! Handles it opened are dropped, which closes them.
//!
//! A registered device that reappears under a different OS path was unplugged
//! and replugged between two polls; its old handle is evicted and a new one
//! opened in the same pass.

use crate::config::{IdentityMode, MonitorConfig};
use crate::device::DeviceHandle;
use crate::error::Result;
use crate::registry::{DeviceKey, DeviceMap};
use crate::transport::HidTransport;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Result of one reconciliation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// The pass ran to completion.
    Applied { added: usize, removed: usize },
    /// A newer notification was admitted; nothing was changed.
    Superseded,
}

/// Serializes reconciliation passes and discards superseded ones.
pub struct HotplugReconciler {
    transport: Arc<dyn HidTransport>,
    vendor_ids: Vec<u16>,
    identity: IdentityMode,
    generation: AtomicU64,
    pass_lock: Mutex<()>,
}

impl HotplugReconciler {
    pub fn new(transport: Arc<dyn HidTransport>, config: &MonitorConfig) -> Self {
        Self {
            transport,
            vendor_ids: config.monitored_vendor_ids(),
            identity: config.identity,
            generation: AtomicU64::new(0),
            pass_lock: Mutex::new(()),
        }
    }

    /// Position of the most recently admitted call.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn superseded(&self, position: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != position
    }

    /// Bring `devices` in line with what the transport currently reports.
    pub fn reconcile(&self, devices: &DeviceMap) -> Result<PassOutcome> {
        let position = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let _pass = self.pass_lock.lock();

        if self.superseded(position) {
            debug!(position, "Reconciliation superseded before start");
            return Ok(PassOutcome::Superseded);
        }

        let present = self.transport.enumerate(&self.vendor_ids)?;
        debug!(position, interfaces = present.len(), "Enumerated HID interfaces");

        let mut stale = devices.paths();
        let mut replaced = Vec::new();
        let mut seen = HashSet::new();
        let mut fresh = Vec::new();
        for info in present.into_iter().filter(|d| d.has_feature_reports()) {
            let key = DeviceKey::new(info.product_id, info.identity(self.identity));
            if !seen.insert(key.clone()) {
                warn!(
                    device = %key,
                    path = %info.path,
                    "Two attached devices share an identity, ignoring the second"
                );
                continue;
            }
            match stale.remove(&key) {
                Some(path) if path == info.path => {}
                Some(old_path) => {
                    debug!(
                        device = %key,
                        old_path = %old_path,
                        new_path = %info.path,
                        "Device path changed, replacing handle"
                    );
                    replaced.push(key);
                    fresh.push(info);
                }
                None => fresh.push(info),
            }
        }

        if self.superseded(position) {
            debug!(position, "Reconciliation superseded after enumeration");
            return Ok(PassOutcome::Superseded);
        }

        let mut opened = Vec::with_capacity(fresh.len());
        for info in &fresh {
            match DeviceHandle::open(self.transport.as_ref(), info, self.identity) {
                Ok(handle) => opened.push(handle),
                Err(e) => warn!(
                    pid = format_args!("0x{:04X}", info.product_id),
                    path = %info.path,
                    error = %e,
                    "Failed to open device, will retry on next change"
                ),
            }
        }

        let evict: HashSet<DeviceKey> = stale.into_keys().chain(replaced).collect();
        match devices.apply(opened, &evict, || !self.superseded(position)) {
            Some((added, removed)) => Ok(PassOutcome::Applied { added, removed }),
            None => {
                debug!(position, "Reconciliation superseded before apply");
                Ok(PassOutcome::Superseded)
            }
        }
    }
}
