//! Registry of attached devices.
//!
//! Handles are keyed by product ID, then by identity string (serial number or
//! friendly name), so several units of the same model can be attached at once.
//! The map is read by command-sending threads and rewritten by hotplug
//! reconciliation; readers always see whole reconciliation passes.

use crate::config::MonitorConfig;
use crate::device::DeviceHandle;
use crate::error::Result;
use crate::reconciler::{HotplugReconciler, PassOutcome};
use crate::transport::HidTransport;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info, warn};

/// Registry key: product ID plus identity string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceKey {
    pub product_id: u16,
    pub identity: String,
}

impl DeviceKey {
    pub fn new(product_id: u16, identity: impl Into<String>) -> Self {
        Self {
            product_id,
            identity: identity.into(),
        }
    }

    pub fn of(handle: &DeviceHandle) -> Self {
        Self::new(handle.product_id(), handle.identity())
    }
}

impl std::fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:04X}/{}", self.product_id, self.identity)
    }
}

struct Slot {
    /// Discovery order, used to break product-ID-only lookups.
    seq: u64,
    handle: Arc<DeviceHandle>,
}

#[derive(Default)]
struct Inner {
    by_pid: HashMap<u16, HashMap<String, Slot>>,
    next_seq: u64,
}

impl Inner {
    fn insert(&mut self, handle: DeviceHandle) -> bool {
        let seq = self.next_seq;
        let identities = self.by_pid.entry(handle.product_id()).or_default();
        if identities.contains_key(handle.identity()) {
            return false;
        }
        self.next_seq += 1;
        identities.insert(
            handle.identity().to_string(),
            Slot {
                seq,
                handle: Arc::new(handle),
            },
        );
        true
    }

    fn remove(&mut self, key: &DeviceKey) -> Option<Arc<DeviceHandle>> {
        let identities = self.by_pid.get_mut(&key.product_id)?;
        let slot = identities.remove(&key.identity);
        if identities.is_empty() {
            self.by_pid.remove(&key.product_id);
        }
        slot.map(|s| s.handle)
    }
}

/// Concurrent `product ID → identity → handle` map.
///
/// No product ID ever maps to an empty identity map.
#[derive(Default)]
pub struct DeviceMap {
    inner: RwLock<Inner>,
}

impl DeviceMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a handle. Without an identity, the earliest-discovered handle
    /// for the product ID is returned.
    pub fn get(&self, product_id: u16, identity: Option<&str>) -> Option<Arc<DeviceHandle>> {
        let inner = self.inner.read();
        let identities = inner.by_pid.get(&product_id)?;
        let slot = match identity {
            Some(id) => identities.get(id),
            None => identities.values().min_by_key(|s| s.seq),
        };
        slot.map(|s| Arc::clone(&s.handle))
    }

    /// Snapshot of all handles in discovery order.
    pub fn all(&self) -> Vec<Arc<DeviceHandle>> {
        let inner = self.inner.read();
        let mut slots: Vec<&Slot> = inner.by_pid.values().flat_map(|m| m.values()).collect();
        slots.sort_by_key(|s| s.seq);
        slots.into_iter().map(|s| Arc::clone(&s.handle)).collect()
    }

    pub fn keys(&self) -> HashSet<DeviceKey> {
        let inner = self.inner.read();
        inner
            .by_pid
            .iter()
            .flat_map(|(pid, ids)| ids.keys().map(move |id| DeviceKey::new(*pid, id.clone())))
            .collect()
    }

    /// Device path of every registered handle, by key.
    pub fn paths(&self) -> HashMap<DeviceKey, String> {
        let inner = self.inner.read();
        inner
            .by_pid
            .iter()
            .flat_map(|(pid, ids)| {
                ids.iter().map(move |(id, slot)| {
                    let key = DeviceKey::new(*pid, id.clone());
                    (key, slot.handle.path().to_string())
                })
            })
            .collect()
    }

    pub fn contains(&self, key: &DeviceKey) -> bool {
        let inner = self.inner.read();
        inner
            .by_pid
            .get(&key.product_id)
            .is_some_and(|ids| ids.contains_key(&key.identity))
    }

    /// Number of product IDs with at least one handle.
    pub fn product_count(&self) -> usize {
        self.inner.read().by_pid.len()
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_pid.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().by_pid.is_empty()
    }

    /// Insert a handle. Returns `false` (dropping `handle`) if its key is taken.
    pub fn insert(&self, handle: DeviceHandle) -> bool {
        self.inner.write().insert(handle)
    }

    /// Evict and close the handle under `key`.
    pub fn remove(&self, key: &DeviceKey) -> Option<Arc<DeviceHandle>> {
        let removed = self.inner.write().remove(key);
        if let Some(handle) = &removed {
            handle.close();
        }
        removed
    }

    /// Apply one reconciliation pass under a single write lock.
    ///
    /// `still_current` runs once the lock is held; when it returns `false`
    /// nothing changes and `None` is returned. Evictions precede inserts so a
    /// replugged device can take its key back in the same pass.
    ///
    /// Returns the number of handles inserted and evicted.
    pub fn apply(
        &self,
        added: Vec<DeviceHandle>,
        removed: &HashSet<DeviceKey>,
        still_current: impl FnOnce() -> bool,
    ) -> Option<(usize, usize)> {
        let mut evicted = Vec::new();
        let mut inserted = 0;
        {
            let mut inner = self.inner.write();
            if !still_current() {
                return None;
            }
            for key in removed {
                if let Some(handle) = inner.remove(key) {
                    info!(
                        pid = format_args!("0x{:04X}", key.product_id),
                        identity = %key.identity,
                        "Device removed"
                    );
                    evicted.push(handle);
                }
            }
            for handle in added {
                let key = DeviceKey::of(&handle);
                if inner.insert(handle) {
                    info!(
                        pid = format_args!("0x{:04X}", key.product_id),
                        identity = %key.identity,
                        "Detected new device"
                    );
                    inserted += 1;
                } else {
                    warn!(device = %key, "Device already registered, dropping duplicate handle");
                }
            }
        }
        // Close outside the write lock; a handle mid-send holds its writer lock.
        for handle in &evicted {
            handle.close();
        }
        Some((inserted, evicted.len()))
    }

    /// Evict and close every handle.
    pub fn clear(&self) {
        let drained: Vec<Arc<DeviceHandle>> = {
            let mut inner = self.inner.write();
            inner
                .by_pid
                .drain()
                .flat_map(|(_, ids)| ids.into_values().map(|s| s.handle))
                .collect()
        };
        for handle in drained {
            handle.close();
        }
    }
}

/// Live view of attached devices, kept current by hotplug reconciliation.
pub struct DeviceRegistry {
    devices: DeviceMap,
    reconciler: HotplugReconciler,
}

impl DeviceRegistry {
    /// Build a registry, run the first pass, and subscribe to device changes.
    ///
    /// The listener is registered only once the first pass has succeeded. A
    /// second pass then covers changes that landed before the subscription.
    pub fn new(transport: Arc<dyn HidTransport>, config: MonitorConfig) -> Result<Arc<Self>> {
        config.validate()?;
        let registry = Arc::new(Self {
            devices: DeviceMap::new(),
            reconciler: HotplugReconciler::new(Arc::clone(&transport), &config),
        });

        registry.reconcile()?;

        let weak = Arc::downgrade(&registry);
        transport.watch(Arc::new(move || {
            if let Some(registry) = weak.upgrade() {
                registry.on_devices_changed();
            }
        }))?;
        registry.on_devices_changed();

        info!(
            devices = registry.devices.len(),
            vendor_ids = ?config.monitored_vendor_ids(),
            "Device registry initialized"
        );
        Ok(registry)
    }

    /// Find a device by product ID and, optionally, identity string.
    ///
    /// With several units sharing a product ID and no identity given, the
    /// earliest-discovered one is returned.
    pub fn try_get_device(
        &self,
        product_id: u16,
        identity: Option<&str>,
    ) -> Option<Arc<DeviceHandle>> {
        self.devices.get(product_id, identity)
    }

    /// Snapshot of all attached devices.
    pub fn all_devices(&self) -> Vec<Arc<DeviceHandle>> {
        self.devices.all()
    }

    pub fn keys(&self) -> HashSet<DeviceKey> {
        self.devices.keys()
    }

    pub fn contains(&self, key: &DeviceKey) -> bool {
        self.devices.contains(key)
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Run one reconciliation pass on the calling thread.
    pub fn reconcile(&self) -> Result<PassOutcome> {
        self.reconciler.reconcile(&self.devices)
    }

    /// Hotplug listener entry point.
    pub fn on_devices_changed(&self) {
        match self.reconcile() {
            Ok(outcome) => debug!(?outcome, "Device list change handled"),
            Err(e) => warn!(error = %e, "Device reconciliation failed"),
        }
    }
}

impl Drop for DeviceRegistry {
    fn drop(&mut self) {
        self.devices.clear();
    }
}

/// Init-once holder for a process-scoped [`DeviceRegistry`].
pub struct RegistryCell {
    instance: OnceLock<Arc<DeviceRegistry>>,
    init_lock: Mutex<()>,
}

impl Default for RegistryCell {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryCell {
    pub const fn new() -> Self {
        Self {
            instance: OnceLock::new(),
            init_lock: parking_lot::const_mutex(()),
        }
    }

    /// Build the registry on first call; later calls return the existing
    /// instance and ignore their arguments.
    pub fn initialize(
        &self,
        transport: Arc<dyn HidTransport>,
        config: MonitorConfig,
    ) -> Result<Arc<DeviceRegistry>> {
        if let Some(existing) = self.instance.get() {
            return Ok(Arc::clone(existing));
        }

        let _guard = self.init_lock.lock();
        if let Some(existing) = self.instance.get() {
            debug!("Registry initialized by a concurrent caller");
            return Ok(Arc::clone(existing));
        }

        let registry = DeviceRegistry::new(transport, config)?;
        Ok(Arc::clone(self.instance.get_or_init(|| registry)))
    }

    pub fn is_initialized(&self) -> bool {
        self.instance.get().is_some()
    }

    pub fn current(&self) -> Option<Arc<DeviceRegistry>> {
        self.instance.get().cloned()
    }
}

/// The process-wide registry cell.
pub fn global() -> &'static RegistryCell {
    static GLOBAL: RegistryCell = RegistryCell::new();
    &GLOBAL
}
