//! Monitor configuration.

use crate::error::{Error, Result};
use crate::VIRPIL_VID;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Hotplug watcher period bounds, in milliseconds.
pub const POLL_INTERVAL_MIN_MS: u64 = 50;
pub const POLL_INTERVAL_MAX_MS: u64 = 60_000;

/// Which device attribute distinguishes units sharing a product ID.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdentityMode {
    /// USB serial number.
    #[default]
    Serial,
    /// USB product string.
    FriendlyName,
}

/// Registry and transport configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorConfig {
    /// Primary vendor ID.
    pub vendor_id: u16,
    /// Additional vendor IDs to monitor.
    pub extra_vendor_ids: Vec<u16>,
    /// Identity attribute used as the registry sub-key.
    pub identity: IdentityMode,
    /// Period of the hidapi hotplug watcher.
    pub poll_interval_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            vendor_id: VIRPIL_VID,
            extra_vendor_ids: Vec::new(),
            identity: IdentityMode::Serial,
            poll_interval_ms: 1000,
        }
    }
}

impl MonitorConfig {
    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("read {}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("parse {}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Check field ranges.
    pub fn validate(&self) -> Result<()> {
        if self.vendor_id == 0 {
            return Err(Error::Config("vendor_id must be non-zero".into()));
        }
        if !(POLL_INTERVAL_MIN_MS..=POLL_INTERVAL_MAX_MS).contains(&self.poll_interval_ms) {
            return Err(Error::OutOfRange {
                field: "poll_interval_ms",
                value: self.poll_interval_ms.min(u32::MAX as u64) as u32,
                min: POLL_INTERVAL_MIN_MS as u32,
                max: POLL_INTERVAL_MAX_MS as u32,
            });
        }
        Ok(())
    }

    /// Primary vendor ID followed by the extras, without duplicates.
    pub fn monitored_vendor_ids(&self) -> Vec<u16> {
        let mut ids = vec![self.vendor_id];
        for id in &self.extra_vendor_ids {
            if !ids.contains(id) {
                ids.push(*id);
            }
        }
        ids
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}
