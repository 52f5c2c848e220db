#![no_std]
#![deny(missing_docs)]
//! # mt76
//! This crate implements the control plane of the MT76 family of Wi-Fi chips, which sits between
//! a host wireless stack and the hardware.
//! ## Structure
//! The central element is the [Mt76Device], which is created from a set of [Mt76Resources], an
//! implementation of [Mt76Hardware] and an implementation of [HostStack]. It keeps the hardware
//! tables consistent with the interfaces, stations and keys of the host stack.
//!
//! The parts with some actual logic in them are:
//! - The [WCID table](wcid), which hands out connection table entries to stations and publishes
//!   them for lock free lookups from the data path.
//! - The [key binding](key), which tracks which key is bound to which WCID.
//! - The [device](device), which runs all configuration operations under a single mutex.
//!
//! Register access, PHY calibration, DMA and beacon timing are left to the [Mt76Hardware]
//! implementation.
//!
//! ## Configuration
//! Variable | Default | Description
//! -- | -- | --
//! `MT76_CONFIG_CALIBRATE_INTERVAL_MS` | 1000 | Interval of the periodic PHY calibration.
//! `MT76_CONFIG_WCID_SPARE_ENTRIES` | 8 | WCID entries, which can stay pinned by readers after their station was removed.

use embassy_time::Duration;
use esp_config::esp_config_int;
use wcid::{MAX_STATION_WCID, WcidPool};

#[macro_use]
extern crate defmt_or_log;

pub mod device;
pub mod hw;
pub mod key;
#[allow(missing_docs)]
pub mod regs;
mod state;
pub mod wcid;

pub use device::{Mt76Device, Mt76Error, Station, VirtualInterface};
pub use hw::{HostStack, HwError, Mt76Hardware, RegisterAccess};
pub use state::{DeviceState, RunState};

const CALIBRATE_INTERVAL_MS: u64 = esp_config_int!(u64, "MT76_CONFIG_CALIBRATE_INTERVAL_MS");
const WCID_SPARE_ENTRIES: usize = esp_config_int!(usize, "MT76_CONFIG_WCID_SPARE_ENTRIES");
/// The period of the PHY calibration.
pub const CALIBRATE_INTERVAL: Duration = Duration::from_millis(CALIBRATE_INTERVAL_MS);
/// The amount of station WCID entries.
///
/// There is one entry for every WCID the allocator can hand out, plus some spare entries, which
/// are used while a removed station is still referenced by a reader.
///
/// Not all of these can be in use at once. The group WCIDs of BSS indices 7-16 overlap with the
/// station range and are reserved by every [Mt76Device] from the start, since interfaces can be
/// added at any time. That leaves 238 WCIDs for stations.
pub const WCID_POOL_SIZE: usize = MAX_STATION_WCID as usize + 1 + WCID_SPARE_ENTRIES;

/// The resources required by the control plane.
pub struct Mt76Resources {
    wcid_pool: WcidPool,
}
impl Mt76Resources {
    /// Create new resources.
    pub const fn new() -> Self {
        Self {
            wcid_pool: WcidPool::new(),
        }
    }
}
impl Default for Mt76Resources {
    fn default() -> Self {
        Self::new()
    }
}
