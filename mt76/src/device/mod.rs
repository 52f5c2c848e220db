//! The device and its configuration path.
//!
//! All operations, which change the configuration of the device, run under the device mutex and
//! are therefore serialized with regards to each other. The RX path and WCID lookups never take
//! the mutex. They only rely on the [DeviceState] and the [WcidPool].
use core::cell::Cell;

use embassy_sync::blocking_mutex::{Mutex, raw::RawMutex};
use portable_atomic::{AtomicU8, Ordering};

use crate::{
    CALIBRATE_INTERVAL, Mt76Resources,
    hw::{ChannelDefinition, HostStack, HwError, Mt76Hardware, RegisterAccess},
    key::{self, KeyConf, MAX_KEY_IDX, SetKeyCommand},
    regs::*,
    state::{DeviceState, RunState},
    wcid::{MAX_STATION_WCID, WcidMask, WcidPool, WcidRef, group_wcid_idx},
};

mod interface;
mod station;

pub use interface::{
    CLIENT_BSS_OFFSET, InterfaceType, MAX_BSS_IDX, VirtualInterface, interface_index,
};
pub use station::{AmpduAction, Station};

/// The amount of EDCA queues.
pub const NUM_EDCA_QUEUES: u8 = 4;

const DEFAULT_CW_MIN: u32 = 5;
const DEFAULT_CW_MAX: u32 = 10;
const SHORT_SLOT_TIME: u32 = 9;
const LONG_SLOT_TIME: u32 = 20;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// An error returned by a device operation.
pub enum Mt76Error {
    /// No WCID is left for a new station.
    ResourceExhausted,
    /// The hardware rejected the request.
    HardwareApplyFailed(HwError),
    /// The EDCA queue doesn't exist.
    InvalidQueue,
    /// The traffic identifier is out of range.
    InvalidTrafficIdentifier,
    /// The key index can't be bound to a WCID.
    InvalidKeyIndex,
}
impl From<HwError> for Mt76Error {
    fn from(value: HwError) -> Self {
        Self::HardwareApplyFailed(value)
    }
}

bitflags::bitflags! {
    /// Parts of the device configuration, which changed.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct ConfigChanged: u32 {
        /// The listen interval changed.
        const LISTEN_INTERVAL = 1 << 2;
        /// Monitor mode was enabled or disabled.
        const MONITOR = 1 << 3;
        /// Power save was enabled or disabled.
        const PS = 1 << 4;
        /// The TX power changed.
        const POWER = 1 << 5;
        /// The channel changed.
        const CHANNEL = 1 << 6;
        /// The retry limits changed.
        const RETRY_LIMITS = 1 << 7;
        /// The idle state changed.
        const IDLE = 1 << 8;
    }
}

bitflags::bitflags! {
    /// Parts of the BSS configuration of an interface, which changed.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct BssChanged: u32 {
        /// The association state changed.
        const ASSOC = 1 << 0;
        /// CTS protection changed.
        const ERP_CTS_PROT = 1 << 1;
        /// The preamble length changed.
        const ERP_PREAMBLE = 1 << 2;
        /// The slot time changed.
        const ERP_SLOT = 1 << 3;
        /// HT parameters changed.
        const HT = 1 << 4;
        /// The basic rate set changed.
        const BASIC_RATES = 1 << 5;
        /// The beacon interval changed.
        const BEACON_INT = 1 << 6;
        /// The BSSID changed.
        const BSSID = 1 << 7;
        /// The beacon template changed.
        const BEACON = 1 << 8;
        /// Beaconing was enabled or disabled.
        const BEACON_ENABLED = 1 << 9;
    }
}

bitflags::bitflags! {
    /// RX filter flags of the host stack.
    ///
    /// A set flag requests frames of that kind to be passed up.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct FilterFlags: u32 {
        /// All frames of the own BSS.
        const PROMISC_IN_BSS = 1 << 0;
        /// All multicast frames.
        const ALLMULTI = 1 << 1;
        /// Frames with a bad FCS.
        const FCSFAIL = 1 << 2;
        /// Frames with a PLCP CRC error.
        const PLCPFAIL = 1 << 3;
        /// Beacons and probe responses of other BSSs.
        const BCN_PRBRESP_PROMISC = 1 << 4;
        /// Control frames.
        const CONTROL = 1 << 5;
        /// Frames of other BSSs.
        const OTHER_BSS = 1 << 6;
        /// PS-Poll frames.
        const PSPOLL = 1 << 7;
        /// Probe requests.
        const PROBE_REQ = 1 << 8;
    }
}

/// The filter flags, that are supported, and the drop bits, which pass those frames when cleared.
const FILTER_MAP: [(FilterFlags, RxFilterConfig); 5] = [
    (FilterFlags::PROMISC_IN_BSS, RxFilterConfig::PROMISC),
    (FilterFlags::FCSFAIL, RxFilterConfig::CRC_ERR),
    (FilterFlags::PLCPFAIL, RxFilterConfig::PHY_ERR),
    (
        FilterFlags::CONTROL,
        RxFilterConfig::ACK
            .union(RxFilterConfig::CTS)
            .union(RxFilterConfig::CFEND)
            .union(RxFilterConfig::CFACK)
            .union(RxFilterConfig::BA)
            .union(RxFilterConfig::CTRL_RSV),
    ),
    (FilterFlags::PSPOLL, RxFilterConfig::PSPOLL),
];

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// The device configuration of the host stack.
pub struct HwConfig {
    /// The requested TX power in dBm.
    pub power_level: i32,
    /// The operating channel.
    pub chandef: ChannelDefinition,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// The BSS configuration of an interface.
pub struct BssConfig {
    /// The BSSID.
    pub bssid: [u8; 6],
    /// The beacon interval in TU.
    pub beacon_int: u16,
    /// Whether beacons should be sent.
    pub enable_beacon: bool,
    /// Whether the short slot time is used.
    pub use_short_slot: bool,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// EDCA parameters of a TX queue.
pub struct TxQueueParams {
    /// TXOP limit in units of 32us.
    pub txop: u16,
    /// Minimum contention window. Zero selects the default.
    pub cw_min: u16,
    /// Maximum contention window. Zero selects the default.
    pub cw_max: u16,
    /// Arbitration inter frame space number.
    pub aifs: u8,
}

/// Find the last set bit, one based.
const fn fls(value: u16) -> u32 {
    u16::BITS - value.leading_zeros()
}

/// Disable the beacon task, unless it's already paused.
fn pause_beacon_task(hw: &impl Mt76Hardware, pauses: &AtomicU8) {
    if pauses.fetch_add(1, Ordering::AcqRel) == 0 {
        hw.set_beacon_task_enabled(false);
    }
}
/// End one pause of the beacon task and enable it again, if that was the last one.
fn resume_beacon_task(hw: &impl Mt76Hardware, pauses: &AtomicU8) {
    if pauses.fetch_update(Ordering::AcqRel, Ordering::Acquire, |pauses| pauses.checked_sub(1))
        == Ok(1)
    {
        hw.set_beacon_task_enabled(true);
    }
}

/// Keeps the beacon task disabled, while it's alive.
///
/// Pauses nest, so the beacon task stays disabled until every pause ended.
struct BeaconTaskPause<'a, H: Mt76Hardware> {
    hw: &'a H,
    pauses: &'a AtomicU8,
}
impl<'a, H: Mt76Hardware> BeaconTaskPause<'a, H> {
    fn new(hw: &'a H, pauses: &'a AtomicU8) -> Self {
        pause_beacon_task(hw, pauses);
        Self { hw, pauses }
    }
}
impl<H: Mt76Hardware> Drop for BeaconTaskPause<'_, H> {
    fn drop(&mut self) {
        resume_beacon_task(self.hw, self.pauses);
    }
}

/// State protected by the device mutex.
struct ConfigState {
    wcid_mask: Cell<WcidMask>,
    rxfilter: Cell<RxFilterConfig>,
    txpower_conf: Cell<i32>,
}
impl ConfigState {
    fn update_wcid_mask<R>(&self, f: impl FnOnce(&mut WcidMask) -> R) -> R {
        let mut wcid_mask = self.wcid_mask.get();
        let res = f(&mut wcid_mask);
        self.wcid_mask.set(wcid_mask);
        res
    }
}

/// The control plane of an MT76 device.
///
/// `M` is the raw mutex used for the device mutex. If the device is shared between multiple
/// execution contexts, this has to be a mutex, which is [Sync], like
/// [CriticalSectionRawMutex](embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex).
pub struct Mt76Device<'res, M: RawMutex, H: Mt76Hardware, S: HostStack> {
    hw: H,
    host: S,
    state: DeviceState,
    beacon_task_pauses: AtomicU8,
    config: Mutex<M, ConfigState>,
    wcid_pool: &'res WcidPool,
}
impl<'res, M: RawMutex, H: Mt76Hardware, S: HostStack> Mt76Device<'res, M, H, S> {
    /// Create a new stopped device.
    pub fn new(resources: &'res mut Mt76Resources, hw: H, host: S) -> Self {
        let resources: &'res Mt76Resources = resources;
        let mut wcid_mask = WcidMask::new();
        // The group WCIDs of the client BSS indices overlap with the station range.
        (0..=MAX_BSS_IDX)
            .map(group_wcid_idx)
            .filter(|idx| *idx <= MAX_STATION_WCID)
            .for_each(|idx| wcid_mask.reserve(idx));
        Self {
            hw,
            host,
            state: DeviceState::new(),
            beacon_task_pauses: AtomicU8::new(0),
            config: Mutex::new(ConfigState {
                wcid_mask: Cell::new(wcid_mask),
                rxfilter: Cell::new(RxFilterConfig::empty()),
                txpower_conf: Cell::new(0),
            }),
            wcid_pool: &resources.wcid_pool,
        }
    }
    /// Run `f` under the device mutex.
    fn lock<R>(&self, f: impl FnOnce(&ConfigState) -> R) -> R {
        self.config.lock(f)
    }
    /// The hardware layer.
    pub fn hardware(&self) -> &H {
        &self.hw
    }
    /// The host stack.
    pub fn host(&self) -> &S {
        &self.host
    }
    /// The runtime state of the device.
    pub fn state(&self) -> &DeviceState {
        &self.state
    }
    /// A snapshot of the allocated WCIDs.
    pub fn wcid_mask(&self) -> WcidMask {
        self.lock(|config| config.wcid_mask.get())
    }
    /// The TX power last requested by the host stack.
    pub fn txpower_conf(&self) -> i32 {
        self.lock(|config| config.txpower_conf.get())
    }
    /// The pool backing the station WCIDs.
    pub fn wcid_pool(&self) -> &'res WcidPool {
        self.wcid_pool
    }
    /// Look up the station using WCID `idx`.
    ///
    /// This doesn't take the device mutex and may be called from the RX and TX paths.
    pub fn wcid(&self, idx: u8) -> Option<WcidRef<'res>> {
        self.wcid_pool.lookup(idx)
    }

    /// Bring up the device.
    ///
    /// If MAC or PHY fail to come up, the device is left in its previous state and the error is
    /// returned.
    pub fn start(&self) -> Result<(), Mt76Error> {
        self.lock(|config| {
            let previous = self.state.set_run_state(RunState::Starting);
            if let Err(err) = self.hw.mac_start().and_then(|_| self.hw.phy_start()) {
                error!("Failed to start device: {:?}", err);
                self.state.set_run_state(previous);
                return Err(Mt76Error::from(err));
            }
            config
                .rxfilter
                .set(RxFilterConfig::from_bits_retain(self.hw.rr(MT_RX_FILTR_CFG)));
            self.hw.schedule_calibration(CALIBRATE_INTERVAL);
            self.hw.set_rx_notifications(true);
            self.state.set_run_state(RunState::Running);
            debug!("Device started.");
            Ok(())
        })
    }
    /// Tear down the device.
    pub fn stop(&self) {
        self.lock(|_| {
            self.hw.set_rx_notifications(false);
            self.state.set_run_state(RunState::Stopping);
            self.hw.stop_hardware();
            self.state.set_run_state(RunState::Stopped);
            debug!("Device stopped.");
        })
    }
    /// Apply a configuration change of the host stack.
    ///
    /// The host TX queues are stopped during a channel switch and woken afterwards, regardless
    /// of whether the switch succeeded.
    pub fn config(&self, changed: ConfigChanged, conf: &HwConfig) -> Result<(), Mt76Error> {
        self.lock(|config| {
            if changed.contains(ConfigChanged::POWER) {
                config.txpower_conf.set(conf.power_level);
                if self.state.is_running() {
                    self.hw.phy_set_txpower(conf.power_level);
                }
            }
            if changed.contains(ConfigChanged::CHANNEL) {
                self.host.stop_queues();
                let res = self.hw.set_channel(&conf.chandef);
                self.host.wake_queues();
                if let Err(err) = res {
                    warn!("Failed to switch to channel {}: {:?}", conf.chandef.channel, err);
                    return Err(Mt76Error::from(err));
                }
                debug!("Switched to channel {}.", conf.chandef.channel);
            }
            Ok(())
        })
    }
    /// Configure the RX filter.
    ///
    /// Returns the requested flags, that are supported.
    pub fn configure_filter(&self, requested: FilterFlags) -> FilterFlags {
        self.lock(|config| {
            let mut rxfilter = config.rxfilter.get();
            let mut total = FilterFlags::empty();
            rxfilter.remove(RxFilterConfig::OTHER_BSS);
            for (flag, drop_bits) in FILTER_MAP {
                let pass = requested.contains(flag);
                total.set(flag, pass);
                rxfilter.set(drop_bits, !pass);
            }
            config.rxfilter.set(rxfilter);
            self.hw.wr(MT_RX_FILTR_CFG, rxfilter.bits());
            trace!("RX filter set to {:#x}.", rxfilter.bits());
            total
        })
    }
    /// Apply a change to the BSS configuration of `vif`.
    ///
    /// The beacon task is paused while the BSSID or the beacon state are updated.
    pub fn bss_info_changed(&self, vif: &VirtualInterface, info: &BssConfig, changed: BssChanged) {
        self.lock(|_| {
            let _beacon_task_pause = changed
                .intersects(BssChanged::BSSID | BssChanged::BEACON_ENABLED)
                .then(|| BeaconTaskPause::new(&self.hw, &self.beacon_task_pauses));

            if changed.contains(BssChanged::BSSID) {
                self.hw.mac_set_bssid(vif.idx(), info.bssid);
            }
            if changed.contains(BssChanged::BEACON_INT) {
                self.hw.rmw_field(
                    MT_BEACON_TIME_CFG,
                    MT_BEACON_TIME_CFG_INTVAL,
                    (info.beacon_int as u32) << 4,
                );
            }
            if changed.contains(BssChanged::BEACON_ENABLED) {
                self.hw.mac_set_beacon_enable(vif.idx(), info.enable_beacon);
            }
            if changed.contains(BssChanged::ERP_SLOT) {
                let slot_time = if info.use_short_slot {
                    SHORT_SLOT_TIME
                } else {
                    LONG_SLOT_TIME
                };
                self.hw
                    .rmw_field(MT_BKOFF_SLOT_CFG, MT_BKOFF_SLOT_CFG_SLOTTIME, slot_time);
            }
        })
    }
    /// Program the EDCA parameters of `queue`.
    pub fn conf_tx(&self, queue: u8, params: &TxQueueParams) -> Result<(), Mt76Error> {
        if queue >= NUM_EDCA_QUEUES {
            return Err(Mt76Error::InvalidQueue);
        }
        let cw_min = match params.cw_min {
            0 => DEFAULT_CW_MIN,
            cw_min => fls(cw_min),
        };
        let cw_max = match params.cw_max {
            0 => DEFAULT_CW_MAX,
            cw_max => fls(cw_max),
        };
        let txop = params.txop as u32;
        let aifs = params.aifs as u32;
        self.lock(|_| {
            self.hw.wr(
                mt_edca_cfg_ac(queue),
                field_prep(MT_EDCA_CFG_TXOP, txop)
                    | field_prep(MT_EDCA_CFG_AIFSN, aifs)
                    | field_prep(MT_EDCA_CFG_CWMIN, cw_min)
                    | field_prep(MT_EDCA_CFG_CWMAX, cw_max),
            );

            let shift = mt_wmm_txop_shift(queue);
            self.hw.rmw(
                mt_wmm_txop(queue),
                MT_WMM_TXOP_MASK << shift,
                (txop & MT_WMM_TXOP_MASK) << shift,
            );
            let shift = mt_wmm_aifsn_shift(queue);
            self.hw.rmw(
                MT_WMM_AIFSN,
                MT_WMM_AIFSN_MASK << shift,
                (aifs & MT_WMM_AIFSN_MASK) << shift,
            );
            let shift = mt_wmm_cwmin_shift(queue);
            self.hw.rmw(
                MT_WMM_CWMIN,
                MT_WMM_CWMIN_MASK << shift,
                (cw_min & MT_WMM_CWMIN_MASK) << shift,
            );
            let shift = mt_wmm_cwmax_shift(queue);
            self.hw.rmw(
                MT_WMM_CWMAX,
                MT_WMM_CWMAX_MASK << shift,
                (cw_max & MT_WMM_CWMAX_MASK) << shift,
            );
        });
        Ok(())
    }
    /// Install or remove a key.
    ///
    /// If `station` is `None`, the key is a group key of `vif`. Removing a key, which isn't bound,
    /// succeeds without touching the hardware WCID entry. Key indices above [MAX_KEY_IDX] are
    /// rejected with [Mt76Error::InvalidKeyIndex].
    pub fn set_key(
        &self,
        cmd: SetKeyCommand,
        vif: &VirtualInterface,
        station: Option<&Station<'res>>,
        key: &mut KeyConf,
    ) -> Result<(), Mt76Error> {
        if key.key_idx > MAX_KEY_IDX {
            return Err(Mt76Error::InvalidKeyIndex);
        }
        self.lock(|_| match station {
            Some(station) => key::set_station_key(&self.hw, station.wcid(), cmd, key),
            None => key::set_group_key(&self.hw, vif, cmd, key),
        })
        .inspect_err(|err| warn!("Failed to apply key {}: {:?}", key.key_idx, err))?;
        Ok(())
    }
    /// Signal the start of a software scan.
    ///
    /// The beacon task stays paused until [Self::sw_scan_complete] is called.
    pub fn sw_scan_start(&self) {
        self.lock(|_| {
            if !self.state.set_scanning(true) {
                pause_beacon_task(&self.hw, &self.beacon_task_pauses);
            }
        })
    }
    /// Signal the end of a software scan.
    pub fn sw_scan_complete(&self) {
        self.lock(|_| {
            if self.state.set_scanning(false) {
                resume_beacon_task(&self.hw, &self.beacon_task_pauses);
            }
        })
    }
    /// The TX power currently used in dBm.
    pub fn get_txpower(&self) -> i32 {
        self.hw.txpower_current()
    }
    /// Deliver a received frame to the host stack.
    ///
    /// If the device isn't running, the frame is dropped.
    pub fn rx(&self, frame: S::Frame) {
        if self.state.is_running() {
            self.host.deliver(frame);
        }
    }
}
