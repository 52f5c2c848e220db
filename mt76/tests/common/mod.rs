#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, AtomicI32, AtomicUsize, Ordering},
    },
    vec::Vec,
};

use critical_section as _;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::Duration;
use mt76::{
    HostStack, HwError, Mt76Device, Mt76Hardware, Mt76Resources, RegisterAccess, VirtualInterface,
    hw::{Band, ChannelDefinition, ChannelWidth, HwResult, TxQueue, TxRate},
    key::{Cipher, KeyConf},
};

pub const DEVICE_ADDRESS: [u8; 6] = [0x00, 0x0c, 0x43, 0x76, 0x10, 0x00];
pub const STATION_A: [u8; 6] = [0x00, 0x80, 0x41, 0x13, 0x37, 0x41];
pub const STATION_B: [u8; 6] = [0x00, 0x80, 0x41, 0x13, 0x37, 0x42];
pub const CHANNEL_6: ChannelDefinition = ChannelDefinition {
    band: Band::TwoPointFourGHz,
    channel: 6,
    width: ChannelWidth::TwentyMHz,
};

pub type TestDevice<'res> = Mt76Device<'res, CriticalSectionRawMutex, FakeHardware, FakeHost>;

/// Operations of the fake hardware, that can be made to fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailPoint {
    MacStart,
    PhyStart,
    SetChannel,
    WcidSetKey,
    SharedKeySetup,
}

/// Calls into the hardware, except for register access.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HwCall {
    MacStart,
    PhyStart,
    StopHardware,
    ScheduleCalibration(Duration),
    RxNotifications(bool),
    SetTxpower(i32),
    SetChannel(u8),
    WcidSetup {
        idx: u8,
        vif_idx: u8,
        address: Option<[u8; 6]>,
    },
    WcidSetKey {
        idx: u8,
        key_idx: Option<u8>,
    },
    SharedKeySetup {
        vif_idx: u8,
        key_idx: u8,
        installed: bool,
    },
    SetBssid {
        vif_idx: u8,
        bssid: [u8; 6],
        beacon_task_enabled: bool,
    },
    SetBeaconEnable {
        vif_idx: u8,
        enabled: bool,
        beacon_task_enabled: bool,
    },
    TxqInit(TxQueue),
    TxqRemove(TxQueue),
}

/// A register file and a log of all other calls.
pub struct FakeHardware {
    registers: Mutex<HashMap<u32, u32>>,
    calls: Mutex<Vec<HwCall>>,
    failures: Mutex<HashMap<FailPoint, HwError>>,
    beacon_task_enabled: AtomicBool,
    rx_notifications: AtomicBool,
    txpower: AtomicI32,
}
impl FakeHardware {
    pub fn new() -> Self {
        Self {
            registers: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashMap::new()),
            beacon_task_enabled: AtomicBool::new(true),
            rx_notifications: AtomicBool::new(false),
            txpower: AtomicI32::new(0),
        }
    }
    pub fn fail(&self, fail_point: FailPoint, err: HwError) {
        self.failures.lock().unwrap().insert(fail_point, err);
    }
    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }
    fn check(&self, fail_point: FailPoint) -> HwResult<()> {
        match self.failures.lock().unwrap().get(&fail_point) {
            Some(err) => Err(*err),
            None => Ok(()),
        }
    }
    fn record(&self, call: HwCall) {
        self.calls.lock().unwrap().push(call);
    }
    /// Take all calls recorded so far.
    pub fn take_calls(&self) -> Vec<HwCall> {
        core::mem::take(&mut *self.calls.lock().unwrap())
    }
    pub fn register(&self, offset: u32) -> u32 {
        self.rr(offset)
    }
    pub fn set_register(&self, offset: u32, value: u32) {
        self.wr(offset, value);
    }
    pub fn beacon_task_enabled(&self) -> bool {
        self.beacon_task_enabled.load(Ordering::SeqCst)
    }
    pub fn rx_notifications(&self) -> bool {
        self.rx_notifications.load(Ordering::SeqCst)
    }
}
impl RegisterAccess for FakeHardware {
    fn rr(&self, offset: u32) -> u32 {
        self.registers
            .lock()
            .unwrap()
            .get(&offset)
            .copied()
            .unwrap_or_default()
    }
    fn wr(&self, offset: u32, value: u32) {
        self.registers.lock().unwrap().insert(offset, value);
    }
}
impl Mt76Hardware for FakeHardware {
    fn macaddr(&self) -> [u8; 6] {
        DEVICE_ADDRESS
    }
    fn mac_start(&self) -> HwResult<()> {
        self.record(HwCall::MacStart);
        self.check(FailPoint::MacStart)
    }
    fn phy_start(&self) -> HwResult<()> {
        self.record(HwCall::PhyStart);
        self.check(FailPoint::PhyStart)
    }
    fn stop_hardware(&self) {
        self.record(HwCall::StopHardware);
    }
    fn schedule_calibration(&self, interval: Duration) {
        self.record(HwCall::ScheduleCalibration(interval));
    }
    fn set_rx_notifications(&self, enabled: bool) {
        self.rx_notifications.store(enabled, Ordering::SeqCst);
        self.record(HwCall::RxNotifications(enabled));
    }
    fn set_beacon_task_enabled(&self, enabled: bool) {
        self.beacon_task_enabled.store(enabled, Ordering::SeqCst);
    }
    fn phy_set_txpower(&self, txpower_conf: i32) {
        self.txpower.store(txpower_conf, Ordering::SeqCst);
        self.record(HwCall::SetTxpower(txpower_conf));
    }
    fn txpower_current(&self) -> i32 {
        self.txpower.load(Ordering::SeqCst)
    }
    fn set_channel(&self, chandef: &ChannelDefinition) -> HwResult<()> {
        self.record(HwCall::SetChannel(chandef.channel));
        self.check(FailPoint::SetChannel)
    }
    fn mac_wcid_setup(&self, idx: u8, vif_idx: u8, address: Option<[u8; 6]>) {
        self.record(HwCall::WcidSetup {
            idx,
            vif_idx,
            address,
        });
    }
    fn mac_wcid_set_key(&self, idx: u8, key: Option<&KeyConf>) -> HwResult<()> {
        self.check(FailPoint::WcidSetKey)?;
        self.record(HwCall::WcidSetKey {
            idx,
            key_idx: key.map(|key| key.key_idx),
        });
        Ok(())
    }
    fn mac_shared_key_setup(
        &self,
        vif_idx: u8,
        key_idx: u8,
        key: Option<&KeyConf>,
    ) -> HwResult<()> {
        self.check(FailPoint::SharedKeySetup)?;
        self.record(HwCall::SharedKeySetup {
            vif_idx,
            key_idx,
            installed: key.is_some(),
        });
        Ok(())
    }
    fn mac_set_bssid(&self, vif_idx: u8, bssid: [u8; 6]) {
        self.record(HwCall::SetBssid {
            vif_idx,
            bssid,
            beacon_task_enabled: self.beacon_task_enabled(),
        });
    }
    fn mac_set_beacon_enable(&self, vif_idx: u8, enabled: bool) {
        self.record(HwCall::SetBeaconEnable {
            vif_idx,
            enabled,
            beacon_task_enabled: self.beacon_task_enabled(),
        });
    }
    fn mac_tx_rate_val(&self, rate: &TxRate) -> (u16, u8) {
        ((rate.flags << 8) | rate.idx as u8 as u16, 1 + rate.idx as u8 / 8)
    }
    fn txq_init(&self, txq: TxQueue) {
        self.record(HwCall::TxqInit(txq));
    }
    fn txq_remove(&self, txq: TxQueue) {
        self.record(HwCall::TxqRemove(txq));
    }
}

/// Calls into the host stack.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HostEvent {
    StopQueues,
    WakeQueues,
    SendBar {
        vif_idx: u8,
        address: [u8; 6],
        tid: u8,
        ssn: u16,
    },
    StartTxBa {
        vif_idx: u8,
        address: [u8; 6],
        tid: u8,
    },
    StopTxBa {
        vif_idx: u8,
        address: [u8; 6],
        tid: u8,
    },
}

/// A frame, which counts how often frames were freed.
pub struct Frame {
    freed: Arc<AtomicUsize>,
}
impl Drop for Frame {
    fn drop(&mut self) {
        self.freed.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct FakeHost {
    delivered: AtomicUsize,
    freed: Arc<AtomicUsize>,
    events: Mutex<Vec<HostEvent>>,
}
impl FakeHost {
    pub fn new() -> Self {
        Self {
            delivered: AtomicUsize::new(0),
            freed: Arc::new(AtomicUsize::new(0)),
            events: Mutex::new(Vec::new()),
        }
    }
    pub fn frame(&self) -> Frame {
        Frame {
            freed: self.freed.clone(),
        }
    }
    pub fn delivered(&self) -> usize {
        self.delivered.load(Ordering::SeqCst)
    }
    pub fn freed(&self) -> usize {
        self.freed.load(Ordering::SeqCst)
    }
    pub fn take_events(&self) -> Vec<HostEvent> {
        core::mem::take(&mut *self.events.lock().unwrap())
    }
    fn record(&self, event: HostEvent) {
        self.events.lock().unwrap().push(event);
    }
}
impl HostStack for FakeHost {
    type Frame = Frame;

    fn deliver(&self, frame: Self::Frame) {
        self.delivered.fetch_add(1, Ordering::SeqCst);
        drop(frame);
    }
    fn stop_queues(&self) {
        self.record(HostEvent::StopQueues);
    }
    fn wake_queues(&self) {
        self.record(HostEvent::WakeQueues);
    }
    fn send_bar(&self, vif: &VirtualInterface, address: [u8; 6], tid: u8, ssn: u16) {
        self.record(HostEvent::SendBar {
            vif_idx: vif.idx(),
            address,
            tid,
            ssn,
        });
    }
    fn start_tx_ba_cb(&self, vif: &VirtualInterface, address: [u8; 6], tid: u8) {
        self.record(HostEvent::StartTxBa {
            vif_idx: vif.idx(),
            address,
            tid,
        });
    }
    fn stop_tx_ba_cb(&self, vif: &VirtualInterface, address: [u8; 6], tid: u8) {
        self.record(HostEvent::StopTxBa {
            vif_idx: vif.idx(),
            address,
            tid,
        });
    }
}

pub fn device(resources: &mut Mt76Resources) -> TestDevice<'_> {
    Mt76Device::new(resources, FakeHardware::new(), FakeHost::new())
}

/// Create a device and bring it up.
pub fn running_device(resources: &mut Mt76Resources) -> TestDevice<'_> {
    let device = device(resources);
    device.start().unwrap();
    device.hardware().take_calls();
    device
}

pub fn ccmp_key(key_idx: u8) -> KeyConf {
    KeyConf::new(key_idx, Cipher::Ccmp, &[0x42; 16]).unwrap()
}
