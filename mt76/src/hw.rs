//! This module contains the seams to the collaborators of the control plane.
//!
//! The control plane neither owns the bus nor the host wireless stack. Register access, PHY
//! bring-up, key tables and TX queues are reached through [Mt76Hardware], while everything going
//! upwards, like received frames or block ack callbacks, goes through [HostStack].

use embassy_time::Duration;

use crate::{device::VirtualInterface, key::KeyConf};

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// An error returned by the hardware layer.
pub enum HwError {
    /// The hardware didn't accept the request, since it's still busy.
    Busy,
    /// The index is not addressable by the hardware.
    InvalidIndex,
    /// The hardware didn't respond in time.
    Timeout,
    /// The request is not supported by the hardware.
    Unsupported,
}
/// Result of a hardware operation.
pub type HwResult<T> = Result<T, HwError>;

/// Scalar access to the MAC control block registers.
///
/// All of the read-modify-write helpers are built on top of [RegisterAccess::rr] and
/// [RegisterAccess::wr]. They aren't atomic with regards to other writers, which is why the
/// device only uses them while holding the device mutex.
pub trait RegisterAccess {
    /// Read the register at `offset`.
    fn rr(&self, offset: u32) -> u32;
    /// Write `value` to the register at `offset`.
    fn wr(&self, offset: u32, value: u32);

    /// Clear `mask` in the register and set `value`, returning the written value.
    fn rmw(&self, offset: u32, mask: u32, value: u32) -> u32 {
        let value = (self.rr(offset) & !mask) | value;
        self.wr(offset, value);
        value
    }
    /// Replace the field described by `mask` with `value`.
    fn rmw_field(&self, offset: u32, mask: u32, value: u32) -> u32 {
        self.rmw(offset, mask, crate::regs::field_prep(mask, value))
    }
    /// Set the bits in `mask`.
    fn set(&self, offset: u32, mask: u32) -> u32 {
        self.rmw(offset, 0, mask)
    }
    /// Clear the bits in `mask`.
    fn clear(&self, offset: u32, mask: u32) -> u32 {
        self.rmw(offset, mask, 0)
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// The band of a channel.
pub enum Band {
    /// 2.4 GHz
    TwoPointFourGHz,
    /// 5 GHz
    FiveGHz,
}
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// Channel bandwidth.
pub enum ChannelWidth {
    /// 20 MHz, without HT.
    #[default]
    TwentyMHzNoHt,
    /// 20 MHz
    TwentyMHz,
    /// 40 MHz
    FortyMHz,
    /// 80 MHz
    EightyMHz,
}
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// The channel, that the radio should operate on.
pub struct ChannelDefinition {
    /// The band of the primary channel.
    pub band: Band,
    /// The primary channel number.
    pub channel: u8,
    /// The bandwidth.
    pub width: ChannelWidth,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
/// A TX queue of the TX/DMA subsystem.
pub enum TxQueue {
    /// The default queue of an interface.
    Interface {
        /// BSS index of the interface.
        vif_idx: u8,
    },
    /// The queue of a traffic identifier of a station.
    Station {
        /// WCID of the station.
        wcid: u8,
        /// The traffic identifier.
        tid: u8,
    },
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// The first entry of the rate table of a station, as provided by the host stack.
pub struct TxRate {
    /// Rate index.
    pub idx: i8,
    /// Rate flags of the host stack.
    pub flags: u16,
}

/// The hardware side of the driver.
///
/// Implementations wrap the bus access and the parts of the MAC, PHY and DMA code, which aren't
/// part of the control plane.
pub trait Mt76Hardware: RegisterAccess {
    /// The permanent MAC address of the device.
    fn macaddr(&self) -> [u8; 6];

    /// Bring up the MAC.
    fn mac_start(&self) -> HwResult<()>;
    /// Bring up the PHY.
    fn phy_start(&self) -> HwResult<()>;
    /// Tear down MAC and PHY. This is best effort.
    fn stop_hardware(&self);
    /// Queue the periodic calibration work.
    fn schedule_calibration(&self, interval: Duration);
    /// Enable or disable the RX completion path.
    fn set_rx_notifications(&self, enabled: bool);
    /// Enable or disable the pre-TBTT beacon task.
    fn set_beacon_task_enabled(&self, enabled: bool);

    /// Apply the configured TX power in dBm.
    fn phy_set_txpower(&self, txpower_conf: i32);
    /// The TX power currently used by the PHY in dBm.
    fn txpower_current(&self) -> i32;
    /// Switch to the specified channel.
    fn set_channel(&self, chandef: &ChannelDefinition) -> HwResult<()>;

    /// Bind WCID `idx` to BSS `vif_idx` and the peer address, or unbind it if `address` is `None`.
    fn mac_wcid_setup(&self, idx: u8, vif_idx: u8, address: Option<[u8; 6]>);
    /// Program or clear the pairwise key of WCID `idx`.
    fn mac_wcid_set_key(&self, idx: u8, key: Option<&KeyConf>) -> HwResult<()>;
    /// Program or clear entry `key_idx` of the shared key table of BSS `vif_idx`.
    fn mac_shared_key_setup(&self, vif_idx: u8, key_idx: u8, key: Option<&KeyConf>)
    -> HwResult<()>;
    /// Program the BSSID of BSS `vif_idx`.
    fn mac_set_bssid(&self, vif_idx: u8, bssid: [u8; 6]);
    /// Enable or disable beaconing on BSS `vif_idx`.
    fn mac_set_beacon_enable(&self, vif_idx: u8, enabled: bool);
    /// Encode a rate into the hardware rate word and the number of spatial streams.
    fn mac_tx_rate_val(&self, rate: &TxRate) -> (u16, u8);

    /// Set up a TX queue.
    fn txq_init(&self, txq: TxQueue);
    /// Tear down a TX queue.
    fn txq_remove(&self, txq: TxQueue);
}

/// The host wireless stack, as seen from the driver.
pub trait HostStack {
    /// A received frame, whose ownership is transferred on delivery.
    type Frame;

    /// Hand a received frame to the host stack.
    fn deliver(&self, frame: Self::Frame);
    /// Stop all TX queues of the host stack.
    fn stop_queues(&self);
    /// Wake all TX queues of the host stack.
    fn wake_queues(&self);
    /// Send a block ack request to `address`.
    fn send_bar(&self, vif: &VirtualInterface, address: [u8; 6], tid: u8, ssn: u16);
    /// Acknowledge the start of a TX block ack session.
    fn start_tx_ba_cb(&self, vif: &VirtualInterface, address: [u8; 6], tid: u8);
    /// Acknowledge the end of a TX block ack session.
    fn stop_tx_ba_cb(&self, vif: &VirtualInterface, address: [u8; 6], tid: u8);
}
