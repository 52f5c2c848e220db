//! This module implements the wireless client ID (WCID) table.
//!
//! A WCID is the index of a peer in the connection table of the hardware. Every station gets one
//! from the [WcidMask] allocator when it's added, while every interface carries a group WCID, whose
//! index is derived from the BSS index of the interface and never comes from the allocator.
//!
//! The WCIDs of stations are published into a lookup table, which is read by the RX and TX paths
//! without taking the device mutex. See [pool](self::pool) for how this is kept consistent with
//! station removal.
use portable_atomic::{AtomicI8, AtomicU32, Ordering};

mod mask;
mod pool;

pub use mask::WcidMask;
pub(crate) use pool::WcidOwner;
pub use pool::{StationWcid, WcidPool, WcidRef};

/// The highest WCID, that the allocator will hand out.
///
/// The indices above this are reserved for group and broadcast entries.
pub const MAX_STATION_WCID: u8 = 247;
/// The amount of entries in the hardware WCID table.
pub const WCID_TABLE_SIZE: usize = 256;
/// The amount of traffic identifiers a station has TX queues for.
pub const NUM_TIDS: usize = 16;

/// Returns the group WCID of the interface with BSS index `vif_idx`.
pub const fn group_wcid_idx(vif_idx: u8) -> u8 {
    254 - vif_idx
}

const NO_KEY: i8 = -1;
const TX_RATE_SET: u32 = 1 << 31;
const TX_RATE_NSS_SHIFT: u32 = 16;
const TX_RATE_NSS_MASK: u32 = 0b11;
const TX_RATE_VAL_MASK: u32 = 0xffff;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// The key binding of a WCID.
pub enum KeyState {
    /// No key is bound.
    Unkeyed,
    /// The key with the specified index is bound.
    Keyed(u8),
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// The send rate hint of a WCID.
pub struct WcidTxRate {
    /// The encoded hardware rate word.
    pub rate: u16,
    /// The number of spatial streams.
    pub nss: u8,
}

/// A wireless client ID.
///
/// The index is fixed for the lifetime of the WCID. The key binding and the rate hint are updated
/// by the configuration path and may be read concurrently by the data path.
#[derive(Debug)]
pub struct Wcid {
    idx: u8,
    hw_key_idx: AtomicI8,
    tx_rate: AtomicU32,
}
impl Wcid {
    /// Create a new unkeyed WCID.
    pub const fn new(idx: u8) -> Self {
        Self {
            idx,
            hw_key_idx: AtomicI8::new(NO_KEY),
            tx_rate: AtomicU32::new(0),
        }
    }
    /// The index of this WCID in the hardware table.
    pub const fn idx(&self) -> u8 {
        self.idx
    }
    /// The raw hardware key index, where `-1` means no key is bound.
    pub fn hw_key_idx(&self) -> i8 {
        self.hw_key_idx.load(Ordering::Acquire)
    }
    /// The current key binding.
    pub fn key_state(&self) -> KeyState {
        match self.hw_key_idx() {
            NO_KEY => KeyState::Unkeyed,
            key_idx => KeyState::Keyed(key_idx as u8),
        }
    }
    /// Bind the key with index `key_idx`, replacing any previous binding.
    ///
    /// `key_idx` must not be above [MAX_KEY_IDX](crate::key::MAX_KEY_IDX).
    pub(crate) fn bind_key(&self, key_idx: u8) {
        debug_assert!(key_idx <= crate::key::MAX_KEY_IDX);
        self.hw_key_idx.store(key_idx as i8, Ordering::Release);
    }
    /// Unbind the key with index `key_idx`.
    ///
    /// Returns `false` and leaves the binding untouched, if another key is bound.
    pub(crate) fn unbind_key(&self, key_idx: u8) -> bool {
        self.hw_key_idx
            .compare_exchange(key_idx as i8, NO_KEY, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
    /// The send rate hint, if one was set.
    pub fn tx_rate(&self) -> Option<WcidTxRate> {
        let tx_rate = self.tx_rate.load(Ordering::Acquire);
        (tx_rate & TX_RATE_SET != 0).then(|| WcidTxRate {
            rate: (tx_rate & TX_RATE_VAL_MASK) as u16,
            nss: ((tx_rate >> TX_RATE_NSS_SHIFT) & TX_RATE_NSS_MASK) as u8,
        })
    }
    /// Publish a new send rate hint.
    pub(crate) fn set_tx_rate(&self, tx_rate: WcidTxRate) {
        let nss = (tx_rate.nss as u32 & TX_RATE_NSS_MASK) << TX_RATE_NSS_SHIFT;
        self.tx_rate
            .store(TX_RATE_SET | nss | tx_rate.rate as u32, Ordering::Release);
    }
}
