//! This module implements binding of keys to WCIDs.
//!
//! A pairwise key is bound to the WCID of its station. A group key is bound to the group WCID of
//! the interface and additionally programmed into the shared key table of the BSS, since broadcast
//! frames are decrypted through a different lookup than unicast frames.
//!
//! Every WCID has at most one key bound at a time. Installing a key overwrites the binding,
//! removing the bound key clears it and removing any other key leaves it as is.
use heapless::Vec;

use crate::{
    device::VirtualInterface,
    hw::{HwResult, Mt76Hardware},
    wcid::{KeyState, Wcid},
};

/// The maximum length of key material.
pub const MAX_KEY_LEN: usize = 32;
/// The highest key index, that can be bound to a WCID.
pub const MAX_KEY_IDX: u8 = i8::MAX as u8;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Cipher suites supported by the hardware key tables.
pub enum Cipher {
    /// WEP with 40 bit key.
    Wep40,
    /// WEP with 104 bit key.
    Wep104,
    /// TKIP
    Tkip,
    /// CCMP-128
    Ccmp,
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Whether a key is installed or removed.
pub enum SetKeyCommand {
    /// Install the key.
    Set,
    /// Remove the key.
    Disable,
}

/// A key handed to the driver by the host stack.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct KeyConf {
    /// The key index chosen by the host stack.
    pub key_idx: u8,
    /// The cipher suite.
    pub cipher: Cipher,
    /// The key material.
    pub key: Vec<u8, MAX_KEY_LEN>,
    /// The hardware key table entry, which is reported back on installation.
    pub hw_key_idx: u8,
}
impl KeyConf {
    /// Create a new key configuration.
    ///
    /// Returns `None` if the key material is longer than [MAX_KEY_LEN], or the key index is above
    /// [MAX_KEY_IDX].
    pub fn new(key_idx: u8, cipher: Cipher, key: &[u8]) -> Option<Self> {
        if key_idx > MAX_KEY_IDX {
            return None;
        }
        Some(Self {
            key_idx,
            cipher,
            key: Vec::from_slice(key).ok()?,
            hw_key_idx: 0,
        })
    }
}

/// Install or remove a pairwise key on the WCID of a station.
pub(crate) fn set_station_key(
    hw: &impl Mt76Hardware,
    wcid: &Wcid,
    cmd: SetKeyCommand,
    key: &mut KeyConf,
) -> HwResult<()> {
    match cmd {
        SetKeyCommand::Set => {
            hw.mac_wcid_set_key(wcid.idx(), Some(&*key))?;
            wcid.bind_key(key.key_idx);
            key.hw_key_idx = wcid.idx();
            debug!("Installed key {} on WCID {}.", key.key_idx, wcid.idx());
        }
        SetKeyCommand::Disable => {
            if wcid.key_state() != KeyState::Keyed(key.key_idx) {
                trace!(
                    "Ignoring removal of key {} from WCID {}, since it isn't bound.",
                    key.key_idx,
                    wcid.idx()
                );
                return Ok(());
            }
            hw.mac_wcid_set_key(wcid.idx(), None)?;
            wcid.unbind_key(key.key_idx);
            debug!("Removed key {} from WCID {}.", key.key_idx, wcid.idx());
        }
    }
    Ok(())
}

/// Install or remove a group key on an interface.
///
/// The group WCID is only touched for installation, or if the removed key is the one bound to it.
/// The shared key table entry of the key index is always updated, after the group WCID was
/// successfully programmed. The binding only changes, once both tables were written.
pub(crate) fn set_group_key(
    hw: &impl Mt76Hardware,
    vif: &VirtualInterface,
    cmd: SetKeyCommand,
    key: &mut KeyConf,
) -> HwResult<()> {
    let group_wcid = vif.group_wcid();
    let key_idx = key.key_idx;
    match cmd {
        SetKeyCommand::Set => {
            hw.mac_wcid_set_key(group_wcid.idx(), Some(&*key))?;
            if let Err(err) = hw.mac_shared_key_setup(vif.idx(), key_idx, Some(&*key)) {
                if let Err(clear_err) = hw.mac_wcid_set_key(group_wcid.idx(), None) {
                    warn!(
                        "Failed to clear group WCID {} after failed install: {:?}",
                        group_wcid.idx(),
                        clear_err
                    );
                }
                return Err(err);
            }
            group_wcid.bind_key(key_idx);
            key.hw_key_idx = group_wcid.idx();
            debug!(
                "Installed group key {} on interface {}.",
                key_idx,
                vif.idx()
            );
        }
        SetKeyCommand::Disable => {
            let bound = group_wcid.key_state() == KeyState::Keyed(key_idx);
            if bound {
                hw.mac_wcid_set_key(group_wcid.idx(), None)?;
            }
            hw.mac_shared_key_setup(vif.idx(), key_idx, None)?;
            if bound {
                group_wcid.unbind_key(key_idx);
            }
            debug!("Removed group key {} from interface {}.", key_idx, vif.idx());
        }
    }
    Ok(())
}
