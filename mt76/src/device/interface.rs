use crate::{
    hw::{HostStack, Mt76Hardware, TxQueue},
    wcid::{Wcid, group_wcid_idx},
};

use super::Mt76Device;
use embassy_sync::blocking_mutex::raw::RawMutex;

/// Offset of the BSS indices used by client interfaces.
///
/// The hardware uses BSS indices 0-7 for AP mode and 8-15 for client mode.
pub const CLIENT_BSS_OFFSET: u8 = 8;
/// The highest BSS index [interface_index] can return.
///
/// Locally administered addresses are mapped to 1-8, so the last index of each half spills over
/// into the next one.
pub const MAX_BSS_IDX: u8 = 2 * CLIENT_BSS_OFFSET;
/// The locally administered bit of the first address octet.
const LOCALLY_ADMINISTERED: u8 = 1 << 1;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// The operating mode of an interface.
pub enum InterfaceType {
    /// Access point
    AccessPoint,
    /// Client
    Station,
    /// IBSS
    Adhoc,
    /// Mesh point
    MeshPoint,
}

/// Derive the BSS index of an interface.
///
/// The first BSS index is linked to the MAC address of the device. Interfaces with a locally
/// administered address get one of the indices 1-8, depending on which bits of the first octet
/// differ from the device address. Client interfaces are shifted into the upper half.
///
/// Multiple interfaces may end up with the same index, which the hardware tolerates for unicast
/// frames.
pub fn interface_index(
    device_address: [u8; 6],
    address: [u8; 6],
    interface_type: InterfaceType,
) -> u8 {
    let mut idx = 0;
    if address[0] & LOCALLY_ADMINISTERED != 0 {
        idx = 1 + (((device_address[0] ^ address[0]) >> 2) & 7);
    }
    if interface_type == InterfaceType::Station {
        idx += CLIENT_BSS_OFFSET;
    }
    idx
}

/// A virtual interface (VIF).
///
/// This is created by [Mt76Device::add_interface] and has to be handed back to
/// [Mt76Device::remove_interface].
#[derive(Debug)]
pub struct VirtualInterface {
    idx: u8,
    address: [u8; 6],
    interface_type: InterfaceType,
    group_wcid: Wcid,
}
impl VirtualInterface {
    /// The BSS index.
    pub const fn idx(&self) -> u8 {
        self.idx
    }
    /// The MAC address.
    pub const fn address(&self) -> [u8; 6] {
        self.address
    }
    /// The operating mode.
    pub const fn interface_type(&self) -> InterfaceType {
        self.interface_type
    }
    /// The WCID used for group addressed traffic.
    pub const fn group_wcid(&self) -> &Wcid {
        &self.group_wcid
    }
}

impl<M: RawMutex, H: Mt76Hardware, S: HostStack> Mt76Device<'_, M, H, S> {
    /// Add an interface.
    ///
    /// This can't fail, since the BSS index is derived from the address.
    pub fn add_interface(&self, address: [u8; 6], interface_type: InterfaceType) -> VirtualInterface {
        self.lock(|_| {
            let idx = interface_index(self.hw.macaddr(), address, interface_type);
            let vif = VirtualInterface {
                idx,
                address,
                interface_type,
                group_wcid: Wcid::new(group_wcid_idx(idx)),
            };
            self.hw.txq_init(TxQueue::Interface { vif_idx: idx });
            debug!(
                "Added {:?} interface with BSS index {} and group WCID {}.",
                interface_type,
                idx,
                vif.group_wcid.idx()
            );
            vif
        })
    }
    /// Remove an interface.
    pub fn remove_interface(&self, vif: VirtualInterface) {
        self.lock(|_| {
            self.hw.txq_remove(TxQueue::Interface { vif_idx: vif.idx });
            debug!("Removed interface with BSS index {}.", vif.idx);
        })
    }
}
