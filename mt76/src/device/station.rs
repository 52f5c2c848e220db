use core::ops::Deref;

use embassy_sync::blocking_mutex::raw::RawMutex;

use super::{Mt76Device, Mt76Error, VirtualInterface};
use crate::{
    hw::{HostStack, Mt76Hardware, RegisterAccess, TxQueue, TxRate},
    regs::{mt_wcid_addr, mt_wcid_drop, mt_wcid_drop_mask, mt_wcid_rx_ba_mask},
    wcid::{NUM_TIDS, StationWcid, WcidMask, WcidOwner, WcidTxRate},
};

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// A block ack session action requested by the host stack.
pub enum AmpduAction {
    /// An RX block ack session was established.
    RxStart,
    /// An RX block ack session was torn down.
    RxStop,
    /// A TX block ack session is being set up, starting at `ssn`.
    TxStart {
        /// The starting sequence number.
        ssn: u16,
    },
    /// The TX block ack session is operational.
    TxOperational,
    /// Stop the TX session and flush.
    TxStopFlush,
    /// Stop the TX session and flush, with the session already being torn down.
    TxStopFlushCont,
    /// Stop the TX session.
    TxStopCont,
}

/// A station associated with an interface.
///
/// This owns the WCID of the station, which stays allocated until the station is handed to
/// [Mt76Device::sta_remove]. If it's dropped instead, the WCID is leaked.
#[must_use]
pub struct Station<'res> {
    owner: WcidOwner<'res>,
}
impl Deref for Station<'_> {
    type Target = StationWcid;
    fn deref(&self) -> &Self::Target {
        &self.owner
    }
}

impl<'res, M: RawMutex, H: Mt76Hardware, S: HostStack> Mt76Device<'res, M, H, S> {
    /// Add a station with `address` to `vif`.
    ///
    /// The station is visible to [Mt76Device::wcid] after this returns. If no WCID is left,
    /// [Mt76Error::ResourceExhausted] is returned and nothing is changed.
    pub fn sta_add(
        &self,
        vif: &VirtualInterface,
        address: [u8; 6],
    ) -> Result<Station<'res>, Mt76Error> {
        self.lock(|config| {
            let Some(idx) = config.update_wcid_mask(WcidMask::allocate) else {
                warn!("No WCID left for station {:?}.", address);
                return Err(Mt76Error::ResourceExhausted);
            };
            let Some(owner) = self.wcid_pool.claim(idx, vif.idx(), address) else {
                config.update_wcid_mask(|wcid_mask| wcid_mask.release(idx));
                warn!(
                    "No WCID entry left for station {:?}, all are pinned by readers.",
                    address
                );
                return Err(Mt76Error::ResourceExhausted);
            };

            self.hw.mac_wcid_setup(idx, vif.idx(), Some(address));
            self.hw.clear(mt_wcid_drop(idx), mt_wcid_drop_mask(idx));
            for tid in 0..NUM_TIDS as u8 {
                self.hw.txq_init(TxQueue::Station { wcid: idx, tid });
            }
            self.wcid_pool.publish(&owner);

            debug!(
                "Added station {:?} with WCID {} to interface {}.",
                address,
                idx,
                vif.idx()
            );
            Ok(Station { owner })
        })
    }
    /// Remove a station.
    ///
    /// The WCID is unpublished first, so no new lookup can find the station. Readers, which found
    /// it earlier, keep seeing the old station until they drop their reference.
    pub fn sta_remove(&self, station: Station<'res>) {
        self.lock(|config| {
            let Station { owner } = station;
            let idx = owner.wcid().idx();
            self.wcid_pool.unpublish(&owner);

            for tid in 0..NUM_TIDS as u8 {
                self.hw.txq_remove(TxQueue::Station { wcid: idx, tid });
            }
            self.hw.set(mt_wcid_drop(idx), mt_wcid_drop_mask(idx));
            config.update_wcid_mask(|wcid_mask| wcid_mask.release(idx));
            self.hw.mac_wcid_setup(idx, 0, None);

            debug!("Removed station {:?} with WCID {}.", owner.address(), idx);
            self.wcid_pool.retire(owner);
        })
    }
    /// Handle a block ack session action for `tid` of `station`.
    pub fn ampdu_action(
        &self,
        vif: &VirtualInterface,
        station: &Station<'res>,
        action: AmpduAction,
        tid: u8,
    ) -> Result<(), Mt76Error> {
        if tid as usize >= NUM_TIDS {
            return Err(Mt76Error::InvalidTrafficIdentifier);
        }
        let idx = station.wcid().idx();
        self.lock(|_| match action {
            AmpduAction::RxStart => {
                self.hw.set(mt_wcid_addr(idx) + 4, mt_wcid_rx_ba_mask(tid));
                debug!("RX block ack session started for WCID {} TID {}.", idx, tid);
            }
            AmpduAction::RxStop => {
                self.hw.clear(mt_wcid_addr(idx) + 4, mt_wcid_rx_ba_mask(tid));
                debug!("RX block ack session stopped for WCID {} TID {}.", idx, tid);
            }
            AmpduAction::TxStart { ssn } => {
                station.set_agg_ssn(tid, ssn << 4);
                self.host.start_tx_ba_cb(vif, station.address(), tid);
                debug!(
                    "TX block ack session starting for WCID {} TID {} at SSN {}.",
                    idx, tid, ssn
                );
            }
            AmpduAction::TxOperational => {
                if let Some(agg_ssn) = station.agg_ssn(tid) {
                    self.host.send_bar(vif, station.address(), tid, agg_ssn);
                }
            }
            AmpduAction::TxStopCont => {
                self.host.stop_tx_ba_cb(vif, station.address(), tid);
                debug!("TX block ack session stopped for WCID {} TID {}.", idx, tid);
            }
            AmpduAction::TxStopFlush | AmpduAction::TxStopFlushCont => {}
        });
        Ok(())
    }
    /// Refresh the send rate hint of `station` from its rate table.
    ///
    /// Only the first entry is used. An empty table leaves the hint untouched.
    pub fn sta_rate_tbl_update(&self, station: &Station<'res>, rates: &[TxRate]) {
        let Some(rate) = rates.first() else {
            return;
        };
        self.lock(|_| {
            let (rate, nss) = self.hw.mac_tx_rate_val(rate);
            station.wcid().set_tx_rate(WcidTxRate { rate, nss });
            trace!(
                "Rate of WCID {} set to {:#x} with {} spatial streams.",
                station.wcid().idx(),
                rate,
                nss
            );
        })
    }
}
