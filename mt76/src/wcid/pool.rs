//! The WCID pool and the lookup table read by the data path.
//!
//! Station WCIDs live in a statically allocated pool of reference counted entries, similar to the
//! RX buffers of the stack. The lookup table maps a hardware WCID to the pool entry currently
//! published for it.
//!
//! ## Entry lifecycle
//! The reference count of an entry carries an ownership bit, which is held by the [Station](crate::Station)
//! the entry belongs to.
//! 1. The configuration path claims a free entry (count `0`) by setting the ownership bit,
//!    initializes it and only then publishes it in the lookup table with release ordering.
//! 2. Readers load the entry from the table, take a reference if the ownership bit is still set,
//!    and then check that the table still points to the same entry. If it doesn't, the reference
//!    is dropped again and the lookup fails. A successful lookup therefore always sees a fully
//!    initialized entry.
//! 3. On removal, the entry is unpublished first and the ownership bit is dropped afterwards. The
//!    entry becomes free once the last [WcidRef] is dropped, so a reader never observes it being
//!    reinitialized for another station, even if the WCID index itself is reused immediately.
use core::{cell::UnsafeCell, ops::Deref};

use portable_atomic::{AtomicU16, AtomicUsize, Ordering};

use super::{NUM_TIDS, WCID_TABLE_SIZE, Wcid};
use crate::WCID_POOL_SIZE;

const OWNED: usize = 1 << (usize::BITS - 1);
const NOT_PUBLISHED: u16 = 0;

/// The data of a station WCID.
#[derive(Debug)]
pub struct StationWcid {
    wcid: Wcid,
    address: [u8; 6],
    vif_idx: u8,
    agg_ssn: [AtomicU16; NUM_TIDS],
}
impl StationWcid {
    const fn new(idx: u8, vif_idx: u8, address: [u8; 6]) -> Self {
        Self {
            wcid: Wcid::new(idx),
            address,
            vif_idx,
            agg_ssn: [const { AtomicU16::new(0) }; NUM_TIDS],
        }
    }
    /// The WCID of the station.
    pub const fn wcid(&self) -> &Wcid {
        &self.wcid
    }
    /// The address of the station.
    pub const fn address(&self) -> [u8; 6] {
        self.address
    }
    /// The BSS index of the interface, that the station belongs to.
    pub const fn vif_idx(&self) -> u8 {
        self.vif_idx
    }
    /// The starting sequence number stashed for the TX block ack session of `tid`.
    ///
    /// This is already shifted into the position of the sequence control field.
    pub fn agg_ssn(&self, tid: u8) -> Option<u16> {
        self.agg_ssn
            .get(tid as usize)
            .map(|agg_ssn| agg_ssn.load(Ordering::Acquire))
    }
    pub(crate) fn set_agg_ssn(&self, tid: u8, ssn: u16) {
        if let Some(agg_ssn) = self.agg_ssn.get(tid as usize) {
            agg_ssn.store(ssn, Ordering::Release);
        }
    }
}

struct WcidEntry {
    refs: AtomicUsize,
    station: UnsafeCell<StationWcid>,
}
// SAFETY:
// The station data is only written through the UnsafeCell, while the writer exclusively owns the
// entry and no reader can have obtained a reference to the data. See the module documentation.
unsafe impl Sync for WcidEntry {}
impl WcidEntry {
    const fn new() -> Self {
        Self {
            refs: AtomicUsize::new(0),
            station: UnsafeCell::new(StationWcid::new(0, 0, [0; 6])),
        }
    }
    /// Claim the entry, if it's free.
    ///
    /// This has to release, so that a reader, which acquires the entry after this, also observes
    /// the entry having been unpublished before.
    fn try_claim(&self) -> bool {
        self.refs
            .compare_exchange(0, OWNED, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
    }
    /// Take a reader reference, if the entry is still owned.
    fn try_acquire(&self) -> bool {
        self.refs
            .fetch_update(Ordering::Acquire, Ordering::Relaxed, |refs| {
                (refs & OWNED != 0).then_some(refs + 1)
            })
            .is_ok()
    }
    fn release(&self) {
        self.refs.fetch_sub(1, Ordering::Release);
    }
    fn disown(&self) {
        self.refs.fetch_and(!OWNED, Ordering::AcqRel);
    }
    /// # SAFETY:
    /// The caller must either own the entry or hold a reader reference obtained through a
    /// successful lookup.
    unsafe fn station(&self) -> &StationWcid {
        unsafe { &*self.station.get() }
    }
}

/// The storage for station WCIDs and the lookup table.
pub struct WcidPool {
    entries: [WcidEntry; WCID_POOL_SIZE],
    /// Index of the published entry plus one, or [NOT_PUBLISHED].
    published: [AtomicU16; WCID_TABLE_SIZE],
}
impl WcidPool {
    /// Create a new empty pool.
    pub const fn new() -> Self {
        Self {
            entries: [const { WcidEntry::new() }; WCID_POOL_SIZE],
            published: [const { AtomicU16::new(NOT_PUBLISHED) }; WCID_TABLE_SIZE],
        }
    }
    /// Claim a free entry and initialize it.
    ///
    /// The entry isn't visible to readers until it's published.
    pub(crate) fn claim(&self, idx: u8, vif_idx: u8, address: [u8; 6]) -> Option<WcidOwner<'_>> {
        let (entry_index, entry) = self
            .entries
            .iter()
            .enumerate()
            .find(|(_, entry)| entry.try_claim())?;
        // SAFETY:
        // We just claimed the entry, so no owner exists and no reader can pass the check in
        // lookup, since the entry isn't published. Readers, which still hold a stale index, only
        // touch the reference count.
        unsafe {
            entry.station.get().write(StationWcid::new(idx, vif_idx, address));
        }
        Some(WcidOwner {
            entry,
            entry_index: entry_index as u16,
        })
    }
    /// Make the entry visible to readers.
    pub(crate) fn publish(&self, owner: &WcidOwner<'_>) {
        self.published[owner.wcid().idx() as usize].store(owner.entry_index + 1, Ordering::Release);
    }
    /// Remove the entry from the lookup table.
    ///
    /// Lookups started after this fail, while existing [WcidRef]s stay valid.
    pub(crate) fn unpublish(&self, owner: &WcidOwner<'_>) {
        let slot = &self.published[owner.wcid().idx() as usize];
        // Only clear the slot, if it still points to this entry.
        let _ = slot.compare_exchange(
            owner.entry_index + 1,
            NOT_PUBLISHED,
            Ordering::AcqRel,
            Ordering::Relaxed,
        );
    }
    /// Unpublish the entry and give up ownership.
    ///
    /// The entry is reused once all outstanding [WcidRef]s are dropped.
    pub(crate) fn retire(&self, owner: WcidOwner<'_>) {
        self.unpublish(&owner);
        owner.entry.disown();
    }
    /// Look up the station published for WCID `idx`.
    ///
    /// This doesn't block and can be used from any context.
    pub fn lookup(&self, idx: u8) -> Option<WcidRef<'_>> {
        let slot = &self.published[idx as usize];
        let published = slot.load(Ordering::Acquire);
        let entry = self.entries.get(published.checked_sub(1)? as usize)?;
        if !entry.try_acquire() {
            return None;
        }
        // The entry may have been retired and claimed again, between loading the slot and taking
        // the reference.
        if slot.load(Ordering::Acquire) != published {
            entry.release();
            return None;
        }
        Some(WcidRef { entry })
    }
    /// Check if any entry is published for WCID `idx`.
    pub fn is_published(&self, idx: u8) -> bool {
        self.published[idx as usize].load(Ordering::Acquire) != NOT_PUBLISHED
    }
    /// The amount of entries, that are neither owned nor referenced.
    pub fn free_entries(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.refs.load(Ordering::Acquire) == 0)
            .count()
    }
}
impl Default for WcidPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Ownership of a pool entry.
pub(crate) struct WcidOwner<'res> {
    entry: &'res WcidEntry,
    entry_index: u16,
}
impl Deref for WcidOwner<'_> {
    type Target = StationWcid;
    fn deref(&self) -> &Self::Target {
        // SAFETY:
        // We own the entry.
        unsafe { self.entry.station() }
    }
}

/// A reference to a published station WCID.
///
/// While this exists, the data it points to stays valid and unchanged (apart from the atomic key
/// binding and rate hint), even if the station is removed and the WCID index is handed to another
/// station.
pub struct WcidRef<'res> {
    entry: &'res WcidEntry,
}
impl Clone for WcidRef<'_> {
    fn clone(&self) -> Self {
        self.entry.refs.fetch_add(1, Ordering::Relaxed);
        Self { entry: self.entry }
    }
}
impl Deref for WcidRef<'_> {
    type Target = StationWcid;
    fn deref(&self) -> &Self::Target {
        // SAFETY:
        // We hold a reader reference obtained through a successful lookup.
        unsafe { self.entry.station() }
    }
}
impl Drop for WcidRef<'_> {
    fn drop(&mut self) {
        self.entry.release();
    }
}
