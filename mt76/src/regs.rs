//! Register map of the MAC control block.
//!
//! Only the registers, which are touched by the control plane are listed here. Everything else
//! (DMA rings, PHY calibration, EEPROM) belongs to the hardware layer behind
//! [Mt76Hardware](crate::Mt76Hardware).

/// Build a contiguous bit mask from bit `low` up to and including bit `high`.
pub const fn genmask(high: u32, low: u32) -> u32 {
    (u32::MAX >> (31 - high)) & (u32::MAX << low)
}
/// Shift `value` into the field described by `mask`.
///
/// Bits of `value`, which don't fit into the field, are discarded.
pub const fn field_prep(mask: u32, value: u32) -> u32 {
    (value << mask.trailing_zeros()) & mask
}
/// Extract the field described by `mask` from `reg`.
pub const fn field_get(mask: u32, reg: u32) -> u32 {
    (reg & mask) >> mask.trailing_zeros()
}

// ============================================================================
// WCID table
// ============================================================================

/// Base of the per WCID address/BSS entries.
pub const MT_WCID_ADDR_BASE: u32 = 0x1800;
/// Address entry of WCID `idx`.
pub const fn mt_wcid_addr(idx: u8) -> u32 {
    MT_WCID_ADDR_BASE + (idx as u32) * 8
}
/// RX block ack session bit for `tid`, located at [mt_wcid_addr] + 4.
pub const fn mt_wcid_rx_ba_mask(tid: u8) -> u32 {
    1 << (16 + tid as u32)
}

/// Base of the WCID drop bitmap.
pub const MT_WCID_DROP_BASE: u32 = 0x106c;
/// Drop register containing the bit of WCID `idx`.
pub const fn mt_wcid_drop(idx: u8) -> u32 {
    MT_WCID_DROP_BASE + ((idx as u32) >> 5) * 4
}
/// Bit of WCID `idx` inside [mt_wcid_drop].
pub const fn mt_wcid_drop_mask(idx: u8) -> u32 {
    1 << (idx as u32 % 32)
}

// ============================================================================
// Timing
// ============================================================================

pub const MT_BKOFF_SLOT_CFG: u32 = 0x1104;
pub const MT_BKOFF_SLOT_CFG_SLOTTIME: u32 = genmask(7, 0);

pub const MT_BEACON_TIME_CFG: u32 = 0x1114;
pub const MT_BEACON_TIME_CFG_INTVAL: u32 = genmask(15, 0);

// ============================================================================
// EDCA / WMM
// ============================================================================

pub const MT_EDCA_CFG_BASE: u32 = 0x1300;
/// EDCA configuration of access category `queue`.
pub const fn mt_edca_cfg_ac(queue: u8) -> u32 {
    MT_EDCA_CFG_BASE + ((queue as u32) << 2)
}
pub const MT_EDCA_CFG_TXOP: u32 = genmask(7, 0);
pub const MT_EDCA_CFG_AIFSN: u32 = genmask(11, 8);
pub const MT_EDCA_CFG_CWMIN: u32 = genmask(15, 12);
pub const MT_EDCA_CFG_CWMAX: u32 = genmask(19, 16);

pub const MT_WMM_AIFSN: u32 = 0x0214;
pub const MT_WMM_AIFSN_MASK: u32 = genmask(3, 0);
pub const fn mt_wmm_aifsn_shift(queue: u8) -> u32 {
    queue as u32 * 4
}

pub const MT_WMM_CWMIN: u32 = 0x0218;
pub const MT_WMM_CWMIN_MASK: u32 = genmask(3, 0);
pub const fn mt_wmm_cwmin_shift(queue: u8) -> u32 {
    queue as u32 * 4
}

pub const MT_WMM_CWMAX: u32 = 0x021c;
pub const MT_WMM_CWMAX_MASK: u32 = genmask(3, 0);
pub const fn mt_wmm_cwmax_shift(queue: u8) -> u32 {
    queue as u32 * 4
}

pub const MT_WMM_TXOP_BASE: u32 = 0x0220;
/// TXOP register shared by two access categories.
pub const fn mt_wmm_txop(queue: u8) -> u32 {
    MT_WMM_TXOP_BASE + ((queue as u32 / 2) << 2)
}
pub const fn mt_wmm_txop_shift(queue: u8) -> u32 {
    (queue as u32 & 1) * 16
}
pub const MT_WMM_TXOP_MASK: u32 = genmask(15, 0);

// ============================================================================
// RX filter
// ============================================================================

pub const MT_RX_FILTR_CFG: u32 = 0x1400;

bitflags::bitflags! {
    /// Drop bits of [MT_RX_FILTR_CFG].
    ///
    /// A set bit makes the hardware drop the matching frames.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct RxFilterConfig: u32 {
        const CRC_ERR = 1 << 0;
        const PHY_ERR = 1 << 1;
        const PROMISC = 1 << 2;
        const OTHER_BSS = 1 << 3;
        const VER_ERR = 1 << 4;
        const MCAST = 1 << 5;
        const BCAST = 1 << 6;
        const DUP = 1 << 7;
        const CFACK = 1 << 8;
        const CFEND = 1 << 9;
        const ACK = 1 << 10;
        const CTS = 1 << 11;
        const RTS = 1 << 12;
        const PSPOLL = 1 << 13;
        const BA = 1 << 14;
        const BAR = 1 << 15;
        const CTRL_RSV = 1 << 16;
    }
}
