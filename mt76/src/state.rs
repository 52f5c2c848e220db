//! Runtime state of the device.
//!
//! The run state is consulted by the RX path without holding the device mutex, so it's kept in a
//! single atomic together with the scanning flag.
use portable_atomic::{AtomicU8, Ordering};

const RUN_STATE_MASK: u8 = 0b11;
const SCANNING: u8 = 1 << 2;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// The lifecycle state of the device.
pub enum RunState {
    /// The hardware is down.
    #[default]
    Stopped,
    /// MAC and PHY are being brought up.
    Starting,
    /// The device is operational.
    Running,
    /// The hardware is being torn down.
    Stopping,
}
impl RunState {
    const fn from_bits(bits: u8) -> Self {
        match bits & RUN_STATE_MASK {
            0 => Self::Stopped,
            1 => Self::Starting,
            2 => Self::Running,
            _ => Self::Stopping,
        }
    }
    const fn into_bits(self) -> u8 {
        match self {
            Self::Stopped => 0,
            Self::Starting => 1,
            Self::Running => 2,
            Self::Stopping => 3,
        }
    }
}

/// The run state and the scanning flag of the device.
#[derive(Debug, Default)]
pub struct DeviceState {
    bits: AtomicU8,
}
impl DeviceState {
    /// Create a new stopped state, without scanning.
    pub const fn new() -> Self {
        Self {
            bits: AtomicU8::new(0),
        }
    }
    /// The current run state.
    pub fn run_state(&self) -> RunState {
        RunState::from_bits(self.bits.load(Ordering::Acquire))
    }
    /// Check if the device is running.
    pub fn is_running(&self) -> bool {
        self.run_state() == RunState::Running
    }
    /// Check if a software scan is in progress.
    pub fn is_scanning(&self) -> bool {
        self.bits.load(Ordering::Acquire) & SCANNING != 0
    }
    /// Transition to `run_state`, leaving the scanning flag untouched.
    ///
    /// Returns the previous run state.
    pub(crate) fn set_run_state(&self, run_state: RunState) -> RunState {
        let previous = self
            .bits
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                Some((bits & !RUN_STATE_MASK) | run_state.into_bits())
            })
            .unwrap_or_else(|bits| bits);
        RunState::from_bits(previous)
    }
    /// Set or clear the scanning flag.
    ///
    /// Returns whether a scan was in progress before.
    pub(crate) fn set_scanning(&self, scanning: bool) -> bool {
        let previous = if scanning {
            self.bits.fetch_or(SCANNING, Ordering::AcqRel)
        } else {
            self.bits.fetch_and(!SCANNING, Ordering::AcqRel)
        };
        previous & SCANNING != 0
    }
}
