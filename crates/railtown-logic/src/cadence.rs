//! Tick-modulo schedules for periodic systems.
//!
//! The engine runs each periodic system on a fixed `(interval, offset)` pair
//! of the host tick counter, so two systems sharing an interval can be kept
//! on different ticks by giving them different offsets.
//!
//! ```
//! use railtown_logic::cadence::Cadence;
//!
//! let mount = Cadence::new(20, 10);
//! assert!(!mount.is_due(0));
//! assert!(mount.is_due(10));
//! assert!(mount.is_due(30));
//! ```

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cadence {
    /// Run once every `interval` ticks. Zero disables the system.
    pub interval: u32,
    /// Tick within the interval the system runs on.
    pub offset: u32,
}

impl Cadence {
    pub const fn new(interval: u32, offset: u32) -> Self {
        Self { interval, offset }
    }

    pub const fn disabled() -> Self {
        Self::new(0, 0)
    }

    pub fn is_due(&self, tick: u64) -> bool {
        if self.interval == 0 {
            return false;
        }
        let interval = u64::from(self.interval);
        tick % interval == u64::from(self.offset) % interval
    }

    /// Number of times the system runs over ticks `0..ticks`.
    pub fn runs_within(&self, ticks: u64) -> u64 {
        if self.interval == 0 {
            return 0;
        }
        let interval = u64::from(self.interval);
        let offset = u64::from(self.offset) % interval;
        if ticks <= offset {
            0
        } else {
            (ticks - offset - 1) / interval + 1
        }
    }
}
