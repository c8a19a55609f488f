//! The seam between a counter group and whatever provides the counters.

use std::io;

use serde::{Deserialize, Serialize};

use crate::error::CounterError;
use crate::event::EventDescriptor;

/// One event's raw reading together with its scheduling times.
///
/// `time_enabled` is how long the event was enabled; `time_running` is how
/// long it actually occupied a hardware counter. They differ when the kernel
/// multiplexes more events than there are physical counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCount {
    /// Raw counter value.
    pub value: u64,
    /// Nanoseconds the event was enabled.
    pub time_enabled: u64,
    /// Nanoseconds the event was scheduled on a counter.
    pub time_running: u64,
}

impl RawCount {
    /// A reading with explicit times.
    pub fn new(value: u64, time_enabled: u64, time_running: u64) -> Self {
        Self {
            value,
            time_enabled,
            time_running,
        }
    }

    /// Value scaled for the time the event was not scheduled.
    ///
    /// Returns `None` if the event never ran. The product is computed in
    /// 128 bits; results beyond `u64::MAX` saturate and set the second field.
    pub fn corrected(&self) -> Option<(u64, bool)> {
        if self.time_running == 0 {
            return None;
        }
        if self.time_running >= self.time_enabled {
            return Some((self.value, false));
        }
        let scaled = self.value as u128 * self.time_enabled as u128 / self.time_running as u128;
        match u64::try_from(scaled) {
            Ok(v) => Some((v, false)),
            Err(_) => Some((u64::MAX, true)),
        }
    }
}

/// Provider of a set of grouped counters.
///
/// A backend owns the live handles of one group. The first event opened is
/// the group leader; later events join its group. `enable`, `disable`, and
/// `reset` act on every event at once. `read` returns one [`RawCount`] per
/// opened event, in the order they were opened.
///
/// Backends release their handles on drop.
pub trait CounterBackend {
    /// Short name for diagnostics.
    fn name(&self) -> &'static str;

    /// Open an event. The first call opens the leader.
    ///
    /// On failure nothing is added and previously opened events stay usable.
    fn open(&mut self, event: &EventDescriptor) -> Result<(), CounterError>;

    /// Start all counters.
    fn enable(&mut self) -> io::Result<()>;

    /// Stop all counters.
    fn disable(&mut self) -> io::Result<()>;

    /// Zero all counters and their times.
    fn reset(&mut self) -> io::Result<()>;

    /// Read every counter, leader first.
    fn read(&mut self) -> io::Result<Vec<RawCount>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multiplexing_correction() {
        assert_eq!(RawCount::new(1000, 100, 50).corrected(), Some((2000, false)));
    }

    #[test]
    fn test_fully_scheduled_is_raw() {
        assert_eq!(RawCount::new(1234, 100, 100).corrected(), Some((1234, false)));
    }

    #[test]
    fn test_never_scheduled_is_unavailable() {
        assert_eq!(RawCount::new(0, 100, 0).corrected(), None);
        assert_eq!(RawCount::default().corrected(), None);
    }

    #[test]
    fn test_overflow_saturates() {
        let reading = RawCount::new(u64::MAX / 2, 1000, 1);
        assert_eq!(reading.corrected(), Some((u64::MAX, true)));
    }

    #[test]
    fn test_wide_intermediate_does_not_overflow() {
        // value * enabled exceeds u64 but the quotient fits
        let reading = RawCount::new(u64::MAX / 4, 3_000_000_000, 1_500_000_000);
        assert_eq!(reading.corrected(), Some(((u64::MAX / 4) * 2, false)));
    }
}
