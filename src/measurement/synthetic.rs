//! Scripted in-memory counters.
//!
//! [`SyntheticBackend`] behaves like a counter group whose readings are set by
//! the caller. It is used to exercise the group state machine, multiplexing
//! correction, and failure paths without hardware access, and for dry runs of
//! a measurement pipeline on machines without a PMU.
//!
//! ```
//! use perf_bracket::{CounterGroup, CounterValue, EventKind};
//! use perf_bracket::measurement::{RawCount, SyntheticBackend};
//!
//! let mut group = CounterGroup::with_backend(SyntheticBackend::new(), EventKind::CYCLES, "cycles").unwrap();
//! group.enable().unwrap();
//! group.disable().unwrap();
//! group.backend_mut().set_reading("cycles", RawCount::new(1000, 100, 50));
//!
//! let snapshot = group.read_events().unwrap();
//! assert_eq!(snapshot.get("cycles"), Some(CounterValue::Count(2000)));
//! ```

use std::io;

use crate::error::{CounterError, UnavailableReason};
use crate::event::{EventDescriptor, EventKind};
use crate::measurement::backend::{CounterBackend, RawCount};

/// How many times each backend operation was invoked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    /// `open` calls that succeeded.
    pub open: usize,
    /// `enable` calls.
    pub enable: usize,
    /// `disable` calls.
    pub disable: usize,
    /// `reset` calls.
    pub reset: usize,
    /// `read` calls.
    pub read: usize,
}

/// A counter backend with scripted readings and failures.
#[derive(Debug, Clone, Default)]
pub struct SyntheticBackend {
    names: Vec<String>,
    readings: Vec<RawCount>,
    rejected: Vec<(EventKind, UnavailableReason)>,
    slots: Option<usize>,
    disable_failure: Option<io::ErrorKind>,
    enabled: bool,
    calls: CallCounts,
}

impl SyntheticBackend {
    /// A backend that accepts any event.
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse to open `kind`, failing with `reason`.
    pub fn reject(mut self, kind: EventKind, reason: UnavailableReason) -> Self {
        self.rejected.push((kind, reason));
        self
    }

    /// Limit the number of events that can be opened, like physical counters.
    pub fn with_slots(mut self, slots: usize) -> Self {
        self.slots = Some(slots);
        self
    }

    /// Make every `disable` fail with `kind`, leaving the counters running.
    pub fn fail_disable(mut self, kind: io::ErrorKind) -> Self {
        self.disable_failure = Some(kind);
        self
    }

    /// Replace the reading of the named event.
    ///
    /// Returns `false` if no such event was opened.
    pub fn set_reading(&mut self, name: &str, reading: RawCount) -> bool {
        match self.position(name) {
            Some(idx) => {
                self.readings[idx] = reading;
                true
            }
            None => false,
        }
    }

    /// Current reading of the named event.
    pub fn reading(&self, name: &str) -> Option<RawCount> {
        self.position(name).map(|idx| self.readings[idx])
    }

    /// Add to the named event's value, as if work happened.
    ///
    /// Only counts while enabled.
    pub fn count(&mut self, name: &str, delta: u64) {
        if !self.enabled {
            return;
        }
        if let Some(idx) = self.position(name) {
            let reading = &mut self.readings[idx];
            reading.value = reading.value.saturating_add(delta);
        }
    }

    /// Let `nanos` of time pass.
    ///
    /// While enabled every event accrues enabled time. `running_percent` is
    /// the share of that time each event was actually scheduled.
    pub fn tick(&mut self, nanos: u64, running_percent: u64) {
        if !self.enabled {
            return;
        }
        let running = nanos.saturating_mul(running_percent.min(100)) / 100;
        for reading in &mut self.readings {
            reading.time_enabled = reading.time_enabled.saturating_add(nanos);
            reading.time_running = reading.time_running.saturating_add(running);
        }
    }

    /// Whether the counters are currently running.
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Names of the opened events, leader first.
    pub fn opened(&self) -> &[String] {
        &self.names
    }

    /// Invocation counts so far.
    pub fn calls(&self) -> CallCounts {
        self.calls
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

impl CounterBackend for SyntheticBackend {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn open(&mut self, event: &EventDescriptor) -> Result<(), CounterError> {
        if let Some((_, reason)) = self.rejected.iter().find(|(kind, _)| *kind == event.kind()) {
            return Err(CounterError::CounterUnavailable {
                name: event.name().to_string(),
                reason: reason.clone(),
            });
        }
        if self.slots.is_some_and(|slots| self.names.len() >= slots) {
            return Err(CounterError::CounterUnavailable {
                name: event.name().to_string(),
                reason: UnavailableReason::CapacityExhausted,
            });
        }

        self.names.push(event.name().to_string());
        self.readings.push(RawCount::default());
        self.calls.open += 1;
        Ok(())
    }

    fn enable(&mut self) -> io::Result<()> {
        self.calls.enable += 1;
        self.enabled = true;
        Ok(())
    }

    fn disable(&mut self) -> io::Result<()> {
        self.calls.disable += 1;
        if let Some(kind) = self.disable_failure {
            return Err(io::Error::new(kind, "scripted disable failure"));
        }
        self.enabled = false;
        Ok(())
    }

    fn reset(&mut self) -> io::Result<()> {
        self.calls.reset += 1;
        for reading in &mut self.readings {
            *reading = RawCount::default();
        }
        Ok(())
    }

    fn read(&mut self) -> io::Result<Vec<RawCount>> {
        self.calls.read += 1;
        Ok(self.readings.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(kind: EventKind, name: &str) -> EventDescriptor {
        EventDescriptor::new(kind, name)
    }

    #[test]
    fn test_counts_only_while_enabled() {
        let mut backend = SyntheticBackend::new();
        backend.open(&desc(EventKind::CYCLES, "cycles")).unwrap();

        backend.count("cycles", 10);
        assert_eq!(backend.reading("cycles").unwrap().value, 0);

        backend.enable().unwrap();
        backend.count("cycles", 10);
        backend.tick(100, 50);
        backend.disable().unwrap();
        backend.count("cycles", 10);

        assert_eq!(backend.reading("cycles"), Some(RawCount::new(10, 100, 50)));
    }

    #[test]
    fn test_slots_limit_opens() {
        let mut backend = SyntheticBackend::new().with_slots(1);
        backend.open(&desc(EventKind::CYCLES, "cycles")).unwrap();
        let err = backend.open(&desc(EventKind::INSTRUCTIONS, "instructions")).unwrap_err();
        assert!(matches!(
            err,
            CounterError::CounterUnavailable {
                reason: UnavailableReason::CapacityExhausted,
                ..
            }
        ));
        assert_eq!(backend.opened(), ["cycles".to_string()]);
    }

    #[test]
    fn test_reset_clears_readings() {
        let mut backend = SyntheticBackend::new();
        backend.open(&desc(EventKind::CYCLES, "cycles")).unwrap();
        assert!(backend.set_reading("cycles", RawCount::new(5, 5, 5)));
        assert!(!backend.set_reading("missing", RawCount::default()));

        backend.reset().unwrap();
        assert_eq!(backend.read().unwrap(), vec![RawCount::default()]);
        assert_eq!(backend.calls().reset, 1);
    }

    #[test]
    fn test_failed_disable_keeps_counting() {
        let mut backend = SyntheticBackend::new().fail_disable(io::ErrorKind::Other);
        backend.open(&desc(EventKind::CYCLES, "cycles")).unwrap();
        backend.enable().unwrap();

        assert!(backend.disable().is_err());
        assert!(backend.is_enabled());
        backend.count("cycles", 3);
        assert_eq!(backend.reading("cycles").unwrap().value, 3);
        assert_eq!(backend.calls().disable, 1);
    }
}
