//! Grouped hardware counters with an enable/disable lifecycle.
//!
//! A [`CounterGroup`] owns a set of events that the kernel schedules, starts,
//! stops, and reads as one unit. The first event added is the group leader;
//! a group is never empty.
//!
//! ```text
//! Configured --enable--> Active --disable--> Disabled
//!                          ^                    |
//!                          +------enable--------+
//! ```
//!
//! Events can only be added while `Configured`. Snapshots are read once the
//! group is `Disabled` (or, for diagnostics, while `Active`).
//!
//! # Usage
//!
//! ```rust,ignore
//! use perf_bracket::{CounterGroup, EventKind};
//!
//! // May require root or capabilities!
//! let mut group = CounterGroup::new(EventKind::CYCLES, "cycles")?;
//! group.add_event(EventKind::INSTRUCTIONS, "instructions")?;
//!
//! group.enable()?;
//! run_query();
//! group.disable()?;
//!
//! let snapshot = group.read_events()?;
//! println!("IPC = {:?}", snapshot.ipc());
//! ```
//!
//! A group is not meant to be shared between threads; create one per thread.

use tracing::{debug, warn};

use crate::error::{CounterError, GroupState};
use crate::event::{EventDescriptor, EventKind};
use crate::measurement::{serialize, CounterBackend, PerfBackend};
use crate::snapshot::{CounterValue, Snapshot, WALL_CLOCK_MS};

/// A set of counters enabled, disabled, and read together.
pub struct CounterGroup<B: CounterBackend = PerfBackend> {
    backend: B,
    events: Vec<EventDescriptor>,
    state: GroupState,
}

impl CounterGroup<PerfBackend> {
    /// Open a perf_event group whose leader counts `kind`.
    ///
    /// # Errors
    ///
    /// Returns `CounterUnavailable` if:
    /// - The CPU or kernel does not support the event
    /// - The process lacks permission (root, `CAP_PERFMON`, or `perf_event_paranoid`)
    /// - The platform has no perf_event support
    pub fn new(kind: EventKind, name: impl Into<String>) -> Result<Self, CounterError> {
        Self::with_backend(PerfBackend::new(), kind, name)
    }
}

impl<B: CounterBackend> CounterGroup<B> {
    /// Create a group on an explicit backend and open its leader.
    ///
    /// If the leader cannot be opened the backend is dropped, releasing
    /// anything it had acquired.
    pub fn with_backend(
        mut backend: B,
        kind: EventKind,
        name: impl Into<String>,
    ) -> Result<Self, CounterError> {
        let leader = EventDescriptor::new(kind, name);
        if leader.name() == WALL_CLOCK_MS {
            return Err(CounterError::DuplicateName(leader.name().to_string()));
        }

        backend.open(&leader)?;
        debug!(
            backend = backend.name(),
            leader = leader.name(),
            event = %leader.kind(),
            "opened counter group"
        );

        Ok(Self {
            backend,
            events: vec![leader],
            state: GroupState::Configured,
        })
    }

    /// Attach another event to the group.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless the group is still `Configured`
    /// - `DuplicateName` if `name` is taken (or is the reserved `wall_clock_ms`)
    /// - `CounterUnavailable` if the kernel cannot provide the event, including
    ///   when all hardware counter slots are used. The group and its existing
    ///   events stay usable.
    pub fn add_event(&mut self, kind: EventKind, name: impl Into<String>) -> Result<(), CounterError> {
        if self.state != GroupState::Configured {
            return Err(CounterError::invalid_state("add an event", self.state));
        }

        let event = EventDescriptor::new(kind, name);
        if event.name() == WALL_CLOCK_MS || self.events.iter().any(|e| e.name() == event.name()) {
            return Err(CounterError::DuplicateName(event.name().to_string()));
        }

        if let Err(e) = self.backend.open(&event) {
            warn!(event = event.name(), error = %e, "could not add counter");
            return Err(e);
        }
        debug!(event = event.name(), kind = %event.kind(), "added counter");
        self.events.push(event);
        Ok(())
    }

    /// Zero and start every counter.
    ///
    /// Equivalent to `enable_with(true)`.
    pub fn enable(&mut self) -> Result<(), CounterError> {
        self.enable_with(true)
    }

    /// Start every counter, optionally zeroing them first.
    ///
    /// Without a reset, counts accumulate on top of the previous window.
    /// The instruction stream is serialized after the counters start.
    ///
    /// # Errors
    ///
    /// `InvalidState` if already active; `CounterUnavailable` if the kernel
    /// refuses.
    pub fn enable_with(&mut self, reset: bool) -> Result<(), CounterError> {
        if self.state == GroupState::Active {
            return Err(CounterError::invalid_state("enable", self.state));
        }

        if reset {
            self.backend
                .reset()
                .map_err(|e| CounterError::from_io(self.leader().name(), &e))?;
        }
        self.backend
            .enable()
            .map_err(|e| CounterError::from_io(self.leader().name(), &e))?;
        self.state = GroupState::Active;
        serialize();
        Ok(())
    }

    /// Stop every counter.
    ///
    /// The instruction stream is serialized before the counters stop.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless active. If the kernel refuses to stop the
    /// counters the group stays `Active` and `CounterUnavailable` is returned.
    pub fn disable(&mut self) -> Result<(), CounterError> {
        if self.state != GroupState::Active {
            return Err(CounterError::invalid_state("disable", self.state));
        }

        serialize();
        self.backend
            .disable()
            .map_err(|e| CounterError::from_io(self.leader().name(), &e))?;
        self.state = GroupState::Disabled;
        Ok(())
    }

    /// Read all counters, corrected for multiplexing.
    ///
    /// Each value is `raw * time_enabled / time_running`. Events that were
    /// never scheduled in the window are `Unavailable`.
    ///
    /// While the group is active this returns in-flight values, which keep
    /// changing; use it for diagnostics only.
    ///
    /// # Errors
    ///
    /// `InvalidState` if the group was never enabled; `CounterUnavailable` if
    /// the kernel read fails.
    pub fn read_events(&mut self) -> Result<Snapshot, CounterError> {
        match self.state {
            GroupState::Configured => {
                return Err(CounterError::invalid_state("read events", self.state))
            }
            GroupState::Active => debug!("reading counters while active; values are in flight"),
            GroupState::Disabled => {}
        }

        let readings = self
            .backend
            .read()
            .map_err(|e| CounterError::from_io(self.leader().name(), &e))?;

        let mut snapshot = Snapshot::default();
        for (idx, event) in self.events.iter().enumerate() {
            let value = match readings.get(idx).and_then(|r| r.corrected()) {
                Some((count, saturated)) => {
                    if saturated {
                        warn!(event = event.name(), "corrected count overflowed; saturated at u64::MAX");
                    }
                    CounterValue::Count(count)
                }
                None => {
                    warn!(event = event.name(), "counter was never scheduled; reporting unavailable");
                    CounterValue::Unavailable
                }
            };
            snapshot.insert(event.name(), value);
        }
        Ok(snapshot)
    }

    /// Current lifecycle state.
    pub fn state(&self) -> GroupState {
        self.state
    }

    /// Events in the order they were added; the first is the leader.
    pub fn events(&self) -> &[EventDescriptor] {
        &self.events
    }

    /// The group leader.
    pub fn leader(&self) -> &EventDescriptor {
        &self.events[0]
    }

    /// The backend driving the counters.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable access to the backend, e.g. to script a synthetic backend.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

impl<B: CounterBackend> std::fmt::Debug for CounterGroup<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CounterGroup")
            .field("backend", &self.backend.name())
            .field("events", &self.events.iter().map(|e| e.name()).collect::<Vec<_>>())
            .field("state", &self.state)
            .finish()
    }
}
