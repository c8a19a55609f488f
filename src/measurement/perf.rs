//! Hardware counters on Linux through the perf_event subsystem.
//!
//! Every event of a group is opened with `perf_event_open(2)` under one group
//! file descriptor, so the kernel schedules, enables, disables, and reads them
//! together. Reads include `time_enabled`/`time_running`, which the counter
//! group uses for multiplexing correction.
//!
//! # Requirements
//!
//! - Linux kernel with perf_event support
//! - Enable with `--features perf` (on by default)
//! - One of: root, the `CAP_PERFMON` capability (kernel 5.8+), or
//!   `kernel.perf_event_paranoid <= 2` (check with
//!   `cat /proc/sys/kernel/perf_event_paranoid`)
//!
//! Hardware events are often missing inside virtual machines and containers;
//! software events such as `task-clock` still work there.
//!
//! On other platforms, or without the feature, [`PerfBackend`] exists but every
//! open fails with [`UnavailableReason::UnsupportedPlatform`](crate::UnavailableReason::UnsupportedPlatform).

use crate::error::CounterError;
use crate::event::EventDescriptor;
use crate::measurement::backend::{CounterBackend, RawCount};

#[cfg(all(target_os = "linux", feature = "perf"))]
mod linux {
    use std::io;

    use ::perf_event2::events::{
        Cache, CacheId, CacheOp, CacheResult, Event, Hardware, Raw, Software,
    };
    use ::perf_event2::{Builder, Counter, Group, GroupData};

    use super::*;
    use crate::event::{
        CacheAccess, CacheEvent, CacheLevel, CacheOutcome, EventKind, HardwareEvent,
        SoftwareEvent,
    };

    /// Counters backed by `perf_event_open(2)` on the calling thread.
    ///
    /// The group file descriptor is created with the first event. Members are
    /// declared before the group so they are closed first on drop.
    ///
    /// The kernel's reset ioctl zeroes counts but not `time_enabled` or
    /// `time_running`, so the times seen at the last reset are kept and
    /// subtracted from every read.
    #[derive(Default)]
    pub struct PerfBackend {
        members: Vec<Counter>,
        group: Option<Group>,
        times_at_reset: (u64, u64),
    }

    impl PerfBackend {
        /// An empty backend; nothing is opened until the first event.
        pub fn new() -> Self {
            Self::default()
        }

        fn group(&mut self) -> io::Result<&mut Group> {
            self.group
                .as_mut()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "no events opened"))
        }
    }

    impl CounterBackend for PerfBackend {
        fn name(&self) -> &'static str {
            "perf_event"
        }

        fn open(&mut self, event: &EventDescriptor) -> Result<(), CounterError> {
            let fresh = self.group.is_none();
            if fresh {
                let group = Group::new().map_err(|e| CounterError::from_io(event.name(), &e))?;
                self.group = Some(group);
            }

            let opened = match self.group.as_mut() {
                Some(group) => open_member(group, event.kind()),
                None => Err(io::Error::new(io::ErrorKind::NotConnected, "no group")),
            };

            match opened {
                Ok(counter) => {
                    self.members.push(counter);
                    Ok(())
                }
                Err(e) => {
                    if fresh {
                        // roll back the group fd opened for this leader
                        self.group = None;
                    }
                    Err(CounterError::from_io(event.name(), &e))
                }
            }
        }

        fn enable(&mut self) -> io::Result<()> {
            self.group()?.enable()
        }

        fn disable(&mut self) -> io::Result<()> {
            self.group()?.disable()
        }

        fn reset(&mut self) -> io::Result<()> {
            let group = self.group()?;
            group.reset()?;
            let times = group_times(&group.read()?).unwrap_or_default();
            self.times_at_reset = times;
            Ok(())
        }

        fn read(&mut self) -> io::Result<Vec<RawCount>> {
            let counts = self.group()?.read()?;
            // Without timing in the read format no correction is possible;
            // report the raw values as fully scheduled.
            let (time_enabled, time_running) = match group_times(&counts) {
                Some((enabled, running)) => (
                    enabled.saturating_sub(self.times_at_reset.0),
                    running.saturating_sub(self.times_at_reset.1),
                ),
                None => (1, 1),
            };

            Ok(self
                .members
                .iter()
                .map(|member| RawCount::new(counts[member], time_enabled, time_running))
                .collect())
        }
    }

    impl std::fmt::Debug for PerfBackend {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("PerfBackend")
                .field("events", &self.members.len())
                .field("open", &self.group.is_some())
                .field("times_at_reset", &self.times_at_reset)
                .finish()
        }
    }

    fn nanos(d: std::time::Duration) -> u64 {
        u64::try_from(d.as_nanos()).unwrap_or(u64::MAX)
    }

    fn group_times(counts: &GroupData) -> Option<(u64, u64)> {
        Some((nanos(counts.time_enabled()?), nanos(counts.time_running()?)))
    }

    fn open_member(group: &mut Group, kind: EventKind) -> io::Result<Counter> {
        match kind {
            EventKind::Hardware(hw) => attach(group, hardware(hw)),
            EventKind::Software(sw) => attach(group, software(sw)),
            EventKind::Cache(cache) => attach(group, cache_event(cache)),
            EventKind::Raw(code) => attach(group, Raw::new(code)),
        }
    }

    fn attach<E: Event + 'static>(group: &mut Group, event: E) -> io::Result<Counter> {
        group.add(&Builder::new(event))
    }

    fn hardware(hw: HardwareEvent) -> Hardware {
        match hw {
            HardwareEvent::CpuCycles => Hardware::CPU_CYCLES,
            HardwareEvent::Instructions => Hardware::INSTRUCTIONS,
            HardwareEvent::CacheReferences => Hardware::CACHE_REFERENCES,
            HardwareEvent::CacheMisses => Hardware::CACHE_MISSES,
            HardwareEvent::BranchInstructions => Hardware::BRANCH_INSTRUCTIONS,
            HardwareEvent::BranchMisses => Hardware::BRANCH_MISSES,
            HardwareEvent::BusCycles => Hardware::BUS_CYCLES,
            HardwareEvent::StalledCyclesFrontend => Hardware::STALLED_CYCLES_FRONTEND,
            HardwareEvent::StalledCyclesBackend => Hardware::STALLED_CYCLES_BACKEND,
            HardwareEvent::RefCpuCycles => Hardware::REF_CPU_CYCLES,
        }
    }

    fn software(sw: SoftwareEvent) -> Software {
        match sw {
            SoftwareEvent::CpuClock => Software::CPU_CLOCK,
            SoftwareEvent::TaskClock => Software::TASK_CLOCK,
            SoftwareEvent::PageFaults => Software::PAGE_FAULTS,
            SoftwareEvent::ContextSwitches => Software::CONTEXT_SWITCHES,
            SoftwareEvent::CpuMigrations => Software::CPU_MIGRATIONS,
            SoftwareEvent::MinorFaults => Software::PAGE_FAULTS_MIN,
            SoftwareEvent::MajorFaults => Software::PAGE_FAULTS_MAJ,
        }
    }

    fn cache_event(cache: CacheEvent) -> Cache {
        Cache {
            which: match cache.level {
                CacheLevel::L1D => CacheId::L1D,
                CacheLevel::L1I => CacheId::L1I,
                CacheLevel::LL => CacheId::LL,
                CacheLevel::DTLB => CacheId::DTLB,
                CacheLevel::ITLB => CacheId::ITLB,
                CacheLevel::BPU => CacheId::BPU,
                CacheLevel::Node => CacheId::NODE,
            },
            operation: match cache.access {
                CacheAccess::Read => CacheOp::READ,
                CacheAccess::Write => CacheOp::WRITE,
                CacheAccess::Prefetch => CacheOp::PREFETCH,
            },
            result: match cache.outcome {
                CacheOutcome::Access => CacheResult::ACCESS,
                CacheOutcome::Miss => CacheResult::MISS,
            },
        }
    }
}

#[cfg(all(target_os = "linux", feature = "perf"))]
pub use linux::PerfBackend;

// Stub implementation for other platforms and builds without `perf`.
#[cfg(not(all(target_os = "linux", feature = "perf")))]
/// Stub backend; every open fails with `UnsupportedPlatform`.
#[derive(Debug, Default)]
pub struct PerfBackend {
    _private: (),
}

#[cfg(not(all(target_os = "linux", feature = "perf")))]
impl PerfBackend {
    /// An empty backend.
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(not(all(target_os = "linux", feature = "perf")))]
impl CounterBackend for PerfBackend {
    fn name(&self) -> &'static str {
        "unsupported"
    }

    fn open(&mut self, event: &EventDescriptor) -> Result<(), CounterError> {
        Err(CounterError::CounterUnavailable {
            name: event.name().to_string(),
            reason: crate::error::UnavailableReason::UnsupportedPlatform,
        })
    }

    fn enable(&mut self) -> std::io::Result<()> {
        Err(unsupported())
    }

    fn disable(&mut self) -> std::io::Result<()> {
        Err(unsupported())
    }

    fn reset(&mut self) -> std::io::Result<()> {
        Err(unsupported())
    }

    fn read(&mut self) -> std::io::Result<Vec<RawCount>> {
        Err(unsupported())
    }
}

#[cfg(not(all(target_os = "linux", feature = "perf")))]
fn unsupported() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Unsupported, "perf_event is not available")
}
