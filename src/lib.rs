//! # perf-bracket
//!
//! Bracket a region of code with hardware performance counters.
//!
//! This crate opens a group of CPU counters (cycles, retired instructions,
//! cache and TLB events, raw PMU codes), starts and stops them together
//! around the code you care about, and reports:
//! - Counts corrected for kernel multiplexing
//! - An explicit `Unavailable` marker for events that never got a counter
//! - Derived ratios such as IPC and miss rates
//! - Elapsed wall-clock time of the measured window
//!
//! ## ⚠️ Common Pitfall: Setup Inside the Window
//!
//! Everything inside the closure is counted. Prepare inputs first:
//!
//! ```ignore
//! // ❌ WRONG - input generation is counted too
//! measure(&mut group, || sum(&random_vec(1_000_000)));
//!
//! // ✅ CORRECT
//! let data = random_vec(1_000_000);
//! measure(&mut group, || sum(&data));
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use perf_bracket::{measure, registry};
//!
//! let group = registry::global().get_instance()?;
//! let m = measure(&mut group.lock(), || work())?;
//!
//! println!("IPC = {:?}, {} ms", m.snapshot.ipc(), m.snapshot.wall_clock_ms().unwrap_or(0));
//! ```
//!
//! Counters need Linux and either privileges or a permissive
//! `kernel.perf_event_paranoid`. When they cannot be opened every operation
//! returns [`CounterError::CounterUnavailable`] instead of failing hard; see
//! [`preflight`] for diagnosing why.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
mod config;
mod error;
mod event;
mod group;
mod measure;
mod snapshot;

// Functional modules
pub mod measurement;
pub mod output;
pub mod preflight;
pub mod query;
pub mod registry;

// Re-exports for public API
pub use config::{Config, ReportFormat, ENV_EVENTS, ENV_REPORT, ENV_RESET};
pub use error::{CounterError, GroupState, UnavailableReason};
pub use event::{
    CacheAccess, CacheEvent, CacheLevel, CacheOutcome, EventDescriptor, EventKind, EventSpec,
    HardwareEvent, ParseEventError, Provider, SoftwareEvent,
};
pub use group::CounterGroup;
pub use measure::{measure, measure_with, try_measure, try_measure_with, MeasureError, Measurement};
pub use registry::Registry;
pub use snapshot::{CounterValue, Snapshot, SnapshotEntry, CYCLES, INSTRUCTIONS, WALL_CLOCK_MS};

/// Convenience function measuring `work` with the process-wide baseline group.
///
/// Equivalent to locking [`registry::global()`] and calling [`measure`].
///
/// # Errors
///
/// `CounterUnavailable` if the baseline counters cannot be opened, or any
/// error from driving them.
pub fn measure_baseline<T, F>(work: F) -> Result<Measurement<T>, CounterError>
where
    F: FnOnce() -> T,
{
    let group = registry::global().get_instance()?;
    let mut group = group.lock();
    measure(&mut group, work)
}
