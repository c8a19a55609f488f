//! Bracket a closure with counter enable/disable and wall-clock timing.
//!
//! ```rust,ignore
//! use perf_bracket::{measure, registry};
//!
//! let group = registry::global().get_instance()?;
//! let m = measure(&mut group.lock(), || data.iter().sum::<u64>())?;
//! println!("sum={} in {} ms, ipc={:?}", m.output, m.snapshot.wall_clock_ms().unwrap_or(0), m.snapshot.ipc());
//! ```

use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::warn;

use crate::error::{CounterError, GroupState};
use crate::group::CounterGroup;
use crate::measurement::CounterBackend;
use crate::snapshot::{CounterValue, Snapshot, WALL_CLOCK_MS};

/// Result of a measured closure.
#[derive(Debug, Clone, PartialEq)]
pub struct Measurement<T> {
    /// Counter values, plus `wall_clock_ms`.
    pub snapshot: Snapshot,
    /// Elapsed monotonic time around enable/work/disable.
    pub elapsed: Duration,
    /// What the closure returned.
    pub output: T,
}

/// Failure of [`try_measure`].
#[derive(Debug, Error)]
pub enum MeasureError<E> {
    /// The counters could not be enabled, disabled, or read.
    #[error(transparent)]
    Counter(#[from] CounterError),

    /// The measured work failed. Disabling the group was attempted first.
    #[error("measured work failed: {0}")]
    Work(E),
}

/// Disables the group if the work unwinds.
struct DisableOnDrop<'a, B: CounterBackend> {
    group: &'a mut CounterGroup<B>,
}

impl<B: CounterBackend> Drop for DisableOnDrop<'_, B> {
    fn drop(&mut self) {
        if std::thread::panicking() && self.group.state() == GroupState::Active {
            if let Err(e) = self.group.disable() {
                warn!(error = %e, "failed to disable counters after measured work");
            }
        }
    }
}

/// Run `work` with the group's counters enabled.
///
/// Counters are reset on enable. The returned snapshot has every event of the
/// group plus `wall_clock_ms`. If `work` panics the group is still disabled,
/// so it can be reused after `catch_unwind`.
///
/// # Errors
///
/// Any error from enabling, disabling, or reading the group.
pub fn measure<B, T, F>(group: &mut CounterGroup<B>, work: F) -> Result<Measurement<T>, CounterError>
where
    B: CounterBackend,
    F: FnOnce() -> T,
{
    measure_with(group, true, work)
}

/// Like [`measure`], choosing whether enabling zeroes the counters.
///
/// With `reset == false` the snapshot accumulates over every window since
/// the last reset; `wall_clock_ms` still covers this window only.
pub fn measure_with<B, T, F>(
    group: &mut CounterGroup<B>,
    reset: bool,
    work: F,
) -> Result<Measurement<T>, CounterError>
where
    B: CounterBackend,
    F: FnOnce() -> T,
{
    match try_measure_with(group, reset, || Ok::<T, std::convert::Infallible>(work())) {
        Ok(m) => Ok(m),
        Err(MeasureError::Counter(e)) => Err(e),
        Err(MeasureError::Work(never)) => match never {},
    }
}

/// Like [`measure`], for work that can fail.
///
/// On a work error the group is disabled first, then the error is returned
/// as [`MeasureError::Work`], even if disabling failed too (that failure is
/// logged and the group stays `Active`). No snapshot is produced for failed
/// work.
pub fn try_measure<B, T, E, F>(
    group: &mut CounterGroup<B>,
    work: F,
) -> Result<Measurement<T>, MeasureError<E>>
where
    B: CounterBackend,
    F: FnOnce() -> Result<T, E>,
{
    try_measure_with(group, true, work)
}

/// [`try_measure`] with an explicit reset choice.
pub fn try_measure_with<B, T, E, F>(
    group: &mut CounterGroup<B>,
    reset: bool,
    work: F,
) -> Result<Measurement<T>, MeasureError<E>>
where
    B: CounterBackend,
    F: FnOnce() -> Result<T, E>,
{
    let start = Instant::now();
    group.enable_with(reset)?;

    let (outcome, disabled) = {
        let guard = DisableOnDrop { group: &mut *group };
        let outcome = work();
        let disabled = guard.group.disable();
        drop(guard);
        (outcome, disabled)
    };
    let elapsed = start.elapsed();

    // A failed work result wins over a failed disable.
    let output = match (outcome, disabled) {
        (Ok(output), Ok(())) => output,
        (Ok(_), Err(e)) => return Err(MeasureError::Counter(e)),
        (Err(e), Ok(())) => return Err(MeasureError::Work(e)),
        (Err(e), Err(disable_error)) => {
            warn!(error = %disable_error, "failed to disable counters after failed work");
            return Err(MeasureError::Work(e));
        }
    };

    let mut snapshot = group.read_events()?;
    snapshot.insert(WALL_CLOCK_MS, CounterValue::Count(elapsed.as_millis() as u64));

    Ok(Measurement {
        snapshot,
        elapsed,
        output,
    })
}
