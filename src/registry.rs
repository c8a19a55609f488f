//! Lazily constructed, shared counter groups.
//!
//! A [`Registry`] builds its group the first time it is asked for it and hands
//! out the same instance afterwards. Construction runs exactly once even when
//! many threads race on the first access.
//!
//! [`global()`] is the process-wide registry with the baseline event set
//! (cycles + instructions). It is never torn down; the kernel handles are
//! released at process exit. Code that wants an explicit owner can build its
//! own `Registry` and pass it around by reference.

use std::sync::OnceLock;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::CounterError;
use crate::event::EventKind;
use crate::group::CounterGroup;
use crate::measurement::{CounterBackend, PerfBackend};
use crate::snapshot::{CYCLES, INSTRUCTIONS};

/// Constructor used by a registry on first access.
pub type GroupInit<B> = fn() -> Result<CounterGroup<B>, CounterError>;

/// A one-time-initialized counter group.
///
/// A construction failure is cached: later callers get the same error
/// without another attempt, since permissions and hardware support do not
/// change during a run.
pub struct Registry<B: CounterBackend = PerfBackend> {
    cell: OnceLock<Result<Mutex<CounterGroup<B>>, CounterError>>,
    init: GroupInit<B>,
}

impl<B: CounterBackend> Registry<B> {
    /// A registry that will build its group with `init`.
    pub const fn new(init: GroupInit<B>) -> Self {
        Self {
            cell: OnceLock::new(),
            init,
        }
    }

    /// The shared group, constructed on first call.
    ///
    /// # Errors
    ///
    /// The construction error, on this and every later call.
    pub fn get_instance(&self) -> Result<&Mutex<CounterGroup<B>>, CounterError> {
        self.cell
            .get_or_init(|| {
                let built = (self.init)();
                match &built {
                    Ok(group) => debug!(?group, "registry group constructed"),
                    Err(e) => warn!(error = %e, "registry group unavailable"),
                }
                built.map(Mutex::new)
            })
            .as_ref()
            .map_err(Clone::clone)
    }

    /// Whether construction has already been attempted.
    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<B: CounterBackend> std::fmt::Debug for Registry<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

static GLOBAL: Registry = Registry::new(baseline_group);

/// The process-wide registry.
pub fn global() -> &'static Registry {
    &GLOBAL
}

/// The baseline group: leader `cycles` plus `instructions`.
pub fn baseline_group() -> Result<CounterGroup, CounterError> {
    baseline_group_with(PerfBackend::new())
}

/// The baseline event set on an explicit backend.
pub fn baseline_group_with<B: CounterBackend>(backend: B) -> Result<CounterGroup<B>, CounterError> {
    let mut group = CounterGroup::with_backend(backend, EventKind::CYCLES, CYCLES)?;
    group.add_event(EventKind::INSTRUCTIONS, INSTRUCTIONS)?;
    Ok(group)
}
