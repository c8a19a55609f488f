//! Error types for counter groups.
//!
//! Every failure of the facility is one of three kinds: an operation attempted
//! in the wrong state, a name collision inside a group, or a counter the
//! platform cannot provide. None of them is retried.

use std::fmt;
use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle state of a [`CounterGroup`](crate::CounterGroup).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupState {
    /// Events added, never enabled.
    Configured,
    /// Between `enable` and `disable`.
    Active,
    /// Stopped; a snapshot can be read.
    Disabled,
}

impl fmt::Display for GroupState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupState::Configured => write!(f, "configured"),
            GroupState::Active => write!(f, "active"),
            GroupState::Disabled => write!(f, "disabled"),
        }
    }
}

/// Error returned by counter group operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CounterError {
    /// The operation is not legal in the group's current state.
    #[error("cannot {operation} while the group is {state}")]
    InvalidState {
        /// Operation that was attempted.
        operation: &'static str,
        /// State the group was in.
        state: GroupState,
    },

    /// An event with this name already exists in the group (or the name is reserved).
    #[error("an event named '{0}' already exists in this group")]
    DuplicateName(String),

    /// The platform cannot provide this counter.
    #[error("counter '{name}' is unavailable: {reason}")]
    CounterUnavailable {
        /// Name of the event that could not be opened or driven.
        name: String,
        /// Why the platform refused.
        reason: UnavailableReason,
    },
}

impl CounterError {
    pub(crate) fn invalid_state(operation: &'static str, state: GroupState) -> Self {
        CounterError::InvalidState { operation, state }
    }

    pub(crate) fn unavailable(name: impl Into<String>, reason: UnavailableReason) -> Self {
        CounterError::CounterUnavailable {
            name: name.into(),
            reason,
        }
    }

    /// Wrap a kernel error for the named event.
    pub fn from_io(name: impl Into<String>, err: &io::Error) -> Self {
        Self::unavailable(name, UnavailableReason::from_io(err))
    }

    /// Returns `true` if this is a `CounterUnavailable` error.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, CounterError::CounterUnavailable { .. })
    }
}

/// Why a counter could not be provided.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum UnavailableReason {
    /// The process lacks permission to use hardware counters.
    #[error("permission denied{} - run as root, grant CAP_PERFMON, or lower kernel.perf_event_paranoid", paranoid_suffix(.paranoid))]
    PermissionDenied {
        /// Value of `kernel.perf_event_paranoid`, if it could be read.
        paranoid: Option<i32>,
    },

    /// The CPU or kernel does not support the requested event.
    #[error("event not supported by this CPU or kernel (or the group exceeds the hardware counters)")]
    Unsupported,

    /// All hardware counter slots are in use.
    #[error("no free hardware counter slots")]
    CapacityExhausted,

    /// Hardware counters are not available on this build or platform.
    #[error("hardware counters require Linux with the `perf` feature")]
    UnsupportedPlatform,

    /// Any other kernel failure.
    #[error("{0}")]
    Os(String),
}

fn paranoid_suffix(paranoid: &Option<i32>) -> String {
    match paranoid {
        Some(level) => format!(" (perf_event_paranoid = {})", level),
        None => String::new(),
    }
}

impl UnavailableReason {
    /// Classify a kernel error from `perf_event_open` or a counter ioctl.
    pub fn from_io(err: &io::Error) -> Self {
        #[cfg(unix)]
        if let Some(errno) = err.raw_os_error() {
            match errno {
                libc::EACCES | libc::EPERM => {
                    return UnavailableReason::PermissionDenied {
                        paranoid: crate::preflight::perf_event_paranoid(),
                    }
                }
                libc::ENOENT | libc::EOPNOTSUPP | libc::EINVAL => {
                    return UnavailableReason::Unsupported
                }
                libc::ENOSPC | libc::EBUSY | libc::EMFILE => {
                    return UnavailableReason::CapacityExhausted
                }
                _ => {}
            }
        }

        match err.kind() {
            io::ErrorKind::PermissionDenied => UnavailableReason::PermissionDenied {
                paranoid: crate::preflight::perf_event_paranoid(),
            },
            io::ErrorKind::NotFound | io::ErrorKind::Unsupported => UnavailableReason::Unsupported,
            _ => UnavailableReason::Os(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[cfg(unix)]
    fn test_errno_classification() {
        let denied = io::Error::from_raw_os_error(libc::EACCES);
        assert!(matches!(
            UnavailableReason::from_io(&denied),
            UnavailableReason::PermissionDenied { .. }
        ));

        let missing = io::Error::from_raw_os_error(libc::ENOENT);
        assert_eq!(UnavailableReason::from_io(&missing), UnavailableReason::Unsupported);

        let busy = io::Error::from_raw_os_error(libc::EBUSY);
        assert_eq!(UnavailableReason::from_io(&busy), UnavailableReason::CapacityExhausted);
    }

    #[test]
    fn test_other_errors_keep_message() {
        let err = io::Error::new(io::ErrorKind::Other, "device on fire");
        assert_eq!(
            UnavailableReason::from_io(&err),
            UnavailableReason::Os("device on fire".to_string())
        );
    }

    #[test]
    fn test_display_mentions_paranoid_level() {
        let reason = UnavailableReason::PermissionDenied { paranoid: Some(3) };
        let msg = CounterError::unavailable("cycles", reason).to_string();
        assert!(msg.contains("'cycles'"), "{}", msg);
        assert!(msg.contains("perf_event_paranoid = 3"), "{}", msg);
    }

    #[test]
    fn test_invalid_state_display() {
        let err = CounterError::invalid_state("add an event", GroupState::Active);
        assert_eq!(err.to_string(), "cannot add an event while the group is active");
    }
}
