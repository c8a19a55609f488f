//! System-level checks for hardware counter access.
//!
//! Platform-specific checks that predict whether `perf_event_open` will
//! succeed and whether the counts will be trustworthy.

use serde::{Deserialize, Serialize};

const PARANOID_PATH: &str = "/proc/sys/kernel/perf_event_paranoid";

/// Highest `perf_event_paranoid` level that still lets an unprivileged
/// process count its own user-space events.
pub const MAX_UNPRIVILEGED_PARANOID: i32 = 2;

/// Warning from access checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessWarning {
    /// `kernel.perf_event_paranoid` forbids counting for this process.
    ParanoidTooStrict {
        /// Current sysctl value.
        level: i32,
        /// Highest value that would work without privileges.
        required: i32,
    },

    /// Could not read `kernel.perf_event_paranoid`.
    ParanoidUnreadable {
        /// Error message.
        reason: String,
    },

    /// Running in a virtual machine.
    VirtualMachineDetected,

    /// No perf_event support on this platform.
    UnsupportedPlatform,
}

impl AccessWarning {
    /// Whether counters will almost certainly fail to open.
    pub fn is_critical(&self) -> bool {
        matches!(
            self,
            AccessWarning::ParanoidTooStrict { .. } | AccessWarning::UnsupportedPlatform
        )
    }

    /// Get a human-readable description of the warning.
    pub fn description(&self) -> String {
        match self {
            AccessWarning::ParanoidTooStrict { level, required } => {
                format!(
                    "kernel.perf_event_paranoid is {}, need {} or lower for unprivileged counting. \
                     Set with: sudo sysctl -w kernel.perf_event_paranoid={} (or run with CAP_PERFMON)",
                    level, required, required
                )
            }
            AccessWarning::ParanoidUnreadable { reason } => {
                format!(
                    "Could not read kernel.perf_event_paranoid: {}. \
                     Hardware counters may be unavailable.",
                    reason
                )
            }
            AccessWarning::VirtualMachineDetected => {
                "Running in a virtual machine. The PMU is often not exposed to guests, \
                 so hardware events may be unavailable or heavily multiplexed."
                    .to_string()
            }
            AccessWarning::UnsupportedPlatform => {
                "Hardware counters are only supported on Linux with the `perf` feature.".to_string()
            }
        }
    }
}

/// Perform all access checks.
///
/// Returns a vector of warnings for any issues detected.
pub fn access_check() -> Vec<AccessWarning> {
    #[allow(unused_mut)]
    let mut warnings = Vec::new();

    #[cfg(all(target_os = "linux", feature = "perf"))]
    {
        if let Some(warning) = check_paranoid_linux() {
            warnings.push(warning);
        }
        if let Some(warning) = check_vm_detection_linux() {
            warnings.push(warning);
        }
    }

    #[cfg(not(all(target_os = "linux", feature = "perf")))]
    warnings.push(AccessWarning::UnsupportedPlatform);

    warnings
}

/// Current `kernel.perf_event_paranoid` value, if readable.
pub fn perf_event_paranoid() -> Option<i32> {
    read_paranoid().ok()
}

fn read_paranoid() -> std::io::Result<i32> {
    let raw = std::fs::read_to_string(PARANOID_PATH)?;
    raw.trim()
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}

#[cfg(all(target_os = "linux", feature = "perf"))]
fn check_paranoid_linux() -> Option<AccessWarning> {
    // SAFETY: geteuid has no preconditions and cannot fail
    if unsafe { libc::geteuid() } == 0 {
        return None;
    }

    match read_paranoid() {
        Ok(level) => paranoid_warning(level),
        Err(e) => Some(AccessWarning::ParanoidUnreadable {
            reason: e.to_string(),
        }),
    }
}

#[cfg_attr(not(all(target_os = "linux", feature = "perf")), allow(dead_code))]
fn paranoid_warning(level: i32) -> Option<AccessWarning> {
    (level > MAX_UNPRIVILEGED_PARANOID).then_some(AccessWarning::ParanoidTooStrict {
        level,
        required: MAX_UNPRIVILEGED_PARANOID,
    })
}

#[cfg(all(target_os = "linux", feature = "perf"))]
fn check_vm_detection_linux() -> Option<AccessWarning> {
    let cpuinfo = std::fs::read_to_string("/proc/cpuinfo").ok()?;
    if cpuinfo.to_lowercase().contains("hypervisor") {
        return Some(AccessWarning::VirtualMachineDetected);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_check_runs() {
        // Just verify it doesn't panic
        let _warnings = access_check();
    }

    #[test]
    fn test_paranoid_threshold() {
        assert_eq!(paranoid_warning(-1), None);
        assert_eq!(paranoid_warning(2), None);
        assert_eq!(
            paranoid_warning(4),
            Some(AccessWarning::ParanoidTooStrict { level: 4, required: 2 })
        );
    }

    #[test]
    fn test_warning_descriptions() {
        let desc = AccessWarning::ParanoidTooStrict { level: 3, required: 2 }.description();
        assert!(desc.contains("is 3"));
        assert!(desc.contains("perf_event_paranoid=2"));

        let desc = AccessWarning::VirtualMachineDetected.description();
        assert!(desc.contains("virtual machine"));
    }

    #[test]
    fn test_criticality() {
        assert!(AccessWarning::ParanoidTooStrict { level: 4, required: 2 }.is_critical());
        assert!(AccessWarning::UnsupportedPlatform.is_critical());
        assert!(!AccessWarning::VirtualMachineDetected.is_critical());
        assert!(!AccessWarning::ParanoidUnreadable { reason: "nope".into() }.is_critical());
    }
}
