//! Preflight checks to validate counter access before measuring.
//!
//! Opening a hardware counter fails for many mundane reasons: a strict
//! `perf_event_paranoid` setting, a VM without a virtual PMU, or a platform
//! with no perf_event support at all. Running these checks first turns a
//! later `CounterUnavailable` into an actionable message.
//!
//! # Checks Performed
//!
//! - **Paranoid level**: `kernel.perf_event_paranoid` vs. the current privileges
//! - **Virtualization**: hypervisor flag in `/proc/cpuinfo`
//! - **Platform**: whether a perf backend is compiled in

mod system;

pub use system::{access_check, perf_event_paranoid, AccessWarning, MAX_UNPRIVILEGED_PARANOID};

use serde::{Deserialize, Serialize};

/// Result of running all preflight checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreflightResult {
    /// All warnings collected.
    pub warnings: Vec<AccessWarning>,

    /// Whether any critical warnings were found.
    pub has_critical: bool,
}

impl PreflightResult {
    /// Create a new empty preflight result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a warning.
    pub fn add_warning(&mut self, warning: AccessWarning) {
        if warning.is_critical() {
            self.has_critical = true;
        }
        self.warnings.push(warning);
    }

    /// Whether any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// Run all preflight checks.
pub fn run_all_checks() -> PreflightResult {
    let mut result = PreflightResult::new();
    for warning in access_check() {
        result.add_warning(warning);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preflight_result_new() {
        let result = PreflightResult::new();
        assert!(!result.has_warnings());
        assert!(!result.has_critical);
    }

    #[test]
    fn test_add_critical_warning() {
        let mut result = PreflightResult::new();
        result.add_warning(AccessWarning::VirtualMachineDetected);
        assert!(!result.has_critical);

        result.add_warning(AccessWarning::ParanoidTooStrict { level: 4, required: 2 });
        assert!(result.has_critical);
        assert_eq!(result.warnings.len(), 2);
    }
}
