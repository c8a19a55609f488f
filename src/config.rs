//! Configuration for measured runs.

use std::env;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::CounterError;
use crate::event::{EventKind, EventSpec, ParseEventError};
use crate::group::CounterGroup;
use crate::measurement::{CounterBackend, PerfBackend};
use crate::snapshot::{CYCLES, INSTRUCTIONS};

/// Comma-separated `[name=]event` list, e.g. `cycles,ins=instructions,dTLB_misses=rff45`.
pub const ENV_EVENTS: &str = "PERF_BRACKET_EVENTS";

/// Whether to zero counters on enable (`0`, `1`, `true`, `false`).
pub const ENV_RESET: &str = "PERF_BRACKET_RESET";

/// Report format, `terminal` or `json`.
pub const ENV_REPORT: &str = "PERF_BRACKET_REPORT";

/// How results are printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportFormat {
    /// Human-readable, colored lines.
    #[default]
    Terminal,
    /// Pretty-printed JSON.
    Json,
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "terminal" | "text" => Ok(ReportFormat::Terminal),
            "json" => Ok(ReportFormat::Json),
            other => Err(format!("unknown report format '{}'", other)),
        }
    }
}

/// Configuration options for building and driving a counter group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Events to count. The first one is the group leader (default: cycles, instructions).
    pub events: Vec<EventSpec>,

    /// Zero the counters on every enable (default: true).
    pub reset_on_enable: bool,

    /// Output format (default: terminal).
    pub report: ReportFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            events: vec![
                EventSpec::new(CYCLES, EventKind::CYCLES),
                EventSpec::new(INSTRUCTIONS, EventKind::INSTRUCTIONS),
            ],
            reset_on_enable: true,
            report: ReportFormat::Terminal,
        }
    }
}

impl Config {
    /// Create a new configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `PERF_BRACKET_*` environment variables.
    ///
    /// Malformed `PERF_BRACKET_RESET` or `PERF_BRACKET_REPORT` values are
    /// ignored with a warning.
    ///
    /// # Errors
    ///
    /// A malformed `PERF_BRACKET_EVENTS` list.
    pub fn from_env() -> Result<Self, ParseEventError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ParseEventError> {
        let mut config = Self::default();

        if let Some(events) = lookup(ENV_EVENTS).filter(|v| !v.trim().is_empty()) {
            config.events = EventSpec::parse_list(&events)?;
        }

        if let Some(reset) = lookup(ENV_RESET) {
            match parse_bool(&reset) {
                Some(value) => config.reset_on_enable = value,
                None => warn!(value = %reset, "ignoring invalid {}", ENV_RESET),
            }
        }

        if let Some(report) = lookup(ENV_REPORT) {
            match report.parse() {
                Ok(format) => config.report = format,
                Err(e) => warn!(error = %e, "ignoring invalid {}", ENV_REPORT),
            }
        }

        Ok(config)
    }

    /// Replace the event list.
    pub fn events(mut self, events: Vec<EventSpec>) -> Self {
        self.events = events;
        self
    }

    /// Append one event.
    pub fn event(mut self, name: impl Into<String>, kind: EventKind) -> Self {
        self.events.push(EventSpec::new(name, kind));
        self
    }

    /// Set whether enabling zeroes the counters.
    pub fn reset_on_enable(mut self, reset: bool) -> Self {
        self.reset_on_enable = reset;
        self
    }

    /// Set the report format.
    pub fn report(mut self, report: ReportFormat) -> Self {
        self.report = report;
        self
    }

    /// Build a perf_event group from the event list.
    pub fn build_group(&self) -> Result<CounterGroup<PerfBackend>, CounterError> {
        self.build_group_with(PerfBackend::new())
    }

    /// Build a group on `backend`. The first event is the leader.
    ///
    /// # Errors
    ///
    /// The first event that cannot be opened. An empty event list falls
    /// back to counting cycles.
    pub fn build_group_with<B: CounterBackend>(&self, backend: B) -> Result<CounterGroup<B>, CounterError> {
        let mut specs = self.events.iter();
        let mut group = match specs.next() {
            Some(leader) => CounterGroup::with_backend(backend, leader.kind, leader.name.clone())?,
            None => CounterGroup::with_backend(backend, EventKind::CYCLES, CYCLES)?,
        };
        for spec in specs {
            group.add_event(spec.kind, spec.name.clone())?;
        }
        Ok(group)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measurement::SyntheticBackend;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.events.len(), 2);
        assert_eq!(config.events[0].name, CYCLES);
        assert!(config.reset_on_enable);
        assert_eq!(config.report, ReportFormat::Terminal);
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::from_lookup(lookup(&[
            (ENV_EVENTS, "cycles,ins=instructions,dTLB_misses=rff45"),
            (ENV_RESET, "0"),
            (ENV_REPORT, "json"),
        ]))
        .unwrap();

        let names: Vec<&str> = config.events.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["cycles", "ins", "dTLB_misses"]);
        assert_eq!(config.events[2].kind, EventKind::Raw(0xff45));
        assert!(!config.reset_on_enable);
        assert_eq!(config.report, ReportFormat::Json);
    }

    #[test]
    fn test_bad_values_are_ignored_or_rejected() {
        let config = Config::from_lookup(lookup(&[(ENV_RESET, "maybe"), (ENV_REPORT, "xml")])).unwrap();
        assert_eq!(config, Config::default());

        assert!(Config::from_lookup(lookup(&[(ENV_EVENTS, "cycles,not-an-event")])).is_err());
    }

    #[test]
    fn test_build_group_with() {
        let config = Config::new().event("llc_misses", EventKind::Raw(0x412e));
        let group = config.build_group_with(SyntheticBackend::new()).unwrap();
        assert_eq!(group.leader().name(), CYCLES);
        assert_eq!(group.events().len(), 3);
    }

    #[test]
    fn test_build_group_duplicate_name() {
        let config = Config::new().event(CYCLES, EventKind::Raw(1));
        assert!(matches!(
            config.build_group_with(SyntheticBackend::new()),
            Err(CounterError::DuplicateName(_))
        ));
    }
}
