//! Hardware performance-monitoring event descriptions.
//!
//! An event is identified by its provider (fixed hardware counter, raw PMU
//! counter, cache sub-event, or kernel software counter) and a code within that
//! provider. Codes use the Linux `perf_event_open` ABI numbering so they can be
//! passed straight from `perf list` output or a vendor manual.
//!
//! Events also parse from the names the `perf` tool uses:
//!
//! ```
//! use perf_bracket::{EventKind, HardwareEvent};
//!
//! let kind: EventKind = "instructions".parse().unwrap();
//! assert_eq!(kind, EventKind::Hardware(HardwareEvent::Instructions));
//!
//! let raw: EventKind = "rff45".parse().unwrap();
//! assert_eq!(raw, EventKind::Raw(0xff45));
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which kernel provider an event belongs to (`perf_event_attr.type`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Generalized hardware event (`PERF_TYPE_HARDWARE`).
    Hardware,
    /// Kernel software counter (`PERF_TYPE_SOFTWARE`).
    Software,
    /// Generalized cache event (`PERF_TYPE_HW_CACHE`).
    HardwareCache,
    /// CPU-specific raw event (`PERF_TYPE_RAW`).
    Raw,
}

impl Provider {
    /// The `perf_event_attr.type` value.
    pub fn type_id(self) -> u32 {
        match self {
            Provider::Hardware => 0,
            Provider::Software => 1,
            Provider::HardwareCache => 3,
            Provider::Raw => 4,
        }
    }
}

macro_rules! coded_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $code:literal, $label:literal; )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* $variant, )+
        }

        impl $name {
            /// Every variant, in code order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// ABI code of this variant.
            pub fn code(self) -> u64 {
                match self {
                    $($name::$variant => $code,)+
                }
            }

            /// Variant with the given ABI code.
            pub fn from_code(code: u64) -> Option<Self> {
                match code {
                    $($code => Some($name::$variant),)+
                    _ => None,
                }
            }

            /// Name as printed by the `perf` tool.
            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label,)+
                }
            }
        }
    };
}

coded_enum! {
    /// Generalized hardware events (`PERF_COUNT_HW_*`).
    pub enum HardwareEvent {
        /// Core cycles. Affected by frequency scaling.
        CpuCycles = 0, "cycles";
        /// Retired instructions.
        Instructions = 1, "instructions";
        /// Last-level cache accesses.
        CacheReferences = 2, "cache-references";
        /// Last-level cache misses.
        CacheMisses = 3, "cache-misses";
        /// Retired branch instructions.
        BranchInstructions = 4, "branches";
        /// Mispredicted branches.
        BranchMisses = 5, "branch-misses";
        /// Bus cycles.
        BusCycles = 6, "bus-cycles";
        /// Cycles stalled in the front end.
        StalledCyclesFrontend = 7, "stalled-cycles-frontend";
        /// Cycles stalled in the back end.
        StalledCyclesBackend = 8, "stalled-cycles-backend";
        /// Reference cycles, not affected by frequency scaling.
        RefCpuCycles = 9, "ref-cycles";
    }
}

coded_enum! {
    /// Kernel software counters (`PERF_COUNT_SW_*`).
    pub enum SoftwareEvent {
        /// Per-CPU high-resolution timer, in nanoseconds.
        CpuClock = 0, "cpu-clock";
        /// Per-task clock, in nanoseconds.
        TaskClock = 1, "task-clock";
        /// Page faults.
        PageFaults = 2, "page-faults";
        /// Context switches.
        ContextSwitches = 3, "context-switches";
        /// Migrations to another CPU.
        CpuMigrations = 4, "cpu-migrations";
        /// Minor page faults.
        MinorFaults = 5, "minor-faults";
        /// Major page faults.
        MajorFaults = 6, "major-faults";
    }
}

coded_enum! {
    /// Cache targeted by a cache sub-event (`PERF_COUNT_HW_CACHE_*`).
    pub enum CacheLevel {
        /// Level 1 data cache.
        L1D = 0, "L1-dcache";
        /// Level 1 instruction cache.
        L1I = 1, "L1-icache";
        /// Last-level cache.
        LL = 2, "LLC";
        /// Data TLB.
        DTLB = 3, "dTLB";
        /// Instruction TLB.
        ITLB = 4, "iTLB";
        /// Branch prediction unit.
        BPU = 5, "branch";
        /// Local memory accesses.
        Node = 6, "node";
    }
}

coded_enum! {
    /// Kind of cache access (`PERF_COUNT_HW_CACHE_OP_*`).
    pub enum CacheAccess {
        /// Reads.
        Read = 0, "load";
        /// Writes.
        Write = 1, "store";
        /// Prefetches.
        Prefetch = 2, "prefetch";
    }
}

coded_enum! {
    /// Whether accesses or misses are counted (`PERF_COUNT_HW_CACHE_RESULT_*`).
    pub enum CacheOutcome {
        /// All accesses.
        Access = 0, "accesses";
        /// Misses only.
        Miss = 1, "misses";
    }
}

/// A generalized cache event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheEvent {
    /// Which cache.
    pub level: CacheLevel,
    /// Which kind of access.
    pub access: CacheAccess,
    /// Accesses or misses.
    pub outcome: CacheOutcome,
}

impl CacheEvent {
    /// Combine the three parts of a cache event.
    pub fn new(level: CacheLevel, access: CacheAccess, outcome: CacheOutcome) -> Self {
        Self {
            level,
            access,
            outcome,
        }
    }

    /// `PERF_TYPE_HW_CACHE` config: `id | op << 8 | result << 16`.
    pub fn code(self) -> u64 {
        self.level.code() | (self.access.code() << 8) | (self.outcome.code() << 16)
    }

    /// Decode a `PERF_TYPE_HW_CACHE` config value.
    pub fn from_code(code: u64) -> Option<Self> {
        if code >> 24 != 0 {
            return None;
        }
        Some(Self {
            level: CacheLevel::from_code(code & 0xff)?,
            access: CacheAccess::from_code((code >> 8) & 0xff)?,
            outcome: CacheOutcome::from_code((code >> 16) & 0xff)?,
        })
    }
}

impl fmt::Display for CacheEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // perf names: L1-dcache-loads, L1-dcache-load-misses, dTLB-stores, ...
        let access = match (self.access, self.outcome) {
            (CacheAccess::Read, CacheOutcome::Access) => "loads",
            (CacheAccess::Write, CacheOutcome::Access) => "stores",
            (CacheAccess::Prefetch, CacheOutcome::Access) => "prefetches",
            (access, CacheOutcome::Miss) => return write!(f, "{}-{}-misses", self.level.label(), access.label()),
        };
        write!(f, "{}-{}", self.level.label(), access)
    }
}

/// A fully-specified event: provider plus code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "provider", content = "event")]
pub enum EventKind {
    /// Generalized hardware event.
    Hardware(HardwareEvent),
    /// Kernel software counter.
    Software(SoftwareEvent),
    /// Generalized cache event.
    Cache(CacheEvent),
    /// CPU-specific raw event code.
    Raw(u64),
}

impl EventKind {
    /// Retired-instructions shorthand.
    pub const INSTRUCTIONS: EventKind = EventKind::Hardware(HardwareEvent::Instructions);
    /// Core-cycles shorthand.
    pub const CYCLES: EventKind = EventKind::Hardware(HardwareEvent::CpuCycles);

    /// Build a kind from a provider and its numeric code.
    ///
    /// Returns `None` if the code is not a known symbolic event for that
    /// provider. Raw codes are always accepted; whether the CPU understands
    /// them is only known when the counter is opened.
    pub fn from_code(provider: Provider, code: u64) -> Option<Self> {
        match provider {
            Provider::Hardware => HardwareEvent::from_code(code).map(EventKind::Hardware),
            Provider::Software => SoftwareEvent::from_code(code).map(EventKind::Software),
            Provider::HardwareCache => CacheEvent::from_code(code).map(EventKind::Cache),
            Provider::Raw => Some(EventKind::Raw(code)),
        }
    }

    /// Provider of this event.
    pub fn provider(&self) -> Provider {
        match self {
            EventKind::Hardware(_) => Provider::Hardware,
            EventKind::Software(_) => Provider::Software,
            EventKind::Cache(_) => Provider::HardwareCache,
            EventKind::Raw(_) => Provider::Raw,
        }
    }

    /// `perf_event_attr.config` value.
    pub fn code(&self) -> u64 {
        match *self {
            EventKind::Hardware(hw) => hw.code(),
            EventKind::Software(sw) => sw.code(),
            EventKind::Cache(cache) => cache.code(),
            EventKind::Raw(code) => code,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Hardware(hw) => f.write_str(hw.label()),
            EventKind::Software(sw) => f.write_str(sw.label()),
            EventKind::Cache(cache) => write!(f, "{}", cache),
            EventKind::Raw(code) => write!(f, "r{:x}", code),
        }
    }
}

/// Error parsing an event name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseEventError {
    /// Empty input.
    #[error("empty event name")]
    Empty,
    /// Not a known symbolic event.
    #[error("unknown event '{0}'")]
    Unknown(String),
    /// `r` prefix followed by something that is not hex.
    #[error("invalid raw event code '{0}' (expected r<hex>)")]
    InvalidRaw(String),
    /// `name=event` with an empty name.
    #[error("missing event name before '=' in '{0}'")]
    MissingName(String),
}

impl FromStr for EventKind {
    type Err = ParseEventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseEventError::Empty);
        }

        if let Some(hex) = s.strip_prefix('r') {
            if !hex.is_empty() && hex.chars().all(|c| c.is_ascii_hexdigit()) {
                return u64::from_str_radix(hex, 16)
                    .map(EventKind::Raw)
                    .map_err(|_| ParseEventError::InvalidRaw(s.to_string()));
            }
        }
        if let Some(hex) = s.strip_prefix("0x") {
            return u64::from_str_radix(hex, 16)
                .map(EventKind::Raw)
                .map_err(|_| ParseEventError::InvalidRaw(s.to_string()));
        }

        match s {
            "cpu-cycles" => return Ok(EventKind::CYCLES),
            "branch-instructions" => {
                return Ok(EventKind::Hardware(HardwareEvent::BranchInstructions))
            }
            "faults" => return Ok(EventKind::Software(SoftwareEvent::PageFaults)),
            "cs" => return Ok(EventKind::Software(SoftwareEvent::ContextSwitches)),
            "migrations" => return Ok(EventKind::Software(SoftwareEvent::CpuMigrations)),
            _ => {}
        }

        if let Some(hw) = HardwareEvent::ALL.iter().find(|hw| hw.label() == s) {
            return Ok(EventKind::Hardware(*hw));
        }
        if let Some(sw) = SoftwareEvent::ALL.iter().find(|sw| sw.label() == s) {
            return Ok(EventKind::Software(*sw));
        }

        parse_cache_event(s)
            .map(EventKind::Cache)
            .ok_or_else(|| ParseEventError::Unknown(s.to_string()))
    }
}

fn parse_cache_event(s: &str) -> Option<CacheEvent> {
    let level = CacheLevel::ALL
        .iter()
        .copied()
        .find(|level| s.starts_with(level.label()) && s[level.label().len()..].starts_with('-'))?;
    let rest = &s[level.label().len() + 1..];

    let (access, outcome) = match rest {
        "loads" => (CacheAccess::Read, CacheOutcome::Access),
        "stores" => (CacheAccess::Write, CacheOutcome::Access),
        "prefetches" => (CacheAccess::Prefetch, CacheOutcome::Access),
        _ => {
            let access = rest.strip_suffix("-misses")?;
            let access = CacheAccess::ALL.iter().copied().find(|a| a.label() == access)?;
            (access, CacheOutcome::Miss)
        }
    };
    Some(CacheEvent::new(level, access, outcome))
}

/// One event of a counter group: a unique name and what it counts.
///
/// Descriptors are immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventDescriptor {
    name: String,
    kind: EventKind,
}

impl EventDescriptor {
    /// Describe an event under the given name.
    pub fn new(kind: EventKind, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Name the event is reported under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// What the event counts.
    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// Provider of the event.
    pub fn provider(&self) -> Provider {
        self.kind.provider()
    }

    /// Numeric event code within its provider.
    pub fn code(&self) -> u64 {
        self.kind.code()
    }
}

/// An event request as written in configuration: `[name=]event`.
///
/// Without an explicit name the event is reported under its perf name, so
/// `"instructions"` and `"instructions=instructions"` are equivalent, while
/// `"dTLB_misses=rff45"` names a raw event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSpec {
    /// Reported name.
    pub name: String,
    /// Event to open.
    pub kind: EventKind,
}

impl EventSpec {
    /// Pair a name with an event.
    pub fn new(name: impl Into<String>, kind: EventKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Convert into a descriptor.
    pub fn descriptor(&self) -> EventDescriptor {
        EventDescriptor::new(self.kind, self.name.clone())
    }

    /// Parse a comma-separated list of specs, skipping empty items.
    pub fn parse_list(list: &str) -> Result<Vec<EventSpec>, ParseEventError> {
        list.split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl FromStr for EventSpec {
    type Err = ParseEventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.split_once('=') {
            Some((name, event)) => {
                let name = name.trim();
                if name.is_empty() {
                    return Err(ParseEventError::MissingName(s.to_string()));
                }
                Ok(EventSpec::new(name, event.parse()?))
            }
            None => {
                let kind: EventKind = s.parse()?;
                Ok(EventSpec::new(s, kind))
            }
        }
    }
}

impl fmt::Display for EventSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let event = self.kind.to_string();
        if event == self.name {
            f.write_str(&event)
        } else {
            write!(f, "{}={}", self.name, event)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hardware_codes_match_abi() {
        assert_eq!(HardwareEvent::CpuCycles.code(), 0);
        assert_eq!(HardwareEvent::Instructions.code(), 1);
        assert_eq!(HardwareEvent::RefCpuCycles.code(), 9);
        assert_eq!(Provider::Raw.type_id(), 4);
    }

    #[test]
    fn test_cache_code_encoding() {
        let dtlb = CacheEvent::new(CacheLevel::DTLB, CacheAccess::Read, CacheOutcome::Miss);
        assert_eq!(dtlb.code(), 3 | (1 << 16));
        assert_eq!(CacheEvent::from_code(dtlb.code()), Some(dtlb));
        assert_eq!(CacheEvent::from_code(0x0f), None);
        assert_eq!(CacheEvent::from_code(1 << 24), None);
    }

    #[test]
    fn test_from_code() {
        assert_eq!(EventKind::from_code(Provider::Hardware, 1), Some(EventKind::INSTRUCTIONS));
        assert_eq!(EventKind::from_code(Provider::Hardware, 42), None);
        assert_eq!(EventKind::from_code(Provider::Raw, 0xff45), Some(EventKind::Raw(0xff45)));
        assert_eq!(
            EventKind::from_code(Provider::Software, 1),
            Some(EventKind::Software(SoftwareEvent::TaskClock))
        );
    }

    #[test]
    fn test_parse_perf_names() {
        assert_eq!("cycles".parse::<EventKind>().unwrap(), EventKind::CYCLES);
        assert_eq!("cpu-cycles".parse::<EventKind>().unwrap(), EventKind::CYCLES);
        assert_eq!(
            "branch-misses".parse::<EventKind>().unwrap(),
            EventKind::Hardware(HardwareEvent::BranchMisses)
        );
        assert_eq!(
            "task-clock".parse::<EventKind>().unwrap(),
            EventKind::Software(SoftwareEvent::TaskClock)
        );
        assert_eq!(
            "dTLB-load-misses".parse::<EventKind>().unwrap(),
            EventKind::Cache(CacheEvent::new(CacheLevel::DTLB, CacheAccess::Read, CacheOutcome::Miss))
        );
        assert_eq!(
            "L1-dcache-stores".parse::<EventKind>().unwrap(),
            EventKind::Cache(CacheEvent::new(CacheLevel::L1D, CacheAccess::Write, CacheOutcome::Access))
        );
        assert_eq!("rff45".parse::<EventKind>().unwrap(), EventKind::Raw(0xff45));
        assert_eq!("0x1c2".parse::<EventKind>().unwrap(), EventKind::Raw(0x1c2));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!("".parse::<EventKind>(), Err(ParseEventError::Empty));
        assert!(matches!("warp-drive".parse::<EventKind>(), Err(ParseEventError::Unknown(_))));
        assert!(matches!("0xzz".parse::<EventKind>(), Err(ParseEventError::InvalidRaw(_))));
        assert!(matches!("dTLB-frobs".parse::<EventKind>(), Err(ParseEventError::Unknown(_))));
        // ref-cycles starts with 'r' but is symbolic
        assert_eq!(
            "ref-cycles".parse::<EventKind>().unwrap(),
            EventKind::Hardware(HardwareEvent::RefCpuCycles)
        );
    }

    #[test]
    fn test_display_parses_back() {
        let mut kinds: Vec<EventKind> = HardwareEvent::ALL.iter().map(|&hw| EventKind::Hardware(hw)).collect();
        kinds.extend(SoftwareEvent::ALL.iter().map(|&sw| EventKind::Software(sw)));
        for level in CacheLevel::ALL {
            for access in CacheAccess::ALL {
                for outcome in CacheOutcome::ALL {
                    kinds.push(EventKind::Cache(CacheEvent::new(*level, *access, *outcome)));
                }
            }
        }
        kinds.push(EventKind::Raw(0xff45));

        for kind in kinds {
            let text = kind.to_string();
            assert_eq!(text.parse::<EventKind>().as_ref(), Ok(&kind), "{}", text);
        }
    }

    #[test]
    fn test_event_spec_parsing() {
        let specs = EventSpec::parse_list("cycles, ins=instructions,,dTLB_misses=rff45").unwrap();
        assert_eq!(
            specs,
            vec![
                EventSpec::new("cycles", EventKind::CYCLES),
                EventSpec::new("ins", EventKind::INSTRUCTIONS),
                EventSpec::new("dTLB_misses", EventKind::Raw(0xff45)),
            ]
        );
        assert_eq!(specs[1].to_string(), "ins=instructions");
        assert_eq!(specs[0].to_string(), "cycles");
        assert!(matches!("=cycles".parse::<EventSpec>(), Err(ParseEventError::MissingName(_))));
    }

    #[test]
    fn test_descriptor_accessors() {
        let desc = EventDescriptor::new(EventKind::Raw(0xff45), "dTLB_misses");
        assert_eq!(desc.name(), "dTLB_misses");
        assert_eq!(desc.provider(), Provider::Raw);
        assert_eq!(desc.code(), 0xff45);
    }
}
