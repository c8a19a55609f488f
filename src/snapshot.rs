//! Point-in-time counter values keyed by event name.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Name of the cycles event in the default event set.
pub const CYCLES: &str = "cycles";

/// Name of the retired-instructions event in the default event set.
pub const INSTRUCTIONS: &str = "instructions";

/// Reserved snapshot entry holding elapsed wall-clock milliseconds.
///
/// Added by [`measure`](crate::measure()); no event may use this name.
pub const WALL_CLOCK_MS: &str = "wall_clock_ms";

/// A corrected counter value, or a marker that no value could be produced.
///
/// `Unavailable` means the event was never scheduled on a hardware counter
/// during the window. It is not the same as a count of zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CounterValue {
    /// Count scaled for multiplexing.
    Count(u64),
    /// No meaningful value.
    Unavailable,
}

impl CounterValue {
    /// The count, if available.
    pub fn count(self) -> Option<u64> {
        match self {
            CounterValue::Count(v) => Some(v),
            CounterValue::Unavailable => None,
        }
    }

    /// Whether this is a real count.
    pub fn is_available(self) -> bool {
        matches!(self, CounterValue::Count(_))
    }
}

impl From<Option<u64>> for CounterValue {
    fn from(value: Option<u64>) -> Self {
        value.map_or(CounterValue::Unavailable, CounterValue::Count)
    }
}

impl fmt::Display for CounterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CounterValue::Count(v) => write!(f, "{}", v),
            CounterValue::Unavailable => write!(f, "<not counted>"),
        }
    }
}

/// One named value of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// Event name.
    pub name: String,
    /// Corrected value.
    pub value: CounterValue,
}

/// Counter values of one group, in the order the events were added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    entries: Vec<SnapshotEntry>,
}

impl Snapshot {
    /// Build a snapshot from `(name, value)` pairs.
    ///
    /// A later pair with an existing name replaces the earlier value.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, CounterValue)>,
        S: Into<String>,
    {
        let mut snapshot = Snapshot::default();
        for (name, value) in entries {
            snapshot.insert(name, value);
        }
        snapshot
    }

    pub(crate) fn insert(&mut self, name: impl Into<String>, value: CounterValue) {
        let name = name.into();
        match self.entries.iter_mut().find(|e| e.name == name) {
            Some(entry) => entry.value = value,
            None => self.entries.push(SnapshotEntry { name, value }),
        }
    }

    /// Value of the named event; `None` if the snapshot has no such entry.
    pub fn get(&self, name: &str) -> Option<CounterValue> {
        self.entries.iter().find(|e| e.name == name).map(|e| e.value)
    }

    /// Count of the named event, if present and available.
    pub fn count(&self, name: &str) -> Option<u64> {
        self.get(name).and_then(CounterValue::count)
    }

    /// Elapsed wall-clock milliseconds, for snapshots taken by `measure`.
    pub fn wall_clock_ms(&self) -> Option<u64> {
        self.count(WALL_CLOCK_MS)
    }

    /// `numerator / denominator`.
    ///
    /// `None` when either side is missing or unavailable, or the denominator
    /// is zero: an unknown denominator never turns into zero or infinity.
    pub fn ratio(&self, numerator: &str, denominator: &str) -> Option<f64> {
        let num = self.count(numerator)?;
        let den = self.count(denominator)?;
        if den == 0 {
            return None;
        }
        Some(num as f64 / den as f64)
    }

    /// Instructions per cycle from the `instructions` and `cycles` entries.
    pub fn ipc(&self) -> Option<f64> {
        self.ratio(INSTRUCTIONS, CYCLES)
    }

    /// `misses / accesses` for any pair of entries, e.g. cache or TLB events.
    pub fn miss_rate(&self, misses: &str, accesses: &str) -> Option<f64> {
        self.ratio(misses, accesses)
    }

    /// Entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, CounterValue)> {
        self.entries.iter().map(|e| (e.name.as_str(), e.value))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the snapshot has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether every entry is `Unavailable`.
    pub fn all_unavailable(&self) -> bool {
        self.entries.iter().all(|e| !e.value.is_available())
    }
}

impl<'a> IntoIterator for &'a Snapshot {
    type Item = &'a SnapshotEntry;
    type IntoIter = std::slice::Iter<'a, SnapshotEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
