//! Counter providers and the serialization point.
//!
//! This module provides:
//! - [`CounterBackend`], the interface a counter group drives
//! - [`PerfBackend`], Linux `perf_event_open` counters
//! - [`SyntheticBackend`], scripted counters for tests and dry runs
//! - [`serialize`], the instruction-stream serialization point used around
//!   every measured window
//!
//! # Backend Selection
//!
//! [`CounterGroup::new`](crate::CounterGroup::new) always uses [`PerfBackend`].
//! On Linux with the `perf` feature (enabled by default) it opens real
//! counters; elsewhere every event reports `UnsupportedPlatform`:
//!
//! ```toml
//! [dependencies]
//! perf-bracket = { version = "0.1", default-features = false }
//! ```
//!
//! Use [`CounterGroup::with_backend`](crate::CounterGroup::with_backend) to
//! supply a different backend.

mod backend;
mod barrier;
pub mod perf;
pub mod synthetic;

pub use backend::{CounterBackend, RawCount};
pub use barrier::serialize;
pub use perf::PerfBackend;
pub use synthetic::{CallCounts, SyntheticBackend};
