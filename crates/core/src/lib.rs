//! Core transformations for saved job-queue snapshots.
//!
//! A snapshot is one JSON document holding queues of pending/running/failed
//! jobs, each embedding a computation graph (nodes keyed by id) plus an
//! optional editor-facing UI mirror of the same graph. Two independent
//! pipelines share one traversal layer:
//!
//! - [`reframe`] rewrites a frame-count parameter and the filename prefixes
//!   that encode it, consistently across both node representations;
//! - [`reseed`] reassigns sampler seed values, either randomly or along a
//!   deterministic increment sequence.
//!
//! Everything here operates on an in-memory [`serde_json::Value`] tree and
//! performs no I/O; file loading, argument handling, and output live in the
//! CLI crate.

pub mod error;
pub mod queue;
pub mod reframe;
pub mod reseed;
