//! In-memory caches scoped to a single run.
//!
//! Provides [`single_flight::SingleFlight`], a write-once cell that runs its initializer at
//! most once even under concurrent access, and [`LayerContentCache`], the
//! per-layer holder of the canonical package bytes built on top of it.

pub mod single_flight;

pub use single_flight::LayerContentCache;
