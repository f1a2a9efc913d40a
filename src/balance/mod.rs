//! Layer version balancing.
//!
//! [`prober`] reads the latest version of a layer in a region, [`fetcher`]
//! downloads the canonical package once per layer, [`harmonizer`] catches a
//! single region up to a target version, and [`coordinator`] drives the
//! discovery and harmonization phases across every (layer, region) pair.

pub mod context;
pub mod coordinator;
pub mod fetcher;
pub mod harmonizer;
pub mod prober;

pub use context::RunContext;
pub use coordinator::Coordinator;
