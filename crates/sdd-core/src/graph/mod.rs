//! Structural dependency-graph operations.
//!
//! ## Submodules
//!
//! - [`deps`] — Read-only [`deps::DependencyGraph`] view (readiness,
//!   topological order, neighborhood) and the validated dependency mutations.
//! - [`cycles`] — DFS cycle detection run before any edge is added.

pub mod cycles;
pub mod deps;
