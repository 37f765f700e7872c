//! Petgraph view of incomplete items and path analysis over it.

pub mod build;
pub mod critical_path;

pub use build::TriageGraph;
pub use critical_path::{CriticalPathResult, ItemTiming, compute_critical_path};
