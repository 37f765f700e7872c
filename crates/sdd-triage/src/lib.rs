#![forbid(unsafe_code)]
//! sdd-triage library.
//!
//! Scheduling analytics over the work-item graph and the session
//! orchestrator that ties the store, gate, and state machines together.
//!
//! # Conventions
//!
//! - **Errors**: Return [`sdd_core::Result`]; analytics on a loaded snapshot
//!   are infallible.
//! - **Logging**: Use `tracing` macros (`debug!` for analytics, `info!` and
//!   `warn!` from the orchestrator).
//! - **Freshness**: Nothing is cached. Every query rebuilds from the current
//!   snapshot.

pub mod graph;
pub mod metrics;
pub mod query;
pub mod schedule;
pub mod session;

pub use query::{GraphQueryResult, GraphView};
pub use schedule::{ItemFilter, RankedItem};
pub use session::{EndOutcome, ItemPatch, NewItem, SessionOrchestrator};
