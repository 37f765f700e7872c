//! sdd-core library.
//!
//! Work items, their dependency graph, the lifecycle and branch state
//! machines, the quality gate, and the on-disk store.
//!
//! # Conventions
//!
//! - **Errors**: Library functions return [`error::Result`] with an
//!   [`error::SddError`]. Every variant maps to a stable [`error::ErrorCode`].
//! - **Logging**: Use `tracing` macros (`info!` for persisted transitions,
//!   `debug!` for graph and gate internals, `warn!` for contention and
//!   timeouts).
//! - **Mutation**: `status`, `sessions`, branch state, and dependency sets
//!   change only through [`lifecycle`] and [`graph::deps`].

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod gate;
pub mod graph;
pub mod lifecycle;
pub mod lock;
pub mod model;
pub mod store;

pub use error::{ErrorCode, Result, SddError};
pub use store::{StoreFile, WorkItemStore};
