//! Graph metrics over incomplete items.

pub mod bottleneck;
