//! Analysis of checker outcomes.
//!
//! Classification and report compilation shared by the orchestrator and the
//! formatter checker.

pub mod aggregator;

pub use aggregator::*;
