//! PlanCheck - concurrent compliance checking for building plan submissions.
//!
//! The library holds the orchestration core: seven rule checkers behind an
//! object-safe [`Checker`] trait, a shared [`CheckerRegistry`], the execution
//! wrapper that tracks statistics and enriches results, and the
//! [`Orchestrator`] that fans checkers out under a bounded admission gate
//! and compiles the aggregate report.

pub mod analysis;
pub mod checkers;
pub mod cli;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod executor;
pub mod models;
pub mod orchestrator;
pub mod registry;
pub mod report;

pub use checkers::{default_checkers, Checker, CheckerDescriptor};
pub use config::Config;
pub use enrichment::EnrichmentClient;
pub use error::{CheckerError, EnrichmentError, OrchestratorError};
pub use executor::ManagedChecker;
pub use models::{AggregateReport, CheckerOutcome, OverallStatus, WorkflowSession};
pub use orchestrator::Orchestrator;
pub use registry::CheckerRegistry;
