//! Job orchestration for the vcount client.
//!
//! This crate provides:
//! - [`JobOrchestrator`]: submit, poll until terminal, fetch final results
//! - [`PollingSession`]: the owned, cancellable poll tasks of one job
//! - [`ResultReconciler`]: dedup and replace policies per job kind
//! - Read-time views with sorting, filtering and aggregates
//! - Structured job logging

pub mod config;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod poller;
pub mod reconciler;
pub mod view;

#[cfg(test)]
mod orchestrator_tests;

pub use config::OrchestratorConfig;
pub use error::{OrchestratorError, OrchestratorResult};
pub use logging::JobLogger;
pub use orchestrator::{JobOrchestrator, JobSnapshot, JobSummary};
pub use poller::PollingSession;
pub use reconciler::{PlateResults, ResultReconciler, ResultSet, VehicleResults};
pub use view::{
    detection_rate, PlateQuery, PlateSortField, PlateView, SortDirection, VehicleQuery,
    VehicleSortField, VehicleView,
};
