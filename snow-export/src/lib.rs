//! Long-running raster export jobs.
//!
//! Requests are submitted to a remote export service and then driven to a
//! terminal state by polling. Job state only ever moves forward along
//! `SUBMITTED → QUEUED → RUNNING → COMPLETED | FAILED`.

pub mod error;
pub mod job;
pub mod orchestrator;
pub mod plan;
pub mod request;
pub mod service;

#[cfg(feature = "api")]
pub mod remote;

pub use error::ExportError;
pub use orchestrator::{ExportOrchestrator, MonitorOutcome, PollConfig};
