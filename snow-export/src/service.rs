use crate::{
    job::{JobState, StatusUpdate},
    request::ExportRequest,
};
use async_trait::async_trait;
use thiserror::Error;

/// The remote service's answer to a submission.
#[derive(Debug, Clone, PartialEq)]
pub struct JobHandle {
    pub job_id: String,
    pub state: JobState,
}

/// A failed call to the export service, carrying the provider's message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ServiceError(pub String);

/// Remote export service. Implementations are black boxes: submission
/// returns an opaque handle and status is queried for a batch of handles.
#[async_trait]
pub trait ExportService: Send + Sync {
    async fn submit(&self, request: &ExportRequest) -> Result<JobHandle, ServiceError>;

    /// Status of each listed job. Jobs missing from the answer are treated
    /// as unchanged.
    async fn status(&self, job_ids: &[String]) -> Result<Vec<StatusUpdate>, ServiceError>;

    async fn cancel(&self, job_id: &str) -> Result<(), ServiceError>;
}
