use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExportError {
    /// The job was never tracked.
    #[error("Submission of '{description}' failed: {reason}")]
    SubmissionFailed { description: String, reason: String },

    #[error("Status polling failed {attempts} time(s) in a row: {reason}")]
    PollFailed { attempts: u32, reason: String },

    #[error("Remote cancellation of job '{job_id}' failed: {reason}")]
    CancelFailed { job_id: String, reason: String },

    #[error("No tracked job '{0}'")]
    UnknownJob(String),
}

impl ExportError {
    pub fn kind(&self) -> &'static str {
        match self {
            ExportError::SubmissionFailed { .. } => "SubmissionFailed",
            ExportError::PollFailed { .. } => "PollFailed",
            ExportError::CancelFailed { .. } => "CancelFailed",
            ExportError::UnknownJob(_) => "UnknownJob",
        }
    }
}
