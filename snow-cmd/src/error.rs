use snow_data::{MetricError, TrendError};
use snow_source::SourceError;
use thiserror::Error;

/// Failure of one step of a per-source or per-entity run.
#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error(transparent)]
    Metric(#[from] MetricError),

    #[error(transparent)]
    Trend(#[from] TrendError),

    #[error("{0}")]
    InvalidConfig(String),
}

impl StepError {
    pub fn kind(&self) -> &'static str {
        match self {
            StepError::Source(e) => e.kind(),
            StepError::Metric(e) => e.kind(),
            StepError::Trend(e) => e.kind(),
            StepError::InvalidConfig(_) => "InvalidConfig",
        }
    }
}
