use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetricError {
    #[error("Malformed series for entity '{entity_id}': {reason}")]
    MalformedSeries { entity_id: String, reason: String },
}

impl MetricError {
    pub fn kind(&self) -> &'static str {
        match self {
            MetricError::MalformedSeries { .. } => "MalformedSeries",
        }
    }
}

/// Why no trend could be fitted. `InsufficientData` and `DegenerateInput`
/// are expected outcomes for sparse entities, not failures of the run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrendError {
    #[error("Only {valid_years} valid year(s) of '{metric_name}' for entity '{entity_id}'; need at least 2")]
    InsufficientData {
        entity_id: String,
        metric_name: String,
        valid_years: usize,
    },

    #[error("All x values identical for '{metric_name}' of entity '{entity_id}'")]
    DegenerateInput {
        entity_id: String,
        metric_name: String,
    },

    #[error("Malformed annual series for entity '{entity_id}': {reason}")]
    MalformedSeries { entity_id: String, reason: String },
}

impl TrendError {
    pub fn kind(&self) -> &'static str {
        match self {
            TrendError::InsufficientData { .. } => "InsufficientData",
            TrendError::DegenerateInput { .. } => "DegenerateInput",
            TrendError::MalformedSeries { .. } => "MalformedSeries",
        }
    }
}
