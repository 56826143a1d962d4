use thiserror::Error;

/// Errors raised while querying a source or assembling its series.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    /// The remote query failed. Transient; the whole run may be retried later.
    #[error("Source '{source_name}' unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    #[error("No variable matching concept '{concept}' in source '{source_name}'")]
    VariableNotFound { source_name: String, concept: String },

    #[error("Malformed series for entity '{entity_id}': {reason}")]
    MalformedSeries { entity_id: String, reason: String },
}

impl SourceError {
    pub fn unavailable(source_name: &str, reason: impl Into<String>) -> Self {
        SourceError::SourceUnavailable {
            source_name: source_name.to_string(),
            reason: reason.into(),
        }
    }

    /// Stable marker used in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            SourceError::SourceUnavailable { .. } => "SourceUnavailable",
            SourceError::VariableNotFound { .. } => "VariableNotFound",
            SourceError::MalformedSeries { .. } => "MalformedSeries",
        }
    }
}
