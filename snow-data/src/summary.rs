//! The Summary Aggregator: per-source reports merged into one summary.
//!
//! Every report passed in appears in the merged summary, either with its
//! coverage and headline variables or with an explicit error status.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use snow_source::date_range::DateRange;
use std::collections::BTreeMap;

/// Headline variables kept per source.
pub const HEADLINE_VARIABLES: usize = 5;

/// Per-entity result: a value, or the reason there is none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Outcome<T> {
    Value(T),
    Error { error: String, reason: String },
}

impl<T> Outcome<T> {
    pub fn error(kind: &str, reason: impl ToString) -> Self {
        Outcome::Error {
            error: kind.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn is_value(&self) -> bool {
        matches!(self, Outcome::Value(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SourceStatus {
    Ok,
    Failed { kind: String, reason: String },
}

impl SourceStatus {
    /// One-line status as written into `run_status`.
    pub fn describe(&self) -> String {
        match self {
            SourceStatus::Ok => "OK".to_string(),
            SourceStatus::Failed { kind, reason } => format!("FAIL ({kind}): {reason}"),
        }
    }
}

/// Everything one source produced during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceReport {
    pub source_name: String,
    pub date_range: Option<DateRange>,
    pub key_variables: Vec<String>,
    pub derived_outputs: Map<String, Value>,
    pub status: SourceStatus,
}

impl SourceReport {
    pub fn new(source_name: &str) -> Self {
        SourceReport {
            source_name: source_name.to_string(),
            date_range: None,
            key_variables: Vec::new(),
            derived_outputs: Map::new(),
            status: SourceStatus::Ok,
        }
    }

    pub fn failed(source_name: &str, kind: &str, reason: impl ToString) -> Self {
        SourceReport {
            status: SourceStatus::Failed {
                kind: kind.to_string(),
                reason: reason.to_string(),
            },
            ..SourceReport::new(source_name)
        }
    }

    /// Mark an otherwise populated report as failed.
    pub fn fail(&mut self, kind: &str, reason: impl ToString) {
        self.status = SourceStatus::Failed {
            kind: kind.to_string(),
            reason: reason.to_string(),
        };
    }

    /// Add a derived output. Values that cannot be represented as JSON are
    /// recorded as an error string under the same key.
    pub fn insert<T: Serialize>(&mut self, key: &str, value: T) {
        let json = serde_json::to_value(value)
            .unwrap_or_else(|e| Value::String(format!("unserializable: {e}")));
        self.derived_outputs.insert(key.to_string(), json);
    }

    /// The persisted per-source document: `date_range`, `bands`, the derived
    /// outputs and, on failure, `error`.
    pub fn to_document(&self) -> Value {
        let mut doc = Map::new();
        if let Some(range) = &self.date_range {
            doc.insert(
                "date_range".to_string(),
                serde_json::json!({ "start": range.start, "end": range.end }),
            );
        }
        doc.insert("bands".to_string(), serde_json::json!(self.key_variables));
        for (key, value) in &self.derived_outputs {
            doc.insert(key.clone(), value.clone());
        }
        if let SourceStatus::Failed { kind, reason } = &self.status {
            doc.insert("error".to_string(), Value::String(format!("{kind}: {reason}")));
        }
        Value::Object(doc)
    }

    /// Rebuild a report from a persisted document. Accepts `date_range`
    /// or a bare `latest_date`, and `snow_related_bands` before `bands`.
    pub fn from_document(source_name: &str, doc: &Value) -> Self {
        let mut report = SourceReport::new(source_name);
        let date = |v: Option<&Value>| {
            v.and_then(Value::as_str)
                .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
        };
        report.date_range = match doc.get("date_range") {
            Some(range) => date(range.get("start"))
                .zip(date(range.get("end")))
                .and_then(|(start, end)| DateRange::new(start, end)),
            None => date(doc.get("latest_date")).map(|d| DateRange { start: d, end: d }),
        };
        report.key_variables = doc
            .get("snow_related_bands")
            .or_else(|| doc.get("bands"))
            .and_then(Value::as_array)
            .map(|bands| {
                bands
                    .iter()
                    .filter_map(|b| b.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        if let Some(error) = doc.get("error").and_then(Value::as_str) {
            report.fail("SourceError", error);
        }
        report
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub date_range: Option<DateRange>,
    pub bands: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
}

/// The merged cross-source summary document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Summary {
    pub run_status: BTreeMap<String, String>,
    pub datasets: BTreeMap<String, DatasetSummary>,
}

/// Merge reports keyed by source name. A later report with the same name
/// replaces an earlier one.
pub fn merge(reports: &[SourceReport]) -> Summary {
    let mut summary = Summary::default();
    for report in reports {
        summary
            .run_status
            .insert(report.source_name.clone(), report.status.describe());
        let error = match &report.status {
            SourceStatus::Ok => None,
            failed => Some(failed.describe()),
        };
        summary.datasets.insert(
            report.source_name.clone(),
            DatasetSummary {
                date_range: report.date_range,
                bands: report
                    .key_variables
                    .iter()
                    .take(HEADLINE_VARIABLES)
                    .cloned()
                    .collect(),
                error,
            },
        );
    }
    summary
}
