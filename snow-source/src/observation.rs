use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single dated value for one entity and variable.
///
/// `value` is `None` when the source reported no data for that day; missing
/// data is expected and never an error on its own.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Observation {
    pub entity_id: String,
    pub timestamp: NaiveDate,
    pub variable_name: String,
    pub value: Option<f64>,
    pub unit: String,
}

/// One `{date, value}` pair as returned by a remote source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: Option<f64>,
}

/// A remote response before it is attached to an entity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RawSeries {
    #[serde(default)]
    pub unit: String,
    pub points: Vec<SeriesPoint>,
}
