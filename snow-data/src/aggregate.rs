use serde::{Deserialize, Serialize};

/// One scalar per entity, year and metric. `value` is `None` when the year
/// had no qualifying observations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnualAggregate {
    pub entity_id: String,
    pub year: i32,
    pub metric_name: String,
    pub value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyAggregate {
    pub entity_id: String,
    pub year: i32,
    pub month: u32,
    pub metric_name: String,
    pub value: Option<f64>,
}

/// `{year: value}` view used in the persisted documents.
pub fn by_year(annual: &[AnnualAggregate]) -> std::collections::BTreeMap<String, Option<f64>> {
    annual
        .iter()
        .map(|a| (a.year.to_string(), a.value))
        .collect()
}
