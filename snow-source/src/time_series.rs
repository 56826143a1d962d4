use crate::{
    date_range::DateRange,
    error::SourceError,
    observation::{Observation, RawSeries},
};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::BTreeSet;

/// Observations for one `(entity_id, variable_name)` pair, strictly ordered
/// by timestamp.
///
/// Inserting a second observation for an existing date replaces the first
/// (last write wins). Observations for a different entity or variable are
/// rejected as [`SourceError::MalformedSeries`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeries {
    entity_id: String,
    variable_name: String,
    unit: String,
    observations: Vec<Observation>,
}

impl TimeSeries {
    pub fn new(entity_id: &str, variable_name: &str, unit: &str) -> Self {
        TimeSeries {
            entity_id: entity_id.to_string(),
            variable_name: variable_name.to_string(),
            unit: unit.to_string(),
            observations: Vec::new(),
        }
    }

    /// Attach a raw remote response to an entity and variable.
    pub fn from_raw(entity_id: &str, variable_name: &str, raw: RawSeries) -> Self {
        let mut series = TimeSeries::new(entity_id, variable_name, &raw.unit);
        for point in raw.points {
            series.upsert(point.date, point.value);
        }
        series
    }

    /// Build a series from `(date, value)` pairs.
    pub fn from_values<I>(entity_id: &str, variable_name: &str, unit: &str, values: I) -> Self
    where
        I: IntoIterator<Item = (NaiveDate, Option<f64>)>,
    {
        let mut series = TimeSeries::new(entity_id, variable_name, unit);
        for (date, value) in values {
            series.upsert(date, value);
        }
        series
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn variable_name(&self) -> &str {
        &self.variable_name
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    /// Insert an observation, keeping timestamps strictly increasing.
    pub fn insert(&mut self, observation: Observation) -> Result<(), SourceError> {
        if observation.entity_id != self.entity_id {
            return Err(SourceError::MalformedSeries {
                entity_id: self.entity_id.clone(),
                reason: format!("observation belongs to entity '{}'", observation.entity_id),
            });
        }
        if observation.variable_name != self.variable_name {
            return Err(SourceError::MalformedSeries {
                entity_id: self.entity_id.clone(),
                reason: format!(
                    "observation of '{}' in series of '{}'",
                    observation.variable_name, self.variable_name
                ),
            });
        }
        match self
            .observations
            .binary_search_by(|o| o.timestamp.cmp(&observation.timestamp))
        {
            Ok(index) => self.observations[index] = observation,
            Err(index) => self.observations.insert(index, observation),
        }
        Ok(())
    }

    fn upsert(&mut self, date: NaiveDate, value: Option<f64>) {
        let observation = Observation {
            entity_id: self.entity_id.clone(),
            timestamp: date,
            variable_name: self.variable_name.clone(),
            value,
            unit: self.unit.clone(),
        };
        // entity and variable are ours, so this cannot be rejected
        let _ = self.insert(observation);
    }

    /// Value recorded on `date`: `None` if the date is absent, `Some(None)`
    /// if it is present but missing.
    pub fn get(&self, date: &NaiveDate) -> Option<Option<f64>> {
        self.observations
            .binary_search_by(|o| o.timestamp.cmp(date))
            .ok()
            .map(|index| self.observations[index].value)
    }

    /// All `(date, value)` pairs, missing values included.
    pub fn values(&self) -> impl Iterator<Item = (NaiveDate, Option<f64>)> + '_ {
        self.observations.iter().map(|o| (o.timestamp, o.value))
    }

    /// Only the dates that carry a value.
    pub fn valid(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.observations
            .iter()
            .filter_map(|o| o.value.map(|v| (o.timestamp, v)))
    }

    pub fn date_range(&self) -> Option<DateRange> {
        let first = self.observations.first()?;
        let last = self.observations.last()?;
        DateRange::new(first.timestamp, last.timestamp)
    }

    /// Calendar years touched by this series.
    pub fn years(&self) -> BTreeSet<i32> {
        self.observations.iter().map(|o| o.timestamp.year()).collect()
    }

    /// Observations whose timestamps fall inside `range`.
    pub fn within(&self, range: &DateRange) -> &[Observation] {
        let start = self.observations.partition_point(|o| o.timestamp < range.start);
        let end = self.observations.partition_point(|o| o.timestamp <= range.end);
        &self.observations[start..end]
    }
}
