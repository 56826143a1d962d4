//! Per-entity snowfall trend pipeline: source adapter → derived metrics →
//! trend estimator. Every entity ends with either a trend or an error
//! marker; one failing entity never stops the others.

use crate::error::StepError;
use log::{info, warn};
use snow_data::{
    metrics::{annual_snowfall, MetricConfig},
    summary::Outcome,
    trend::{fit_trend, TrendResult},
};
use snow_source::{
    concept::Concept,
    date_range::DateRange,
    entity::Entity,
    error::SourceError,
    source::{SourceAdapter, TimeSeriesSource},
    time_series::TimeSeries,
};
use std::collections::BTreeMap;

pub const ANNUAL_SNOWFALL: &str = "annual_snowfall";

/// Daily minimum temperature and precipitation for one entity.
pub async fn fetch_weather(
    adapter: &SourceAdapter<'_>,
    entity: &Entity,
    range: &DateRange,
) -> Result<(TimeSeries, TimeSeries), SourceError> {
    let mut series = adapter
        .fetch_many(
            entity,
            &[Concept::MinTemperature, Concept::Precipitation],
            range,
        )
        .await?;
    let missing = |concept: Concept| SourceError::VariableNotFound {
        source_name: adapter.source_name().to_string(),
        concept: concept.to_string(),
    };
    let temperature = series
        .remove(&Concept::MinTemperature)
        .ok_or_else(|| missing(Concept::MinTemperature))?;
    let precipitation = series
        .remove(&Concept::Precipitation)
        .ok_or_else(|| missing(Concept::Precipitation))?;
    Ok((temperature, precipitation))
}

pub async fn entity_trend(
    adapter: &SourceAdapter<'_>,
    entity: &Entity,
    range: &DateRange,
    metrics: &MetricConfig,
) -> Result<TrendResult, StepError> {
    let (temperature, precipitation) = fetch_weather(adapter, entity, range).await?;
    let annual = annual_snowfall(&temperature, &precipitation, metrics)?;
    Ok(fit_trend(&entity.id, ANNUAL_SNOWFALL, &annual)?)
}

/// Annual snowfall trend for every entity, keyed by entity id.
pub async fn run_trend_pipeline(
    source: &dyn TimeSeriesSource,
    entities: &[Entity],
    range: &DateRange,
    metrics: &MetricConfig,
) -> BTreeMap<String, Outcome<TrendResult>> {
    let adapter = SourceAdapter::new(source);
    let mut results = BTreeMap::new();
    for entity in entities {
        let outcome = match entity_trend(&adapter, entity, range, metrics).await {
            Ok(trend) => {
                info!(
                    "{}: {:+.2} per decade over {} years",
                    entity.id, trend.slope_per_decade, trend.n_points
                );
                Outcome::Value(trend)
            }
            Err(e) => {
                warn!("{}: {}", entity.id, e);
                Outcome::error(e.kind(), &e)
            }
        };
        results.insert(entity.id.clone(), outcome);
    }
    results
}
