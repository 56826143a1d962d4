//! The Derived-Metric Engine.
//!
//! Classifies days (freezing, snow, snow-cover), derives a snowfall proxy
//! from temperature and precipitation, and reduces daily series to monthly
//! and annual aggregates. Missing observations never raise; only series
//! that cannot belong together (different entities) are rejected.

use crate::{
    aggregate::{AnnualAggregate, MonthlyAggregate},
    error::MetricError,
};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use snow_source::time_series::TimeSeries;
use snow_utils::dates::SeasonWindow;
use std::collections::BTreeMap;

/// Name of the derived daily snowfall series.
pub const SNOWFALL_PROXY: &str = "snowfall_proxy";

/// Freezing point for sources reporting temperature in Kelvin.
pub const KELVIN_FREEZING_POINT: f64 = 273.15;

/// Thresholds used by the day classifications.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricConfig {
    /// Temperatures strictly below this are freezing, in the source's unit.
    pub freezing_point: f64,
    /// Precipitation strictly above this (mm-equivalent) makes a snow day.
    pub precip_threshold: f64,
    /// Snow-cover index (0–100) strictly above this makes a snow-cover day.
    pub snow_cover_threshold: f64,
    pub season_window: SeasonWindow,
}

impl Default for MetricConfig {
    fn default() -> Self {
        MetricConfig {
            freezing_point: 0.0,
            precip_threshold: 0.5,
            snow_cover_threshold: 50.0,
            season_window: SeasonWindow::default(),
        }
    }
}

impl MetricConfig {
    /// Same thresholds with the freezing point moved to 273.15 K.
    pub fn kelvin(self) -> Self {
        MetricConfig {
            freezing_point: KELVIN_FREEZING_POINT,
            ..self
        }
    }
}

pub fn is_freezing(temperature: f64, config: &MetricConfig) -> bool {
    temperature < config.freezing_point
}

/// Below freezing and precipitation above the threshold. Missing inputs
/// never qualify.
pub fn is_snow_day(
    temperature: Option<f64>,
    precipitation: Option<f64>,
    config: &MetricConfig,
) -> bool {
    match (temperature, precipitation) {
        (Some(t), Some(p)) => is_freezing(t, config) && p > config.precip_threshold,
        _ => false,
    }
}

/// Precipitation counted as snowfall on freezing days, zero otherwise.
/// `None` when either input is missing.
pub fn snowfall_proxy(
    temperature: Option<f64>,
    precipitation: Option<f64>,
    config: &MetricConfig,
) -> Option<f64> {
    let (t, p) = (temperature?, precipitation?);
    Some(if is_freezing(t, config) { p } else { 0.0 })
}

pub fn is_snow_cover_day(index: Option<f64>, config: &MetricConfig) -> bool {
    index.is_some_and(|v| v > config.snow_cover_threshold)
}

/// Temperature and precipitation for the same entity and day.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyWeather {
    pub date: NaiveDate,
    pub temperature: Option<f64>,
    pub precipitation: Option<f64>,
}

/// Join two series on date. Days present in only one series carry a
/// missing value for the other.
pub fn align_daily(
    temperature: &TimeSeries,
    precipitation: &TimeSeries,
) -> Result<Vec<DailyWeather>, MetricError> {
    if temperature.entity_id() != precipitation.entity_id() {
        return Err(MetricError::MalformedSeries {
            entity_id: temperature.entity_id().to_string(),
            reason: format!(
                "temperature for '{}' paired with precipitation for '{}'",
                temperature.entity_id(),
                precipitation.entity_id()
            ),
        });
    }
    if temperature.variable_name() == precipitation.variable_name() {
        return Err(MetricError::MalformedSeries {
            entity_id: temperature.entity_id().to_string(),
            reason: format!(
                "variable '{}' used as both temperature and precipitation",
                temperature.variable_name()
            ),
        });
    }
    let mut days: BTreeMap<NaiveDate, DailyWeather> = BTreeMap::new();
    for (date, value) in temperature.values() {
        days.entry(date)
            .or_insert(DailyWeather {
                date,
                temperature: None,
                precipitation: None,
            })
            .temperature = value;
    }
    for (date, value) in precipitation.values() {
        days.entry(date)
            .or_insert(DailyWeather {
                date,
                temperature: None,
                precipitation: None,
            })
            .precipitation = value;
    }
    Ok(days.into_values().collect())
}

/// Daily snowfall proxy as its own series, in the precipitation unit.
pub fn daily_snowfall(
    temperature: &TimeSeries,
    precipitation: &TimeSeries,
    config: &MetricConfig,
) -> Result<TimeSeries, MetricError> {
    let days = align_daily(temperature, precipitation)?;
    Ok(TimeSeries::from_values(
        precipitation.entity_id(),
        SNOWFALL_PROXY,
        precipitation.unit(),
        days.iter().map(|d| {
            (
                d.date,
                snowfall_proxy(d.temperature, d.precipitation, config),
            )
        }),
    ))
}

/// Sum of the valid values in each calendar month. Missing days add
/// nothing; a month with no valid day is `None`.
pub fn monthly_totals(series: &TimeSeries, metric_name: &str) -> Vec<MonthlyAggregate> {
    let mut months: BTreeMap<(i32, u32), Option<f64>> = BTreeMap::new();
    for (date, value) in series.values() {
        let slot = months.entry((date.year(), date.month())).or_insert(None);
        if let Some(v) = value {
            *slot = Some(slot.unwrap_or(0.0) + v);
        }
    }
    months
        .into_iter()
        .map(|((year, month), value)| MonthlyAggregate {
            entity_id: series.entity_id().to_string(),
            year,
            month,
            metric_name: metric_name.to_string(),
            value,
        })
        .collect()
}

/// Roll monthly totals up to calendar years; `None` only when every month
/// of the year is `None`.
pub fn annual_from_monthly(monthly: &[MonthlyAggregate]) -> Vec<AnnualAggregate> {
    let mut years: BTreeMap<i32, (String, String, Option<f64>)> = BTreeMap::new();
    for m in monthly {
        let slot = years
            .entry(m.year)
            .or_insert_with(|| (m.entity_id.clone(), m.metric_name.clone(), None));
        if let Some(v) = m.value {
            slot.2 = Some(slot.2.unwrap_or(0.0) + v);
        }
    }
    years
        .into_iter()
        .map(|(year, (entity_id, metric_name, value))| AnnualAggregate {
            entity_id,
            year,
            metric_name,
            value,
        })
        .collect()
}

/// Calendar-year sums of a series (daily → monthly → annual).
pub fn annual_totals(series: &TimeSeries, metric_name: &str) -> Vec<AnnualAggregate> {
    annual_from_monthly(&monthly_totals(series, metric_name))
}

/// Annual snowfall from the proxy. Days with missing temperature or
/// precipitation contribute 0; a year where every day is missing is `None`.
pub fn annual_snowfall(
    temperature: &TimeSeries,
    precipitation: &TimeSeries,
    config: &MetricConfig,
) -> Result<Vec<AnnualAggregate>, MetricError> {
    let snowfall = daily_snowfall(temperature, precipitation, config)?;
    Ok(annual_totals(&snowfall, "annual_snowfall"))
}

fn annual_reduce<F>(series: &TimeSeries, metric_name: &str, mut fold: F) -> Vec<AnnualAggregate>
where
    F: FnMut(Option<f64>, f64) -> f64,
{
    let mut years: BTreeMap<i32, Option<f64>> = BTreeMap::new();
    for (date, value) in series.values() {
        let slot = years.entry(date.year()).or_insert(None);
        if let Some(v) = value {
            *slot = Some(fold(*slot, v));
        }
    }
    years
        .into_iter()
        .map(|(year, value)| AnnualAggregate {
            entity_id: series.entity_id().to_string(),
            year,
            metric_name: metric_name.to_string(),
            value,
        })
        .collect()
}

/// Largest valid value per calendar year (e.g. peak SWE).
pub fn annual_max(series: &TimeSeries, metric_name: &str) -> Vec<AnnualAggregate> {
    annual_reduce(series, metric_name, |acc, v| acc.map_or(v, |a| a.max(v)))
}

/// Snow days per calendar year. A year in which no day had both inputs
/// is `None`.
pub fn annual_snow_days(
    temperature: &TimeSeries,
    precipitation: &TimeSeries,
    config: &MetricConfig,
) -> Result<Vec<AnnualAggregate>, MetricError> {
    let days = align_daily(temperature, precipitation)?;
    let mut years: BTreeMap<i32, Option<f64>> = BTreeMap::new();
    for day in &days {
        let slot = years.entry(day.date.year()).or_insert(None);
        if day.temperature.is_some() && day.precipitation.is_some() {
            let hit = if is_snow_day(day.temperature, day.precipitation, config) {
                1.0
            } else {
                0.0
            };
            *slot = Some(slot.unwrap_or(0.0) + hit);
        }
    }
    Ok(years
        .into_iter()
        .map(|(year, value)| AnnualAggregate {
            entity_id: temperature.entity_id().to_string(),
            year,
            metric_name: "snow_days".to_string(),
            value,
        })
        .collect())
}

/// Snow-cover days per calendar year; `None` for a year with no valid index.
pub fn annual_snow_cover_days(series: &TimeSeries, config: &MetricConfig) -> Vec<AnnualAggregate> {
    annual_reduce(series, "snow_cover_days", |acc, v| {
        let hit = if is_snow_cover_day(Some(v), config) { 1.0 } else { 0.0 };
        acc.unwrap_or(0.0) + hit
    })
}

/// Day classification counts over a span of daily weather.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct DayCounts {
    /// Days with both temperature and precipitation.
    pub days: usize,
    pub freezing_days: usize,
    pub snow_days: usize,
    /// Precipitation summed over snow days.
    pub snowfall: f64,
}

pub fn day_counts(days: &[DailyWeather], config: &MetricConfig) -> DayCounts {
    days.iter()
        .filter_map(|d| Some((d.temperature?, d.precipitation?)))
        .fold(DayCounts::default(), |mut acc, (t, p)| {
            acc.days += 1;
            if is_freezing(t, config) {
                acc.freezing_days += 1;
            }
            if is_snow_day(Some(t), Some(p), config) {
                acc.snow_days += 1;
                acc.snowfall += p;
            }
            acc
        })
}

/// Onset and melt of one snow season.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SnowSeason {
    /// Calendar year in which the season window opens.
    pub season_year: i32,
    /// First snow-cover day in the window, if any.
    pub onset: Option<NaiveDate>,
    /// Last snow-cover day in the window, if any.
    pub melt: Option<NaiveDate>,
    pub snow_days: usize,
}

/// Find onset/melt of the season opening in `season_year`.
pub fn snow_season(series: &TimeSeries, season_year: i32, config: &MetricConfig) -> SnowSeason {
    let mut season = SnowSeason {
        season_year,
        onset: None,
        melt: None,
        snow_days: 0,
    };
    let Some((start, end)) = config.season_window.bounds(season_year) else {
        return season;
    };
    for (date, value) in series.values() {
        if date < start || date >= end || !is_snow_cover_day(value, config) {
            continue;
        }
        season.onset.get_or_insert(date);
        season.melt = Some(date);
        season.snow_days += 1;
    }
    season
}

/// Every season whose whole window lies inside the span of the series.
/// A window the series only partly covers would report the edge of the
/// data as its onset or melt, so it is left out.
pub fn snow_seasons(series: &TimeSeries, config: &MetricConfig) -> Vec<SnowSeason> {
    let Some(span) = series.date_range() else {
        return Vec::new();
    };
    let mut season_years: Vec<i32> = series
        .values()
        .filter_map(|(date, _)| config.season_window.season_year_for(&date))
        .collect();
    season_years.dedup();
    season_years
        .into_iter()
        .filter(|year| {
            config
                .season_window
                .bounds(*year)
                .and_then(|(start, end)| Some((start, end.pred_opt()?)))
                .is_some_and(|(start, last)| span.start <= start && last <= span.end)
        })
        .map(|year| snow_season(series, year, config))
        .collect()
}

/// Days from the window opening to onset, one aggregate per season, for
/// onset trend fitting. Seasons without onset are `None`.
pub fn onset_offsets(
    entity_id: &str,
    seasons: &[SnowSeason],
    config: &MetricConfig,
) -> Vec<AnnualAggregate> {
    seasons
        .iter()
        .map(|s| AnnualAggregate {
            entity_id: entity_id.to_string(),
            year: s.season_year,
            metric_name: "snow_onset_day".to_string(),
            value: config
                .season_window
                .bounds(s.season_year)
                .zip(s.onset)
                .map(|((start, _), onset)| (onset - start).num_days() as f64),
        })
        .collect()
}

/// Mean over one window of years.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowMean {
    /// Requested window length; `None` means the full history.
    pub window: Option<usize>,
    pub mean: Option<f64>,
    /// Non-null years actually averaged.
    pub years_used: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollingMeans {
    pub windows: Vec<WindowMean>,
    pub full: WindowMean,
}

/// Means of the most recent `k` years for each `k`, plus the full history.
///
/// Null years are skipped: the window for `k` is the `k` most recent
/// non-null years, and fewer are used when fewer exist. Input order does
/// not matter; years are sorted before selection.
pub fn rolling_means(annual: &[AnnualAggregate], windows: &[usize]) -> RollingMeans {
    let mut valid: Vec<(i32, f64)> = annual
        .iter()
        .filter_map(|a| a.value.map(|v| (a.year, v)))
        .collect();
    valid.sort_by_key(|(year, _)| *year);
    let mean_of = |values: &[(i32, f64)], window: Option<usize>| WindowMean {
        window,
        mean: (!values.is_empty())
            .then(|| values.iter().map(|(_, v)| v).sum::<f64>() / values.len() as f64),
        years_used: values.len(),
    };
    RollingMeans {
        windows: windows
            .iter()
            .map(|&k| mean_of(&valid[valid.len().saturating_sub(k)..], Some(k)))
            .collect(),
        full: mean_of(&valid, None),
    }
}

/// Month with the largest total; missing months count as zero. Ties go to
/// the earlier month.
pub fn peak_month(monthly: &[MonthlyAggregate]) -> Option<u32> {
    monthly
        .iter()
        .map(|m| (m.month, m.value.unwrap_or(0.0)))
        .fold(None, |best: Option<(u32, f64)>, (month, v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((month, v)),
        })
        .map(|(month, _)| month)
}

/// Largest valid value and its date; the earliest date wins a tie.
pub fn peak(series: &TimeSeries) -> Option<(NaiveDate, f64)> {
    series
        .valid()
        .fold(None, |best: Option<(NaiveDate, f64)>, (date, v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((date, v)),
        })
}

/// Most recent valid value and its date.
pub fn latest(series: &TimeSeries) -> Option<(NaiveDate, f64)> {
    series.valid().last()
}
