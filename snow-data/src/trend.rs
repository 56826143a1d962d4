//! Ordinary least-squares trends over annual aggregates.

use crate::{aggregate::AnnualAggregate, error::TrendError};
use log::debug;
use serde::Serialize;

/// First and last calendar year that took part in a fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct YearSpan {
    pub first: i32,
    pub last: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendResult {
    pub entity_id: String,
    pub metric_name: String,
    /// Signed change per year; positive means increasing.
    pub slope_per_unit_time: f64,
    pub slope_per_decade: f64,
    /// Fitted value at the first valid year (index 0).
    pub intercept: f64,
    pub n_points: usize,
    pub window_years: YearSpan,
}

/// Closed-form OLS fit of `y` on `x`. `None` when every `x` is identical
/// or fewer than two points are given.
pub fn linear_fit(points: &[(f64, f64)]) -> Option<(f64, f64)> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let (sx, sy, sxy, sxx) = points.iter().fold((0.0, 0.0, 0.0, 0.0), |acc, (x, y)| {
        (acc.0 + x, acc.1 + y, acc.2 + x * y, acc.3 + x * x)
    });
    let denominator = n * sxx - sx * sx;
    if denominator == 0.0 {
        return None;
    }
    let slope = (n * sxy - sx * sy) / denominator;
    let intercept = (sy - slope * sx) / n;
    Some((slope, intercept))
}

/// Fit `value` against the year's position among the non-null years
/// (0..n-1). Null years are dropped and gaps are not zero-filled, so a
/// missing year shifts every later year down by one index.
pub fn fit_trend(
    entity_id: &str,
    metric_name: &str,
    annual: &[AnnualAggregate],
) -> Result<TrendResult, TrendError> {
    if let Some(stray) = annual
        .iter()
        .find(|a| a.entity_id != entity_id || a.metric_name != metric_name)
    {
        return Err(TrendError::MalformedSeries {
            entity_id: entity_id.to_string(),
            reason: format!(
                "aggregate for '{}'/'{}' in series of '{}'",
                stray.entity_id, stray.metric_name, metric_name
            ),
        });
    }
    let mut valid: Vec<(i32, f64)> = annual
        .iter()
        .filter_map(|a| a.value.map(|v| (a.year, v)))
        .collect();
    valid.sort_by_key(|(year, _)| *year);
    if valid.len() < annual.len() {
        debug!(
            "{entity_id}/{metric_name}: {} of {} years have no value",
            annual.len() - valid.len(),
            annual.len()
        );
    }
    if valid.windows(2).any(|w| w[0].0 == w[1].0) {
        return Err(TrendError::MalformedSeries {
            entity_id: entity_id.to_string(),
            reason: "duplicate year in annual series".to_string(),
        });
    }
    let (first, last) = match (valid.first(), valid.last()) {
        (Some(first), Some(last)) if valid.len() >= 2 => (first.0, last.0),
        _ => {
            return Err(TrendError::InsufficientData {
                entity_id: entity_id.to_string(),
                metric_name: metric_name.to_string(),
                valid_years: valid.len(),
            })
        }
    };
    let points: Vec<(f64, f64)> = valid
        .iter()
        .enumerate()
        .map(|(index, (_, v))| (index as f64, *v))
        .collect();
    let (slope, intercept) = linear_fit(&points).ok_or_else(|| TrendError::DegenerateInput {
        entity_id: entity_id.to_string(),
        metric_name: metric_name.to_string(),
    })?;
    Ok(TrendResult {
        entity_id: entity_id.to_string(),
        metric_name: metric_name.to_string(),
        slope_per_unit_time: slope,
        slope_per_decade: slope * 10.0,
        intercept,
        n_points: points.len(),
        window_years: YearSpan { first, last },
    })
}
