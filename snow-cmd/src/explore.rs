//! Per-source exploration reports.
//!
//! Each source gets a document with its coverage, its variables and a few
//! derived numbers for a sample point. A failure inside one source is
//! recorded in that source's report and never stops the others.

use crate::{config::SnowConfig, error::StepError, pipeline::fetch_weather, write_json};
use chrono::{Datelike, Duration, Local, NaiveDate};
use clap::ValueEnum;
use log::{info, warn};
use serde_json::{json, Map, Value};
use snow_data::{
    aggregate::by_year,
    metrics::{
        align_daily, annual_snow_cover_days, annual_snowfall, annual_totals, daily_snowfall,
        day_counts, latest, monthly_totals, onset_offsets, peak, peak_month, rolling_means,
        snow_seasons,
    },
    summary::{merge, Outcome, SourceReport, Summary},
    trend::{fit_trend, TrendResult},
    TrendError,
};
use snow_source::{
    client::RemoteClient,
    concept::{Concept, ExactResolver},
    date_range::DateRange,
    entity::{Entity, Geometry},
    error::SourceError,
    gridded::{GriddedSource, DAYMET, ERA5_LAND_MONTHLY, GRIDMET, MODIS_SNOW, SNODAS},
    snotel::SnotelSource,
    source::{SourceAdapter, TimeSeriesSource},
};
use snow_utils::dates::SeasonWindow;
use std::collections::BTreeMap;

pub const SUMMARY_FILE: &str = "exploration_summary.json";

/// Windows, in years, of the recent-mean snowfall figures.
pub const ROLLING_WINDOWS: [usize; 3] = [5, 10, 20];

/// Band-name fragments that mark a reanalysis band as snow related.
const SNOW_BAND_MARKERS: [&str; 3] = ["snow", "swe", "ice"];

/// Every few valid values are kept as a sample in the documents.
const SAMPLE_STRIDE: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SourceKind {
    Snodas,
    Snotel,
    Daymet,
    Era5,
    Modis,
    Gridmet,
}

impl SourceKind {
    pub const ALL: [SourceKind; 6] = [
        SourceKind::Snodas,
        SourceKind::Snotel,
        SourceKind::Daymet,
        SourceKind::Era5,
        SourceKind::Modis,
        SourceKind::Gridmet,
    ];

    /// Source name used as the key in the summary.
    pub fn name(self) -> &'static str {
        match self {
            SourceKind::Snodas => SNODAS.name,
            SourceKind::Snotel => "SNOTEL",
            SourceKind::Daymet => DAYMET.name,
            SourceKind::Era5 => ERA5_LAND_MONTHLY.name,
            SourceKind::Modis => MODIS_SNOW.name,
            SourceKind::Gridmet => GRIDMET.name,
        }
    }

    /// File name of the per-source document inside the data directory.
    pub fn document(self) -> &'static str {
        match self {
            SourceKind::Snodas => "snodas_sample.json",
            SourceKind::Snotel => "snotel_sample.json",
            SourceKind::Daymet => "daymet_sample.json",
            SourceKind::Era5 => "era5_sample.json",
            SourceKind::Modis => "modis_sample.json",
            SourceKind::Gridmet => "gridmet_sample.json",
        }
    }
}

fn finish(mut report: SourceReport, result: Result<(), StepError>) -> SourceReport {
    if let Err(e) = result {
        warn!("{}: {}", report.source_name, e);
        report.fail(e.kind(), &e);
    }
    report
}

fn trend_outcome(result: Result<TrendResult, TrendError>) -> Outcome<TrendResult> {
    match result {
        Ok(trend) => Outcome::Value(trend),
        Err(e) => Outcome::error(e.kind(), &e),
    }
}

fn years(first: i32, last: i32) -> Result<DateRange, StepError> {
    DateRange::years(first, last)
        .ok_or_else(|| StepError::InvalidConfig(format!("no dates in years {first}..{last}")))
}

/// Coverage and catalogue of a source, as seen from `entity`.
async fn describe(
    source: &dyn TimeSeriesSource,
    entity: &Entity,
    report: &mut SourceReport,
) -> Result<(), StepError> {
    report.date_range = source.coverage().await?;
    report.key_variables = source.catalogue(entity).await?;
    Ok(())
}

/// Annual snowfall proxy history, recent means and the monthly breakdown of
/// the sample year.
pub async fn explore_daymet(
    source: &dyn TimeSeriesSource,
    entity: &Entity,
    config: &SnowConfig,
) -> SourceReport {
    let mut report = SourceReport::new(source.name());
    let result = daymet_outputs(source, entity, config, &mut report).await;
    finish(report, result)
}

async fn daymet_outputs(
    source: &dyn TimeSeriesSource,
    entity: &Entity,
    config: &SnowConfig,
    report: &mut SourceReport,
) -> Result<(), StepError> {
    describe(source, entity, report).await?;
    let adapter = SourceAdapter::new(source);
    let range = years(config.first_year, config.last_year)?;
    let (temperature, precipitation) = fetch_weather(&adapter, entity, &range).await?;

    let annual = annual_snowfall(&temperature, &precipitation, &config.metrics)?;
    report.insert("annual_snowfall_mm", by_year(&annual));
    report.insert("means", rolling_means(&annual, &ROLLING_WINDOWS));
    report.insert(
        "trend",
        trend_outcome(fit_trend(&entity.id, "annual_snowfall", &annual)),
    );

    let snowfall = daily_snowfall(&temperature, &precipitation, &config.metrics)?;
    let monthly: Vec<_> = monthly_totals(&snowfall, "snowfall")
        .into_iter()
        .filter(|m| m.year == config.sample_year)
        .collect();
    let by_month: BTreeMap<u32, f64> = monthly
        .iter()
        .map(|m| (m.month, m.value.unwrap_or(0.0)))
        .collect();
    report.insert(&format!("monthly_snow_{}", config.sample_year), by_month);
    report.insert("peak_month", peak_month(&monthly));
    Ok(())
}

/// Day classification counts for the sample year. Temperatures are Kelvin.
pub async fn explore_gridmet(
    source: &dyn TimeSeriesSource,
    entity: &Entity,
    config: &SnowConfig,
) -> SourceReport {
    let mut report = SourceReport::new(source.name());
    let result = gridmet_outputs(source, entity, config, &mut report).await;
    finish(report, result)
}

async fn gridmet_outputs(
    source: &dyn TimeSeriesSource,
    entity: &Entity,
    config: &SnowConfig,
    report: &mut SourceReport,
) -> Result<(), StepError> {
    describe(source, entity, report).await?;
    let adapter = SourceAdapter::new(source);
    let range = years(config.sample_year, config.sample_year)?;
    let (temperature, precipitation) = fetch_weather(&adapter, entity, &range).await?;
    let days = align_daily(&temperature, &precipitation)?;
    let counts = day_counts(&days, &config.metrics.kelvin());
    report.insert(&format!("daily_count_{}", config.sample_year), counts.days);
    report.insert("freezing_days", counts.freezing_days);
    report.insert("estimated_snow_days", counts.snow_days);
    report.insert("estimated_snowfall_mm", counts.snowfall);
    Ok(())
}

/// Snow related bands of a reanalysis catalogue, in catalogue order.
pub fn snow_related_bands(bands: &[String]) -> Vec<String> {
    bands
        .iter()
        .filter(|band| {
            let lower = band.to_lowercase();
            SNOW_BAND_MARKERS.iter().any(|marker| lower.contains(marker))
        })
        .cloned()
        .collect()
}

/// Monthly snowfall rolled up to annual totals and a per-decade trend.
pub async fn explore_era5(
    source: &dyn TimeSeriesSource,
    entity: &Entity,
    config: &SnowConfig,
) -> SourceReport {
    let mut report = SourceReport::new(source.name());
    let result = era5_outputs(source, entity, config, &mut report).await;
    finish(report, result)
}

async fn era5_outputs(
    source: &dyn TimeSeriesSource,
    entity: &Entity,
    config: &SnowConfig,
    report: &mut SourceReport,
) -> Result<(), StepError> {
    report.date_range = source.coverage().await?;
    let bands = source.catalogue(entity).await?;
    let snow_bands = snow_related_bands(&bands);
    report.key_variables = snow_bands.clone();
    report.insert("all_bands", &bands);

    let band = if bands.iter().any(|b| b == "snowfall_sum") {
        "snowfall_sum".to_string()
    } else {
        snow_bands
            .first()
            .cloned()
            .ok_or_else(|| SourceError::VariableNotFound {
                source_name: source.name().to_string(),
                concept: Concept::Snowfall.to_string(),
            })?
    };
    let adapter =
        SourceAdapter::with_resolver(source, ExactResolver::new().with(Concept::Snowfall, &band));
    let range = match report.date_range {
        Some(range) => range,
        None => years(config.first_year, config.last_year)?,
    };
    let series = adapter.fetch(entity, &Concept::Snowfall, &range).await?;
    report.insert("timeseries_count", series.valid().count());

    let annual = annual_totals(&series, "annual_snowfall");
    report.insert("annual_totals", by_year(&annual));
    match fit_trend(&entity.id, "annual_snowfall", &annual) {
        Ok(trend) => report.insert("trend_slope_per_decade_m", trend.slope_per_decade),
        Err(e) => report.insert(
            "trend_slope_per_decade_m",
            Outcome::<f64>::error(e.kind(), &e),
        ),
    }
    Ok(())
}

/// Snow-cover days per year over the five calendar years ending with the
/// sample year, plus onset/melt and the onset trend of the seasons that lie
/// wholly inside them.
pub async fn explore_modis(
    source: &dyn TimeSeriesSource,
    entity: &Entity,
    config: &SnowConfig,
) -> SourceReport {
    let mut report = SourceReport::new(source.name());
    let result = modis_outputs(source, entity, config, &mut report).await;
    finish(report, result)
}

async fn modis_outputs(
    source: &dyn TimeSeriesSource,
    entity: &Entity,
    config: &SnowConfig,
    report: &mut SourceReport,
) -> Result<(), StepError> {
    describe(source, entity, report).await?;
    let adapter = SourceAdapter::new(source);
    let range = years(config.sample_year - 4, config.sample_year)?;
    let series = adapter.fetch(entity, &Concept::SnowCover, &range).await?;

    let sample_year_count = series
        .valid()
        .filter(|(date, _)| date.year() == config.sample_year)
        .count();
    report.insert(
        &format!("timeseries_{}_count", config.sample_year),
        sample_year_count,
    );
    report.insert(
        "snow_days_by_year",
        by_year(&annual_snow_cover_days(&series, &config.metrics)),
    );
    let seasons = snow_seasons(&series, &config.metrics);
    let onsets = onset_offsets(&entity.id, &seasons, &config.metrics);
    report.insert("seasons", &seasons);
    report.insert(
        "onset_trend",
        trend_outcome(fit_trend(&entity.id, "snow_onset_day", &onsets)),
    );
    Ok(())
}

/// From the opening of the season containing `latest` (or the last season
/// before it) through `latest`, clipped to the season window.
pub fn season_to_date(window: &SeasonWindow, latest: NaiveDate) -> Option<DateRange> {
    let season_year = match window.season_year_for(&latest) {
        Some(year) => year,
        None => {
            let (start, _) = window.bounds(latest.year())?;
            if start <= latest {
                latest.year()
            } else {
                latest.year() - 1
            }
        }
    };
    let (start, end) = window.bounds(season_year)?;
    let last_day = end.pred_opt()?.min(latest);
    DateRange::new(start, last_day)
}

/// Latest SWE and depth at every point plus the SWE series of the current
/// season at the first point.
pub async fn explore_snodas(
    source: &dyn TimeSeriesSource,
    points: &[Entity],
    config: &SnowConfig,
) -> SourceReport {
    let mut report = SourceReport::new(source.name());
    let result = snodas_outputs(source, points, config, &mut report).await;
    finish(report, result)
}

async fn snodas_outputs(
    source: &dyn TimeSeriesSource,
    points: &[Entity],
    config: &SnowConfig,
    report: &mut SourceReport,
) -> Result<(), StepError> {
    let primary = points
        .first()
        .ok_or_else(|| StepError::InvalidConfig("no sample points".to_string()))?;
    let coverage = source
        .coverage()
        .await?
        .ok_or_else(|| SourceError::unavailable(source.name(), "no coverage reported"))?;
    let latest_date = coverage.end;
    report.date_range = Some(coverage);
    report.key_variables = source.catalogue(primary).await?;
    report.insert("latest_date", latest_date);

    let adapter = SourceAdapter::new(source);
    let day = DateRange {
        start: latest_date,
        end: latest_date,
    };
    let mut point_values = Map::new();
    for point in points {
        let value: Value = match adapter
            .fetch_many(
                point,
                &[Concept::SnowWaterEquivalent, Concept::SnowDepth],
                &day,
            )
            .await
        {
            Ok(series) => series
                .values()
                .map(|s| {
                    let value = s.get(&latest_date).flatten();
                    (s.variable_name().to_string(), json!(value))
                })
                .collect::<Map<String, Value>>()
                .into(),
            Err(e) => {
                warn!("{}: {}", point.id, e);
                json!(Outcome::<()>::error(e.kind(), &e))
            }
        };
        point_values.insert(point.id.clone(), value);
    }
    report.insert("point_values", point_values);

    if let Some(season) = season_to_date(&config.metrics.season_window, latest_date) {
        let swe = adapter
            .fetch(primary, &Concept::SnowWaterEquivalent, &season)
            .await?;
        let sample: Vec<Value> = swe
            .valid()
            .step_by(SAMPLE_STRIDE)
            .map(|(date, v)| json!({ "date": date, "SWE": v }))
            .collect();
        report.insert("season_swe_count", swe.valid().count());
        report.insert("season_swe_sample", sample);
    }
    Ok(())
}

/// Record count, peak SWE and current SWE for each station over the
/// trailing `snotel_days` days ending `today`.
pub async fn explore_snotel(
    source: &dyn TimeSeriesSource,
    stations: &[Entity],
    config: &SnowConfig,
    today: NaiveDate,
) -> SourceReport {
    let mut report = SourceReport::new(source.name());
    let range = DateRange {
        start: today - Duration::days(config.snotel_days),
        end: today,
    };
    report.date_range = Some(range);
    let adapter = SourceAdapter::new(source);
    let mut succeeded = 0;
    for station in stations {
        let triplet = match &station.geometry {
            Geometry::Station { code } => code.clone(),
            _ => String::new(),
        };
        let doc = match adapter
            .fetch(station, &Concept::SnowWaterEquivalent, &range)
            .await
        {
            Ok(series) => match (peak(&series), latest(&series)) {
                (Some((peak_date, peak_swe)), Some((current_date, current_swe))) => {
                    succeeded += 1;
                    if !report.key_variables.iter().any(|v| v == series.variable_name()) {
                        report.key_variables.push(series.variable_name().to_string());
                    }
                    json!({
                        "station": triplet,
                        "records": series.valid().count(),
                        "peak_swe_in": peak_swe,
                        "peak_date": peak_date,
                        "current_swe_in": current_swe,
                        "current_date": current_date,
                    })
                }
                _ => json!(Outcome::<()>::error("InsufficientData", "No valid SWE values")),
            },
            Err(e) => {
                warn!("{}: {}", station.id, e);
                json!(Outcome::<()>::error(e.kind(), &e))
            }
        };
        report.insert(&station.id, doc);
    }
    if succeeded == 0 && !stations.is_empty() {
        report.fail("SourceUnavailable", "no station returned SWE values");
    }
    report
}

/// Run the selected sources (all when `only` is empty), write one document
/// per source and, for a full run, the merged summary.
pub async fn run_explore(config: &SnowConfig, only: &[SourceKind]) -> anyhow::Result<Summary> {
    let client = RemoteClient::new(&config.api)?;
    let points = config.point_entities();
    let primary = points
        .first()
        .ok_or_else(|| anyhow::anyhow!("config lists no sample points"))?;
    let today = Local::now().naive_local().date();
    let selected: Vec<SourceKind> = if only.is_empty() {
        SourceKind::ALL.to_vec()
    } else {
        only.to_vec()
    };

    let mut reports = Vec::with_capacity(selected.len());
    for kind in &selected {
        info!("Exploring {}", kind.name());
        let report = match kind {
            SourceKind::Snodas => {
                explore_snodas(&GriddedSource::new(&client, SNODAS), &points, config).await
            }
            SourceKind::Snotel => {
                let snotel = SnotelSource::new(client.http().clone());
                explore_snotel(&snotel, &config.station_entities(), config, today).await
            }
            SourceKind::Daymet => {
                explore_daymet(&GriddedSource::new(&client, DAYMET), primary, config).await
            }
            SourceKind::Era5 => {
                explore_era5(&GriddedSource::new(&client, ERA5_LAND_MONTHLY), primary, config)
                    .await
            }
            SourceKind::Modis => {
                explore_modis(&GriddedSource::new(&client, MODIS_SNOW), primary, config).await
            }
            SourceKind::Gridmet => {
                explore_gridmet(&GriddedSource::new(&client, GRIDMET), primary, config).await
            }
        };
        let path = write_json(&config.data_dir, kind.document(), &report.to_document())?;
        info!(
            "{}: {} (saved to {})",
            kind.name(),
            report.status.describe(),
            path.display()
        );
        reports.push(report);
    }

    let summary = merge(&reports);
    if only.is_empty() {
        let path = write_json(&config.data_dir, SUMMARY_FILE, &summary)?;
        info!("Summary saved to {}", path.display());
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests::WeatherSource;
    use async_trait::async_trait;
    use snow_data::summary::SourceStatus;
    use snow_source::observation::{RawSeries, SeriesPoint};

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn config() -> SnowConfig {
        SnowConfig {
            first_year: 2001,
            last_year: 2004,
            sample_year: 2003,
            ..SnowConfig::default()
        }
    }

    /// A gridded source answering every band with one value per day
    /// (`daily`) or one per month (`monthly`).
    struct GridSource {
        name: &'static str,
        bands: Vec<&'static str>,
        monthly: bool,
        coverage: Option<DateRange>,
        value: fn(&str, NaiveDate) -> Option<f64>,
    }

    #[async_trait]
    impl TimeSeriesSource for GridSource {
        fn name(&self) -> &str {
            self.name
        }

        async fn coverage(&self) -> Result<Option<DateRange>, SourceError> {
            Ok(self.coverage)
        }

        async fn catalogue(&self, _entity: &Entity) -> Result<Vec<String>, SourceError> {
            Ok(self.bands.iter().map(|s| s.to_string()).collect())
        }

        async fn query(
            &self,
            variable: &str,
            entity: &Entity,
            range: &DateRange,
        ) -> Result<RawSeries, SourceError> {
            if entity.id == "Broken" {
                return Err(SourceError::unavailable(self.name, "Too many concurrent aggregations."));
            }
            let points = range
                .days()
                .filter(|date| !self.monthly || date.day() == 1)
                .map(|date| SeriesPoint {
                    date,
                    value: (self.value)(variable, date),
                })
                .collect();
            Ok(RawSeries {
                unit: String::new(),
                points,
            })
        }
    }

    #[test]
    fn test_snow_related_bands() {
        let bands: Vec<String> = ["snowfall_sum", "temperature_2m", "snow_depth", "lake_ice_depth"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(
            snow_related_bands(&bands),
            vec!["snowfall_sum", "snow_depth", "lake_ice_depth"]
        );
    }

    #[test]
    fn test_season_to_date() {
        let window = SeasonWindow::default();
        assert_eq!(
            season_to_date(&window, day(2025, 2, 24)),
            DateRange::new(day(2024, 9, 1), day(2025, 2, 24))
        );
        // Summer: the previous season, clipped to its window.
        assert_eq!(
            season_to_date(&window, day(2025, 7, 4)),
            DateRange::new(day(2024, 9, 1), day(2025, 2, 28))
        );
        assert_eq!(
            season_to_date(&window, day(2025, 10, 2)),
            DateRange::new(day(2025, 9, 1), day(2025, 10, 2))
        );
    }

    #[tokio::test]
    async fn test_daymet_report() {
        let config = config();
        let report =
            explore_daymet(&WeatherSource, &Entity::point("A", -106.5, 39.5), &config).await;
        assert_eq!(report.status, SourceStatus::Ok);
        assert_eq!(report.date_range, DateRange::years(1980, 2024));
        assert_eq!(report.key_variables.len(), 7);

        let doc = report.to_document();
        assert_eq!(doc["annual_snowfall_mm"]["2001"], 1.0);
        assert_eq!(doc["annual_snowfall_mm"]["2004"], 4.0);
        assert_eq!(doc["means"]["full"]["mean"], 2.5);
        assert_eq!(doc["means"]["windows"][0]["years_used"], 4);
        assert_eq!(doc["trend"]["slope_per_decade"], 10.0);
        assert_eq!(doc["monthly_snow_2003"]["1"], 3.0);
        assert_eq!(doc["monthly_snow_2003"]["7"], 0.0);
        assert_eq!(doc["peak_month"], 1);
    }

    #[tokio::test]
    async fn test_failed_source_keeps_report() {
        let report = explore_daymet(
            &WeatherSource,
            &Entity::point("C", -121.5, 46.8),
            &config(),
        )
        .await;
        assert!(matches!(
            &report.status,
            SourceStatus::Failed { kind, .. } if kind == "SourceUnavailable"
        ));
        // Coverage and bands were read before the failing query.
        assert!(report.date_range.is_some());
        assert!(report.to_document()["error"]
            .as_str()
            .unwrap()
            .contains("Computation timed out."));
    }

    #[tokio::test]
    async fn test_gridmet_counts_in_kelvin() {
        let source = GridSource {
            name: "gridMET",
            bands: vec!["pr", "tmmn", "tmmx"],
            monthly: false,
            coverage: DateRange::years(1979, 2025),
            value: |variable, date| match variable {
                // Freezing in January and February only.
                "tmmn" if date.month() <= 2 => Some(265.0),
                "tmmn" => Some(280.0),
                "pr" if date.day() == 1 => Some(4.0),
                "pr" => Some(0.0),
                _ => None,
            },
        };
        let report = explore_gridmet(&source, &Entity::point("Rockies", -106.5, 39.5), &config()).await;
        assert_eq!(report.status, SourceStatus::Ok);
        let doc = report.to_document();
        assert_eq!(doc["daily_count_2003"], 365);
        assert_eq!(doc["freezing_days"], 59);
        assert_eq!(doc["estimated_snow_days"], 2);
        assert_eq!(doc["estimated_snowfall_mm"], 8.0);
    }

    #[tokio::test]
    async fn test_era5_monthly_rollup_and_trend() {
        let source = GridSource {
            name: "ERA5-Land",
            bands: vec!["temperature_2m", "snowfall_sum", "snow_depth", "snowfall_max"],
            monthly: true,
            coverage: DateRange::years(2001, 2004),
            value: |variable, date| match variable {
                "snowfall_sum" => Some(0.001 * (date.year() - 2000) as f64),
                _ => Some(9.0),
            },
        };
        let report = explore_era5(&source, &Entity::point("Rockies", -106.5, 39.5), &config()).await;
        assert_eq!(report.status, SourceStatus::Ok);
        assert_eq!(
            report.key_variables,
            vec!["snowfall_sum", "snow_depth", "snowfall_max"]
        );
        let doc = report.to_document();
        assert_eq!(doc["timeseries_count"], 48);
        let total_2002 = doc["annual_totals"]["2002"].as_f64().unwrap();
        assert!((total_2002 - 0.024).abs() < 1e-12);
        let slope = doc["trend_slope_per_decade_m"].as_f64().unwrap();
        assert!((slope - 0.12).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_era5_without_snow_band() {
        let source = GridSource {
            name: "ERA5-Land",
            bands: vec!["temperature_2m"],
            monthly: true,
            coverage: None,
            value: |_, _| Some(1.0),
        };
        let report = explore_era5(&source, &Entity::point("Rockies", 0.0, 0.0), &config()).await;
        assert!(matches!(
            &report.status,
            SourceStatus::Failed { kind, .. } if kind == "VariableNotFound"
        ));
    }

    #[tokio::test]
    async fn test_modis_seasons() {
        let source = GridSource {
            name: "MODIS Snow",
            bands: vec!["NDSI_Snow_Cover", "Snow_Albedo_Daily_Tile"],
            monthly: false,
            coverage: DateRange::years(2000, 2025),
            // Snow cover from November through February.
            value: |_, date| Some(if date.month() >= 11 || date.month() <= 2 { 80.0 } else { 10.0 }),
        };
        let report = explore_modis(&source, &Entity::point("Rockies", -106.5, 39.5), &config()).await;
        assert_eq!(report.status, SourceStatus::Ok);
        let doc = report.to_document();
        assert_eq!(doc["timeseries_2003_count"], 365);
        // Jan + Feb + Nov + Dec of 2003.
        assert_eq!(doc["snow_days_by_year"]["2003"], 31.0 + 28.0 + 30.0 + 31.0);
        let seasons = doc["seasons"].as_array().unwrap();
        let season_2001 = seasons
            .iter()
            .find(|s| s["season_year"] == 2001)
            .unwrap();
        assert_eq!(season_2001["onset"], "2001-11-01");
        assert_eq!(season_2001["melt"], "2002-02-28");
        // Only the seasons opening 1999 through 2002 lie wholly inside the
        // five calendar years fetched.
        let years: Vec<i64> = seasons
            .iter()
            .map(|s| s["season_year"].as_i64().unwrap())
            .collect();
        assert_eq!(years, vec![1999, 2000, 2001, 2002]);
        assert_eq!(doc["onset_trend"]["n_points"], 4);
        // Same climate every year, so onset never moves.
        assert_eq!(doc["onset_trend"]["slope_per_decade"], 0.0);
    }

    #[tokio::test]
    async fn test_snodas_points_and_season() {
        let source = GridSource {
            name: "SNODAS",
            bands: vec!["SWE", "Snow_Depth"],
            monthly: false,
            coverage: DateRange::new(day(2003, 9, 30), day(2025, 2, 24)),
            value: |variable, _| match variable {
                "SWE" => Some(120.0),
                _ => Some(900.0),
            },
        };
        let points = vec![
            Entity::point("Rockies", -106.5, 39.5),
            Entity::point("Broken", 0.0, 0.0),
        ];
        let report = explore_snodas(&source, &points, &config()).await;
        assert_eq!(report.status, SourceStatus::Ok);
        let doc = report.to_document();
        assert_eq!(doc["latest_date"], "2025-02-24");
        assert_eq!(doc["point_values"]["Rockies"]["SWE"], 120.0);
        assert_eq!(doc["point_values"]["Rockies"]["Snow_Depth"], 900.0);
        assert_eq!(doc["point_values"]["Broken"]["error"], "SourceUnavailable");
        assert!(doc["point_values"]["Broken"]["reason"]
            .as_str()
            .unwrap()
            .contains("Too many concurrent aggregations."));
        // 2024-09-01 through 2025-02-24.
        assert_eq!(doc["season_swe_count"], 177);
        assert_eq!(doc["season_swe_sample"].as_array().unwrap().len(), 6);
    }

    /// Station feed with SWE for the first station only.
    struct StationSource;

    #[async_trait]
    impl TimeSeriesSource for StationSource {
        fn name(&self) -> &str {
            "SNOTEL"
        }

        async fn catalogue(&self, _entity: &Entity) -> Result<Vec<String>, SourceError> {
            Ok(vec![
                "Snow Water Equivalent (in) Start of Day Values".to_string(),
                "Precipitation Accumulation (in) Start of Day Values".to_string(),
            ])
        }

        async fn query(
            &self,
            _variable: &str,
            entity: &Entity,
            range: &DateRange,
        ) -> Result<RawSeries, SourceError> {
            match entity.id.as_str() {
                "Berthoud_Summit_CO" => Ok(RawSeries {
                    unit: "in".to_string(),
                    points: range
                        .days()
                        .enumerate()
                        .map(|(i, date)| SeriesPoint {
                            date,
                            value: Some(if i < 100 { i as f64 / 10.0 } else { 5.0 }),
                        })
                        .collect(),
                }),
                "Mammoth_Pass_CA" => Ok(RawSeries {
                    unit: "in".to_string(),
                    points: vec![SeriesPoint {
                        date: range.end,
                        value: None,
                    }],
                }),
                _ => Err(SourceError::unavailable("SNOTEL", "bad response for 791:WA:SNTL: 503")),
            }
        }
    }

    #[tokio::test]
    async fn test_snotel_per_station_markers() {
        let config = SnowConfig {
            snotel_days: 150,
            ..SnowConfig::default()
        };
        let today = day(2025, 2, 24);
        let report =
            explore_snotel(&StationSource, &config.station_entities(), &config, today).await;
        assert_eq!(report.status, SourceStatus::Ok);
        let doc = report.to_document();
        let berthoud = &doc["Berthoud_Summit_CO"];
        assert_eq!(berthoud["station"], "335:CO:SNTL");
        assert_eq!(berthoud["records"], 151);
        assert_eq!(berthoud["peak_swe_in"], 9.9);
        assert_eq!(berthoud["current_swe_in"], 5.0);
        assert_eq!(berthoud["current_date"], "2025-02-24");
        assert_eq!(doc["Mammoth_Pass_CA"]["error"], "InsufficientData");
        assert_eq!(doc["Mammoth_Pass_CA"]["reason"], "No valid SWE values");
        assert_eq!(doc["Stevens_Pass_WA"]["error"], "SourceUnavailable");
        assert!(doc["Stevens_Pass_WA"]["reason"].as_str().unwrap().contains("503"));
        assert_eq!(
            report.key_variables,
            vec!["Snow Water Equivalent (in) Start of Day Values"]
        );
    }

    #[tokio::test]
    async fn test_snotel_all_failed() {
        let config = SnowConfig::default();
        let stations = vec![Entity::station("Stevens_Pass_WA", "791:WA:SNTL")];
        let report = explore_snotel(&StationSource, &stations, &config, day(2025, 2, 24)).await;
        assert!(matches!(report.status, SourceStatus::Failed { .. }));
    }
}
