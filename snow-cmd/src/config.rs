//! Run configuration loaded from an optional JSON file.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use snow_data::metrics::MetricConfig;
use snow_export::PollConfig;
use snow_source::{client::ApiConfig, entity::Entity};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedPoint {
    pub name: String,
    pub lon: f64,
    pub lat: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedStation {
    pub name: String,
    /// Station triplet, e.g. "335:CO:SNTL".
    pub triplet: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    pub bucket: String,
    pub prefix: String,
    #[serde(flatten)]
    pub poll: PollConfig,
}

impl Default for ExportConfig {
    fn default() -> Self {
        ExportConfig {
            bucket: "snow-tracker-cogs".to_string(),
            prefix: "cogs".to_string(),
            poll: PollConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnowConfig {
    pub api: ApiConfig,
    pub metrics: MetricConfig,
    pub export: ExportConfig,
    /// Sample points; the first one is used for single-point exploration.
    pub points: Vec<NamedPoint>,
    pub snotel_stations: Vec<NamedStation>,
    pub data_dir: PathBuf,
    pub first_year: i32,
    pub last_year: i32,
    /// Year used for the single-year daily breakdowns.
    pub sample_year: i32,
    /// Trailing days requested from station feeds.
    pub snotel_days: i64,
}

impl Default for SnowConfig {
    fn default() -> Self {
        let point = |name: &str, lon, lat| NamedPoint {
            name: name.to_string(),
            lon,
            lat,
        };
        let station = |name: &str, triplet: &str| NamedStation {
            name: name.to_string(),
            triplet: triplet.to_string(),
        };
        SnowConfig {
            api: ApiConfig::default(),
            metrics: MetricConfig::default(),
            export: ExportConfig::default(),
            points: vec![
                point("Rockies", -106.5, 39.5),
                point("Sierra", -120.0, 38.5),
                point("Cascades", -121.5, 46.8),
                point("Great_Lakes", -85.5, 46.0),
                point("Northeast", -72.0, 44.0),
            ],
            snotel_stations: vec![
                station("Berthoud_Summit_CO", "335:CO:SNTL"),
                station("Mammoth_Pass_CA", "574:CA:SNTL"),
                station("Stevens_Pass_WA", "791:WA:SNTL"),
            ],
            data_dir: PathBuf::from("data"),
            first_year: 1980,
            last_year: 2024,
            sample_year: 2023,
            snotel_days: 150,
        }
    }
}

impl SnowConfig {
    /// Read `path`, or use the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<SnowConfig> {
        let Some(path) = path else {
            return Ok(SnowConfig::default());
        };
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: SnowConfig = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.points.is_empty() {
            anyhow::bail!("config lists no sample points");
        }
        if self.first_year > self.last_year {
            anyhow::bail!(
                "first_year {} is after last_year {}",
                self.first_year,
                self.last_year
            );
        }
        if self.snotel_days <= 0 {
            anyhow::bail!("snotel_days must be positive");
        }
        Ok(())
    }

    pub fn point_entities(&self) -> Vec<Entity> {
        self.points
            .iter()
            .map(|p| Entity::point(&p.name, p.lon, p.lat))
            .collect()
    }

    pub fn station_entities(&self) -> Vec<Entity> {
        self.snotel_stations
            .iter()
            .map(|s| Entity::station(&s.name, &s.triplet))
            .collect()
    }
}
