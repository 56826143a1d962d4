//! SNOTEL station reports fetched over HTTP.

use crate::{
    date_range::DateRange,
    entity::{Entity, Geometry},
    error::SourceError,
    observation::RawSeries,
    source::TimeSeriesSource,
    station_feed::{report_url, StationTable, DEFAULT_ELEMENTS, REPORT_BASE_URL},
};
use async_trait::async_trait;
use chrono::{Duration, Local};
use log::info;
use reqwest::Client;

const SOURCE_NAME: &str = "SNOTEL";

/// Daily station reports from the SNOTEL report generator.
pub struct SnotelSource {
    http: Client,
    base_url: String,
    elements: Vec<&'static str>,
}

impl SnotelSource {
    pub fn new(http: Client) -> Self {
        SnotelSource {
            http,
            base_url: REPORT_BASE_URL.to_string(),
            elements: DEFAULT_ELEMENTS.to_vec(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    fn station_code<'e>(&self, entity: &'e Entity) -> Result<&'e str, SourceError> {
        match &entity.geometry {
            Geometry::Station { code } => Ok(code),
            _ => Err(SourceError::MalformedSeries {
                entity_id: entity.id.clone(),
                reason: "SNOTEL entities must be stations".to_string(),
            }),
        }
    }

    /// Download and parse one report.
    pub async fn fetch_table(
        &self,
        entity: &Entity,
        range: &DateRange,
    ) -> Result<StationTable, SourceError> {
        let code = self.station_code(entity)?;
        let url = report_url(&self.base_url, code, range, &self.elements);
        info!("Fetching SNOTEL report for {} ({})", entity.id, code);
        let response = self
            .http
            .get(&url)
            .header("User-Agent", "Mozilla/5.0")
            .send()
            .await
            .map_err(|e| SourceError::unavailable(SOURCE_NAME, e.to_string()))?;
        if !response.status().is_success() {
            return Err(SourceError::unavailable(
                SOURCE_NAME,
                format!("bad response for {}: {}", code, response.status()),
            ));
        }
        let body = response
            .text()
            .await
            .map_err(|e| SourceError::unavailable(SOURCE_NAME, e.to_string()))?;
        StationTable::parse(SOURCE_NAME, &body)
    }
}

#[async_trait]
impl TimeSeriesSource for SnotelSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    /// Column names of a one-week report ending today.
    async fn catalogue(&self, entity: &Entity) -> Result<Vec<String>, SourceError> {
        let today = Local::now().naive_local().date();
        let week = DateRange {
            start: today - Duration::days(7),
            end: today,
        };
        Ok(self.fetch_table(entity, &week).await?.variables().to_vec())
    }

    async fn query(
        &self,
        variable: &str,
        entity: &Entity,
        range: &DateRange,
    ) -> Result<RawSeries, SourceError> {
        self.query_many(&[variable.to_string()], entity, range)
            .await?
            .pop()
            .ok_or_else(|| SourceError::unavailable(SOURCE_NAME, "empty report"))
    }

    /// All requested columns come from a single report.
    async fn query_many(
        &self,
        variables: &[String],
        entity: &Entity,
        range: &DateRange,
    ) -> Result<Vec<RawSeries>, SourceError> {
        let table = self.fetch_table(entity, range).await?;
        variables
            .iter()
            .map(|variable| {
                table.column(variable).ok_or_else(|| SourceError::VariableNotFound {
                    source_name: SOURCE_NAME.to_string(),
                    concept: variable.clone(),
                })
            })
            .collect()
    }
}
