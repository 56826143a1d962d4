//! Gridded image collections sampled at points or regions.

use crate::{
    client::{RemoteClient, RemoteError},
    date_range::DateRange,
    entity::{Entity, Geometry},
    error::SourceError,
    observation::RawSeries,
    source::TimeSeriesSource,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A remote image collection and the scale it is sampled at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Collection {
    pub name: &'static str,
    pub id: &'static str,
    pub scale_meters: f64,
}

pub const DAYMET: Collection = Collection {
    name: "Daymet V4",
    id: "NASA/ORNL/DAYMET_V4",
    scale_meters: 1000.0,
};

/// Temperatures are in Kelvin.
pub const GRIDMET: Collection = Collection {
    name: "gridMET",
    id: "IDAHO_EPSCOR/GRIDMET",
    scale_meters: 4000.0,
};

/// Monthly aggregates; one value per month.
pub const ERA5_LAND_MONTHLY: Collection = Collection {
    name: "ERA5-Land",
    id: "ECMWF/ERA5_LAND/MONTHLY_AGGR",
    scale_meters: 11132.0,
};

pub const MODIS_SNOW: Collection = Collection {
    name: "MODIS Snow",
    id: "MODIS/061/MOD10A1",
    scale_meters: 500.0,
};

pub const SNODAS: Collection = Collection {
    name: "SNODAS",
    id: "projects/climate-engine/snodas/daily",
    scale_meters: 1000.0,
};

pub const ALL_COLLECTIONS: &[Collection] = &[SNODAS, DAYMET, ERA5_LAND_MONTHLY, MODIS_SNOW, GRIDMET];

#[derive(Debug, Deserialize)]
struct BandsResponse {
    bands: Vec<String>,
}

#[derive(Debug, Serialize)]
struct SampleRequest<'a> {
    band: &'a str,
    geometry: Value,
    start: chrono::NaiveDate,
    end: chrono::NaiveDate,
    scale_meters: f64,
}

/// One image collection on the remote service, read through a shared client.
pub struct GriddedSource<'a> {
    client: &'a RemoteClient,
    collection: Collection,
}

impl<'a> GriddedSource<'a> {
    pub fn new(client: &'a RemoteClient, collection: Collection) -> Self {
        GriddedSource { client, collection }
    }

    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    fn unavailable(&self, e: RemoteError) -> SourceError {
        SourceError::unavailable(self.collection.name, e.to_string())
    }

    fn path(&self, suffix: &str) -> String {
        format!("v1/collections/{}{}", self.collection.id, suffix)
    }

    /// Band names of the collection.
    pub async fn bands(&self) -> Result<Vec<String>, SourceError> {
        let response: BandsResponse = self
            .client
            .get_json(&self.path("/bands"))
            .await
            .map_err(|e| self.unavailable(e))?;
        Ok(response.bands)
    }
}

#[async_trait]
impl<'a> TimeSeriesSource for GriddedSource<'a> {
    fn name(&self) -> &str {
        self.collection.name
    }

    /// First and last image dates of the collection.
    async fn coverage(&self) -> Result<Option<DateRange>, SourceError> {
        let range: DateRange = self
            .client
            .get_json(&self.path("/coverage"))
            .await
            .map_err(|e| self.unavailable(e))?;
        Ok(Some(range))
    }

    async fn catalogue(&self, _entity: &Entity) -> Result<Vec<String>, SourceError> {
        self.bands().await
    }

    async fn query(
        &self,
        variable: &str,
        entity: &Entity,
        range: &DateRange,
    ) -> Result<RawSeries, SourceError> {
        if let Geometry::Station { code } = &entity.geometry {
            return Err(SourceError::MalformedSeries {
                entity_id: entity.id.clone(),
                reason: format!("station '{code}' has no coordinates to sample"),
            });
        }
        let request = SampleRequest {
            band: variable,
            geometry: entity.geometry.to_geojson(),
            start: range.start,
            end: range.end,
            scale_meters: self.collection.scale_meters,
        };
        self.client
            .post_json(&self.path(":sample"), &request)
            .await
            .map_err(|e| self.unavailable(e))
    }
}
