//! What to export, where to, and in which format.

use serde::{Deserialize, Serialize};
use snow_source::entity::Region;
use snow_utils::dates::SeasonWindow;

pub const DEFAULT_CRS: &str = "EPSG:4326";
pub const DEFAULT_MAX_PIXELS: f64 = 1e10;

/// Server-side recipe for the raster to export. The remote service
/// evaluates it per pixel; nothing here runs locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RasterRecipe {
    /// Mean over years of each year's maximum of `band`.
    MeanAnnualMax {
        collection: String,
        band: String,
        first_year: i32,
        last_year: i32,
    },
    /// Mean over years of each year's total of `band`.
    MeanAnnualSum {
        collection: String,
        band: String,
        first_year: i32,
        last_year: i32,
    },
    /// Mean over years of precipitation summed on freezing days.
    MeanAnnualSnowfallProxy {
        collection: String,
        precipitation_band: String,
        temperature_band: String,
        freezing_point: f64,
        first_year: i32,
        last_year: i32,
    },
    /// Per-pixel OLS slope of the annual snowfall proxy, times ten.
    SnowfallProxyTrend {
        collection: String,
        precipitation_band: String,
        temperature_band: String,
        freezing_point: f64,
        first_year: i32,
        last_year: i32,
    },
    /// Per-pixel OLS slope of the annual total of `band`, times ten.
    AnnualSumTrend {
        collection: String,
        band: String,
        first_year: i32,
        last_year: i32,
    },
    /// Per-pixel OLS slope of the first day-of-year in each season window
    /// where `band` exceeds `threshold`, times ten.
    SnowOnsetTrend {
        collection: String,
        band: String,
        threshold: f64,
        window: SeasonWindow,
        first_year: i32,
        last_year: i32,
    },
}

impl RasterRecipe {
    /// Name of the single band in the exported raster.
    pub fn output_band(&self) -> &'static str {
        match self {
            RasterRecipe::MeanAnnualMax { .. } => "max_swe",
            RasterRecipe::MeanAnnualSum { .. } | RasterRecipe::MeanAnnualSnowfallProxy { .. } => {
                "avg_snowfall"
            }
            RasterRecipe::SnowfallProxyTrend { .. } | RasterRecipe::AnnualSumTrend { .. } => {
                "trend_per_decade"
            }
            RasterRecipe::SnowOnsetTrend { .. } => "onset_trend_per_decade",
        }
    }

    pub fn years(&self) -> (i32, i32) {
        match self {
            RasterRecipe::MeanAnnualMax {
                first_year,
                last_year,
                ..
            }
            | RasterRecipe::MeanAnnualSum {
                first_year,
                last_year,
                ..
            }
            | RasterRecipe::MeanAnnualSnowfallProxy {
                first_year,
                last_year,
                ..
            }
            | RasterRecipe::SnowfallProxyTrend {
                first_year,
                last_year,
                ..
            }
            | RasterRecipe::AnnualSumTrend {
                first_year,
                last_year,
                ..
            }
            | RasterRecipe::SnowOnsetTrend {
                first_year,
                last_year,
                ..
            } => (*first_year, *last_year),
        }
    }
}

/// Cloud storage target. Objects land under `{prefix}/{name}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    pub bucket: String,
    pub object_prefix: String,
}

impl Destination {
    pub fn new(bucket: &str, prefix: &str, name: &str) -> Self {
        let prefix = prefix.trim_end_matches('/');
        let object_prefix = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{prefix}/{name}")
        };
        Destination {
            bucket: bucket.to_string(),
            object_prefix,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFormat {
    pub file_format: FileFormat,
    pub cloud_optimized: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileFormat {
    GeoTIFF,
}

impl OutputFormat {
    pub const COG: OutputFormat = OutputFormat {
        file_format: FileFormat::GeoTIFF,
        cloud_optimized: true,
    };
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRequest {
    pub description: String,
    pub raster: RasterRecipe,
    pub region: Region,
    pub scale_meters: f64,
    pub destination: Destination,
    pub output_format: OutputFormat,
    pub crs: String,
    pub max_pixels: f64,
}

impl ExportRequest {
    /// A COG export in `EPSG:4326` with the default pixel limit.
    pub fn cog(
        description: &str,
        raster: RasterRecipe,
        region: Region,
        scale_meters: f64,
        destination: Destination,
    ) -> Self {
        ExportRequest {
            description: description.to_string(),
            raster,
            region,
            scale_meters,
            destination,
            output_format: OutputFormat::COG,
            crs: DEFAULT_CRS.to_string(),
            max_pixels: DEFAULT_MAX_PIXELS,
        }
    }

    /// Checks done before anything is sent.
    pub fn validate(&self) -> Result<(), String> {
        self.region.validate()?;
        if !(self.scale_meters.is_finite() && self.scale_meters > 0.0) {
            return Err(format!("scale must be positive, got {}", self.scale_meters));
        }
        if self.destination.bucket.trim().is_empty() {
            return Err("destination bucket is empty".to_string());
        }
        let (first, last) = self.raster.years();
        if first > last {
            return Err(format!("year range {first}..{last} is empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snow_source::entity::CONUS;

    fn recipe() -> RasterRecipe {
        RasterRecipe::MeanAnnualMax {
            collection: "NASA/ORNL/DAYMET_V4".to_string(),
            band: "swe".to_string(),
            first_year: 2020,
            last_year: 2024,
        }
    }

    #[test]
    fn test_destination_prefix() {
        assert_eq!(
            Destination::new("snow-tracker-cogs", "cogs/", "daymet").object_prefix,
            "cogs/daymet"
        );
        assert_eq!(Destination::new("b", "", "daymet").object_prefix, "daymet");
    }

    #[test]
    fn test_cog_defaults() {
        let request = ExportRequest::cog(
            "demo",
            recipe(),
            CONUS,
            1000.0,
            Destination::new("bucket", "cogs", "demo"),
        );
        assert_eq!(request.crs, "EPSG:4326");
        assert_eq!(request.max_pixels, 1e10);
        assert!(request.output_format.cloud_optimized);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_requests() {
        let mut request = ExportRequest::cog(
            "demo",
            recipe(),
            CONUS,
            1000.0,
            Destination::new("bucket", "cogs", "demo"),
        );
        request.region.west = 200.0;
        assert!(request.validate().is_err());

        request.region = CONUS;
        request.scale_meters = 0.0;
        assert!(request.validate().is_err());

        request.scale_meters = 500.0;
        request.destination.bucket = String::new();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_recipe_wire_shape() {
        let json = serde_json::to_value(recipe()).unwrap();
        assert_eq!(json["op"], "mean_annual_max");
        assert_eq!(json["band"], "swe");
        assert_eq!(recipe().output_band(), "max_swe");
    }
}
