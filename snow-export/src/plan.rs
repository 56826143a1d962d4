//! The demo set of snow map products.

use crate::request::{Destination, ExportRequest, RasterRecipe};
use snow_source::entity::{Region, CONUS, GLOBAL};
use snow_utils::dates::SeasonWindow;

const DAYMET: &str = "NASA/ORNL/DAYMET_V4";
const MODIS_SNOW: &str = "MODIS/061/MOD10A1";
const ERA5_LAND_MONTHLY: &str = "ECMWF/ERA5_LAND/MONTHLY_AGGR";

/// NDSI above which a MODIS pixel counts as snow for onset mapping.
pub const ONSET_NDSI_THRESHOLD: f64 = 40.0;

/// Six products: Daymet mean max SWE, mean snowfall and snowfall trend over
/// CONUS at 1 km; MODIS onset trend over CONUS at 500 m; ERA5-Land global
/// mean snowfall and trend at ~11 km.
pub fn demo_plan(bucket: &str, prefix: &str) -> Vec<ExportRequest> {
    let daymet_snowfall = |first_year, last_year| RasterRecipe::MeanAnnualSnowfallProxy {
        collection: DAYMET.to_string(),
        precipitation_band: "prcp".to_string(),
        temperature_band: "tmin".to_string(),
        freezing_point: 0.0,
        first_year,
        last_year,
    };
    let product = |name: &str, description: &str, raster: RasterRecipe, region: Region, scale: f64| {
        ExportRequest::cog(
            description,
            raster,
            region,
            scale,
            Destination::new(bucket, prefix, name),
        )
    };

    vec![
        product(
            "daymet_avg_max_swe_2020_2024",
            "daymet_avg_max_swe_2020_2024",
            RasterRecipe::MeanAnnualMax {
                collection: DAYMET.to_string(),
                band: "swe".to_string(),
                first_year: 2020,
                last_year: 2024,
            },
            CONUS,
            1000.0,
        ),
        product(
            "daymet_avg_annual_snowfall_2020_2024",
            "daymet_avg_annual_snowfall_2020_2024",
            daymet_snowfall(2020, 2024),
            CONUS,
            1000.0,
        ),
        product(
            "daymet_snowfall_trend_2004_2024",
            "daymet_snowfall_trend_2004_2024",
            RasterRecipe::SnowfallProxyTrend {
                collection: DAYMET.to_string(),
                precipitation_band: "prcp".to_string(),
                temperature_band: "tmin".to_string(),
                freezing_point: 0.0,
                first_year: 2004,
                last_year: 2024,
            },
            CONUS,
            1000.0,
        ),
        product(
            "modis_snow_onset_trend_2001_2024",
            "modis_snow_onset_trend_2001_2024",
            RasterRecipe::SnowOnsetTrend {
                collection: MODIS_SNOW.to_string(),
                band: "NDSI_Snow_Cover".to_string(),
                threshold: ONSET_NDSI_THRESHOLD,
                window: SeasonWindow::default(),
                first_year: 2001,
                last_year: 2023,
            },
            CONUS,
            500.0,
        ),
        product(
            "era5_avg_annual_snowfall_2020_2024_global",
            "era5_avg_snowfall_global",
            RasterRecipe::MeanAnnualSum {
                collection: ERA5_LAND_MONTHLY.to_string(),
                band: "snowfall_sum".to_string(),
                first_year: 2020,
                last_year: 2024,
            },
            GLOBAL,
            11132.0,
        ),
        product(
            "era5_snowfall_trend_2004_2024_global",
            "era5_snowfall_trend_global",
            RasterRecipe::AnnualSumTrend {
                collection: ERA5_LAND_MONTHLY.to_string(),
                band: "snowfall_sum".to_string(),
                first_year: 2004,
                last_year: 2024,
            },
            GLOBAL,
            11132.0,
        ),
    ]
}
