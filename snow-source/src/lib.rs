//! Core types and source adapters for snow observations.
//!
//! Gridded image collections and point station feeds are both normalized
//! into [`time_series::TimeSeries`] values keyed by entity and variable.
//! The remote clients live behind the `api` feature.

pub mod concept;
pub mod date_range;
pub mod entity;
pub mod error;
pub mod observation;
pub mod source;
pub mod station_feed;
pub mod time_series;

#[cfg(feature = "api")]
pub mod client;
#[cfg(feature = "api")]
pub mod gridded;
#[cfg(feature = "api")]
pub mod snotel;

pub use error::SourceError;
