//! Data processing for snow observations.
//!
//! This crate turns raw variable series into snow metrics, fits trends over
//! the annual results and merges per-source reports. Everything here is a
//! pure function of its inputs; fetching happens in `snow-source`.

pub mod aggregate;
pub mod error;
pub mod metrics;
pub mod summary;
pub mod trend;

pub use error::{MetricError, TrendError};
