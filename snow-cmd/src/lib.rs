//! Command implementations for the snow tracker CLI.
//!
//! Provides subcommands for exploring the snow and climate sources,
//! rebuilding the cross-source summary, fitting snowfall trends and
//! running raster export jobs.

use anyhow::Context;
use clap::Subcommand;
use log::info;
use serde::Serialize;
use snow_source::{
    client::RemoteClient,
    date_range::DateRange,
    gridded::{GriddedSource, DAYMET},
};
use std::path::{Path, PathBuf};

pub mod config;
pub mod error;
pub mod explore;
pub mod export;
pub mod pipeline;
pub mod summarize;

use config::SnowConfig;
use explore::SourceKind;

pub const TRENDS_FILE: &str = "snowfall_trends.json";

#[derive(Subcommand)]
pub enum Command {
    /// Sample every source at the configured points and write one JSON
    /// document per source plus the merged summary
    Explore {
        /// Only explore these sources (repeatable); skips the summary
        #[arg(short, long, value_enum)]
        source: Vec<SourceKind>,
    },

    /// Rebuild the summary from the documents already in the data directory
    Summarize,

    /// Fit the annual snowfall trend at every sample point from Daymet
    Trend {
        #[arg(long)]
        first_year: Option<i32>,

        #[arg(long)]
        last_year: Option<i32>,

        /// Output path (defaults to the data directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Submit the COG exports and poll them until they finish
    Export {
        /// Submit only; do not wait for the jobs
        #[arg(long)]
        no_wait: bool,
    },

    /// Cancel an export job by its handle
    CancelExport { job_id: String },
}

/// Pretty-print `value` to `dir/file`, creating `dir` if needed.
pub fn write_json<T: Serialize + ?Sized>(
    dir: &Path,
    file: &str,
    value: &T,
) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(file);
    let text = serde_json::to_string_pretty(value)?;
    std::fs::write(&path, text).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

async fn run_trend(
    config: &SnowConfig,
    first_year: i32,
    last_year: i32,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let range = DateRange::years(first_year, last_year)
        .ok_or_else(|| anyhow::anyhow!("invalid year span {first_year}..{last_year}"))?;
    let client = RemoteClient::new(&config.api)?;
    let daymet = GriddedSource::new(&client, DAYMET);
    let results = pipeline::run_trend_pipeline(
        &daymet,
        &config.point_entities(),
        &range,
        &config.metrics,
    )
    .await;

    let path = match output {
        Some(path) => {
            let dir = path.parent().unwrap_or_else(|| Path::new("."));
            let file = path
                .file_name()
                .and_then(|f| f.to_str())
                .ok_or_else(|| anyhow::anyhow!("invalid output path {}", path.display()))?;
            write_json(dir, file, &results)?
        }
        None => write_json(&config.data_dir, TRENDS_FILE, &results)?,
    };
    let fitted = results.values().filter(|r| r.is_value()).count();
    info!(
        "{fitted}/{} trends fitted, saved to {}",
        results.len(),
        path.display()
    );
    Ok(())
}

pub async fn run(command: Command, config: &SnowConfig) -> anyhow::Result<()> {
    match command {
        Command::Explore { source } => {
            explore::run_explore(config, &source).await?;
            Ok(())
        }
        Command::Summarize => {
            summarize::run_summarize(config)?;
            Ok(())
        }
        Command::Trend {
            first_year,
            last_year,
            output,
        } => {
            run_trend(
                config,
                first_year.unwrap_or(config.first_year),
                last_year.unwrap_or(config.last_year),
                output,
            )
            .await
        }
        Command::Export { no_wait } => export::run_export(config, !no_wait).await,
        Command::CancelExport { job_id } => export::run_cancel(config, &job_id).await,
    }
}
