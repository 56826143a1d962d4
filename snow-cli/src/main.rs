//! Snow CLI - Command line tool for exploring snow and climate datasets.

use clap::Parser;
use log::debug;
use snow_cmd::config::SnowConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "snow-cli",
    version,
    about = "Snow and climate data toolkit"
)]
struct Cli {
    /// JSON config file; built-in defaults are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: snow_cmd::Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = SnowConfig::load(cli.config.as_deref())?;
    debug!("data directory: {}", config.data_dir.display());
    snow_cmd::run(cli.command, &config).await
}
