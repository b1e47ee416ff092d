//! Per-region forecast runner.
//!
//! Reads aggregated per-region CSVs, runs the configured model family for
//! each, and writes one forecast CSV per region. Failed regions emit a
//! single diagnostic line on stderr and no output file; the exit code is
//! non-zero if any region failed.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use dfense_forecast::calendar::ValidationWindow;
use dfense_forecast::config::{ClimateMode, ModelConfig, ModelFamily, SarimaxOrders};
use dfense_forecast::io::{load_aggregated_csv, save_forecast_csv};
use dfense_forecast::pipeline::run_region;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModelArg {
    Clidengo,
    Sarimax,
    Arp,
}

impl From<ModelArg> for ModelFamily {
    fn from(arg: ModelArg) -> Self {
        match arg {
            ModelArg::Clidengo => ModelFamily::Clidengo,
            ModelArg::Sarimax => ModelFamily::Sarimax,
            ModelArg::Arp => ModelFamily::Arp,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ClimateModeArg {
    T,
    Tp,
    Tph,
}

impl From<ClimateModeArg> for ClimateMode {
    fn from(arg: ClimateModeArg) -> Self {
        match arg {
            ClimateModeArg::T => ClimateMode::T,
            ClimateModeArg::Tp => ClimateMode::TP,
            ClimateModeArg::Tph => ClimateMode::TPH,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "dfense", about = "Weekly dengue incidence forecasts per region")]
struct Cli {
    /// Aggregated per-region CSV files; the file stem names the region.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory receiving one `<region>_forecast.csv` per region.
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Final data year the validation windows are anchored to.
    #[arg(long)]
    final_year: i32,

    /// Validation window fixing the forecast origin.
    #[arg(long, default_value = "T3")]
    window: String,

    /// Model family.
    #[arg(long, value_enum, default_value_t = ModelArg::Clidengo)]
    model: ModelArg,

    /// Climate modulation mode for the growth model.
    #[arg(long, value_enum, default_value_t = ClimateModeArg::Tph)]
    climate_mode: ClimateModeArg,

    /// Monte-Carlo seed.
    #[arg(long, default_value_t = 30_081_984)]
    seed: u64,

    /// Forecast ensemble size for the growth model.
    #[arg(long, default_value_t = 1024)]
    n_real: usize,

    /// Manual SARIMAX orders as `p,d,q,P,D,Q`.
    #[arg(long)]
    sarimax_orders: Option<String>,

    /// Allow SARIMAX to add additive-outlier intervention dummies.
    #[arg(long)]
    intervention: bool,
}

fn parse_orders(text: &str) -> Result<SarimaxOrders> {
    let parts: Vec<usize> = text
        .split(',')
        .map(|p| p.trim().parse::<usize>())
        .collect::<std::result::Result<_, _>>()
        .with_context(|| format!("invalid SARIMAX orders '{text}'"))?;
    anyhow::ensure!(
        parts.len() == 6,
        "SARIMAX orders need six components, got {}",
        parts.len()
    );
    Ok(SarimaxOrders::new(
        parts[0], parts[1], parts[2], parts[3], parts[4], parts[5],
    ))
}

fn region_config(cli: &Cli, region: &str) -> Result<ModelConfig> {
    let window: ValidationWindow = cli.window.parse()?;
    let mut config = ModelConfig::new(region, window, cli.final_year)
        .with_model(cli.model.into())
        .with_climate_mode(cli.climate_mode.into())
        .with_seed(cli.seed);
    config.n_real_forecast = cli.n_real;
    config.intervention = cli.intervention;
    if let Some(text) = &cli.sarimax_orders {
        config = config.with_sarimax_orders(parse_orders(text)?);
    }
    Ok(config)
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    std::fs::create_dir_all(&cli.output_dir)
        .with_context(|| format!("creating output dir {}", cli.output_dir.display()))?;

    let mut any_failed = false;
    for input in &cli.inputs {
        let region = input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();
        let config = region_config(&cli, &region)?;

        let records = match load_aggregated_csv(input) {
            Ok(records) => records,
            Err(error) => {
                eprintln!("region={region} component=ingest: {error}");
                any_failed = true;
                continue;
            }
        };

        match run_region(&config, &records, None) {
            Ok(rows) => {
                let path = cli.output_dir.join(format!("{region}_forecast.csv"));
                if let Err(error) = save_forecast_csv(&path, &rows) {
                    eprintln!("region={region} component=writer: {error}");
                    any_failed = true;
                    continue;
                }
                info!(region, path = %path.display(), "forecast written");
            }
            Err(failure) => {
                eprintln!("{failure}");
                any_failed = true;
            }
        }
    }

    Ok(if any_failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
