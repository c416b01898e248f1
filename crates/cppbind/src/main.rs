use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::{LevelFilter, info};

use cppbind::{config::PackageConfig, declarations::DeclarationModel, output};

#[derive(Parser, Debug)]
#[command(name = "cppbind")]
#[command(about = "Generate pybind11 registration code from a C++ declaration model")]
#[command(version)]
struct Cli {
    /// Declaration model (JSON)
    #[arg(short, long)]
    model: PathBuf,

    /// Package configuration (TOML)
    #[arg(short, long)]
    config: PathBuf,

    /// Output directory, replaced on success
    #[arg(short, long)]
    output: PathBuf,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();

    let model = DeclarationModel::load(&cli.model)
        .with_context(|| format!("Failed to load declaration model {}", cli.model.display()))?;
    let config = PackageConfig::load(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;

    let package = cppbind::generate(&model, &config)
        .with_context(|| format!("Failed to generate package {}", config.name))?;
    let manifest = output::publish(&package, &cli.output)
        .with_context(|| format!("Failed to publish to {}", cli.output.display()))?;

    info!(
        "Generated {} files for package {}",
        manifest.len(),
        config.name
    );
    Ok(())
}
