use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod config;
mod drive;
mod error;
mod generate;
mod hexagons;
mod migrate;
mod photos;
mod responses;
mod template;
mod types;
mod utils;
mod workflow;

use config::{Config, DEFAULT_CONFIG_FILE};

#[derive(Parser)]
#[command(name = "slam-book")]
#[command(about = "Turn survey responses into a slam book website")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (CONL); defaults apply when it does not exist
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Quiet mode - suppress per-record progress output
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Download every respondent's photo from Google Drive and convert it to WebP
    Images,
    /// Generate one slam page per respondent
    Pages,
    /// Generate the combined slam book (main_slam_book.html)
    Aggregate,
    /// Generate the beehive index page (index.html)
    Index,
    /// Generate one hexagon card per answered question (hexagons/)
    Hexagons,
    /// Point JPEG/PNG photo references in generated pages at their WebP files
    Migrate,
    /// Run every step in order and report per-step status
    All,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Images => {
            let report = photos::run_images(&config, cli.quiet)?;
            if report.is_total_failure() {
                bail!("No photos could be fetched ({} failed)", report.failed.len());
            }
        }
        Commands::Pages => {
            generate::run_pages(&config, cli.quiet)?;
        }
        Commands::Aggregate => {
            generate::run_aggregate(&config, cli.quiet)?;
        }
        Commands::Index => {
            generate::run_index(&config, cli.quiet)?;
        }
        Commands::Hexagons => {
            hexagons::run_hexagons(&config, cli.quiet)?;
        }
        Commands::Migrate => {
            migrate::run_migrate(&config, cli.quiet)?;
        }
        Commands::All => {
            if workflow::run_all(&config, cli.quiet)?.is_failure() {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
