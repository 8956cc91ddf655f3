//! Command-line interface.

pub mod commands;
pub mod input;
pub mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;

use commands::check_mapping::CheckMappingArgs;
use commands::neighbors::NeighborsArgs;
use commands::run::RunArgs;

#[derive(Parser, Debug)]
#[command(name = "mapsmith")]
#[command(about = "Generate, validate and correct payload/record mapping functions", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file used instead of .mapsmith/config.yaml
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Plan, write and correct every artifact
    Run(RunArgs),
    /// Check a field mapping list against an entity schema
    CheckMapping(CheckMappingArgs),
    /// Show neighbor offers and check generated calls against them
    Neighbors(NeighborsArgs),
}

/// Load configuration from `path`, or the project hierarchy when unset.
pub fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

/// Print an error the way the selected output mode expects and exit.
pub fn handle_error(err: anyhow::Error, json: bool) -> ! {
    if json {
        let body = serde_json::json!({
            "error": err.to_string(),
            "causes": err.chain().skip(1).map(ToString::to_string).collect::<Vec<_>>(),
        });
        eprintln!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1);
}
