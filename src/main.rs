//! mapsmith CLI entry point.

use clap::Parser;

use mapsmith::cli::{self, Cli, Commands};
use mapsmith::infrastructure::logging::LoggerImpl;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match cli::load_config(cli.config.as_ref()) {
        Ok(config) => config,
        Err(err) => cli::handle_error(err, cli.json),
    };
    let _logger = match LoggerImpl::init(&config.logging) {
        Ok(logger) => logger,
        Err(err) => cli::handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Run(args) => cli::commands::run::execute(args, config, cli.json).await,
        Commands::CheckMapping(args) => cli::commands::check_mapping::execute(args, cli.json).await,
        Commands::Neighbors(args) => cli::commands::neighbors::execute(args, cli.json).await,
    };

    if let Err(err) = result {
        cli::handle_error(err, cli.json);
    }
}
