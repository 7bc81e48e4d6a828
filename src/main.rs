//! Specforge CLI entry point.

use clap::Parser;

use specforge::cli::{commands, handle_error, Cli, Commands};
use specforge::infrastructure::logging::LoggerImpl;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match commands::load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };

    let _logger = match LoggerImpl::init(&config.logging) {
        Ok(logger) => logger,
        Err(err) => handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Init(args) => commands::init::execute(args, cli.json).await,
        Commands::Serve(args) => commands::serve::execute(args, &config).await,
        Commands::Session(args) => commands::session::execute(args, &config, cli.json).await,
        Commands::Rules(args) => commands::rules::execute(args, &config, cli.json).await,
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
