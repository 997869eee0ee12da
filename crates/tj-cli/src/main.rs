use std::io;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};

use tj_cli::commands::{clients, init, sync};
use tj_cli::{Cli, Commands, Config, logging};

fn load_config(cli: &Cli) -> Result<Config> {
    let config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_format, &cli.log_output)?;

    let mut stdout = io::stdout().lock();
    match &cli.command {
        Some(Commands::Sync(args)) => {
            let config = load_config(&cli)?;
            let path = tj_cli::config_path(cli.config.as_deref())?;
            sync::run(&mut stdout, args, &config, &path)?;
        }
        Some(Commands::Init { force }) => {
            let path = tj_cli::config_path(cli.config.as_deref())?;
            init::run(&mut stdout, &path, *force)?;
        }
        Some(Commands::Clients) => {
            let config = load_config(&cli)?;
            clients::run(&mut stdout, &config)?;
        }
        None => {
            Cli::command().print_help()?;
        }
    }

    Ok(())
}
