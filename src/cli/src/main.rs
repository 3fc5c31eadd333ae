use anyhow::Context;
use clap::Parser;
use perfcap_cli::commands::Cli;
use perfcap_cli::handlers;
use perfcap_cli::logging::setup_logging;
use perfcap_client::config::ConfigLoader;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config =
        ConfigLoader::load_config(cli.config.as_deref()).context("failed to load configuration")?;
    setup_logging()?;

    tokio::runtime::Runtime::new()?.block_on(handlers::dispatch(cli.command, config))
}
