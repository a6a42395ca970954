use anyhow::Result;
use clap::Parser;

use larder_cli::cli::{Cli, Commands};
use larder_cli::commands::{self, Runtime};
use larder_cli::config::loader::load_config;
use larder_cli::observability::{apply_logging_level, init_tracing};
use larder_cli::output::print_error;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let config = load_config(cli.config.as_deref()).map_err(anyhow::Error::msg)?;
    apply_logging_level(&config.logging.level).map_err(anyhow::Error::msg)?;

    if matches!(cli.command, Commands::ShowConfig) {
        return commands::maintenance::show_config(&config, cli.json);
    }

    let runtime = Runtime::connect(&config).await?;
    let json = cli.json;

    match &cli.command {
        Commands::Migrate => commands::maintenance::migrate(&runtime).await?,
        Commands::Cleanup => commands::maintenance::cleanup(&runtime, json).await?,
        Commands::Sweep(args) => commands::maintenance::sweep(&runtime, args).await?,
        Commands::Stats => commands::maintenance::stats(&runtime, json).await?,
        Commands::RevokeAll(args) => commands::sessions::revoke_all(&runtime, args, json).await?,
        Commands::Check(args) => commands::sessions::check(&runtime, args, json).await?,
        Commands::Sessions(args) => commands::sessions::sessions(&runtime, args, json).await?,
        Commands::Lineage(args) => commands::sessions::lineage(&runtime, args, json).await?,
        Commands::ShowConfig => {}
    }

    Ok(())
}
