mod cli;
mod commands;
mod manifests;
mod output;

use anyhow::Result;
use clap::Parser;
use secretforge_controller::config::loader::load_config_with_default_path;
use secretforge_controller::observability::{apply_logging, init_tracing};

use cli::{Cli, Commands};
use output::print_error;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // Quiet until the configured level is known.
    init_tracing(if cli.verbose { "debug" } else { "warn" });

    let config = load_config_with_default_path(cli.config.as_ref())?;
    if !cli.verbose {
        apply_logging(&config.logging);
    }
    let format = cli.format.unwrap_or_default();

    match &cli.command {
        Commands::Render(args) => commands::render::render(args, &config, format).await?,
        Commands::Reconcile(args) => {
            commands::reconcile::reconcile(args, &config, format).await?;
        }
        Commands::CheckConfig => {
            let source = cli.config.as_ref().map(|p| p.display().to_string());
            commands::config::check_config(&config, source.as_deref())?;
        }
    }

    Ok(())
}
