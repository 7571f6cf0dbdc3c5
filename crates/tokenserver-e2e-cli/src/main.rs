mod cli;
mod commands;
mod output;

use anyhow::{Context, Result};
use clap::Parser;

use cli::{Cli, Commands};
use output::print_error;
use tokenserver_e2e::config::loader::load_config;
use tokenserver_e2e::observability::init_tracing;

#[tokio::main]
async fn main() {
    // .env is optional; anything else wrong with it is worth a warning
    if let Err(e) = dotenvy::dotenv()
        && !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
    {
        eprintln!("Warning: Failed to load .env file: {e}");
    }

    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    let format = cli.format.unwrap_or_default();

    match &cli.command {
        Commands::Run => {
            let cfg = load_config(cli.config.as_deref())
                .map_err(anyhow::Error::msg)
                .context("loading configuration")?;
            init_tracing(&cfg.logging);
            commands::run::run(cfg, format).await?;
            output::print_success("no scenario failed");
        }
        Commands::ShowConfig => {
            let cfg = load_config(cli.config.as_deref())
                .map_err(anyhow::Error::msg)
                .context("loading configuration")?;
            let value = serde_json::to_value(&cfg)?;
            output::print_json(&output::redact_config(value));
        }
        Commands::DeriveSecret(args) => commands::secrets::derive_secret(args, format)?,
        Commands::InspectToken(args) => commands::token::inspect_token(args, format)?,
        Commands::HashUid(args) => commands::secrets::hash_uid(args, format)?,
    }

    Ok(())
}
