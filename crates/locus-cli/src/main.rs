//! Locus CLI - Command-line interface for location extraction from papers.

use clap::Parser;
use locus_cli::commands;
use locus_cli::{Cli, Command, Config, Formatter};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> locus_cli::Result<()> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_env(|key| std::env::var(key).ok())?;

    // Determine output format
    let format = cli
        .format
        .map(Into::into)
        .unwrap_or(config.settings.format);

    // Determine color setting
    let color_enabled = !cli.no_color && config.settings.color;

    let formatter = Formatter::new(format, color_enabled);

    match cli.command {
        Command::Extract(args) => commands::execute_extract(args, &config, &formatter).await?,
        Command::Chunk(args) => commands::execute_chunk(args, &config, &formatter).await?,
        Command::Doi(args) => commands::execute_doi(args, &formatter).await?,
        Command::Metadata(args) => commands::execute_metadata(args, &config, &formatter).await?,
        Command::Config(args) => {
            commands::execute_config(args, &config, cli.config.as_deref(), &formatter).await?
        }
    }

    Ok(())
}
