//! Sonant CLI - offline rendering and inspection for the sonant engine.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sonant")]
#[command(author, version, about = "Sonant synthesis engine CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a demo patch offline and print level statistics
    Render(commands::render::RenderArgs),

    /// List registered unit generators
    List(commands::list::ListArgs),

    /// Load and validate an engine configuration file
    CheckConfig(commands::check_config::CheckConfigArgs),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render(args) => commands::render::run(args),
        Commands::List(args) => commands::list::run(args),
        Commands::CheckConfig(args) => commands::check_config::run(args),
    }
}
