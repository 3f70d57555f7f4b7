//! Configuration validation command.

use std::path::PathBuf;

use clap::Args;

use super::load_config;

#[derive(Args)]
pub struct CheckConfigArgs {
    /// Configuration file (TOML)
    #[arg(value_name = "FILE")]
    file: PathBuf,
}

pub fn run(args: CheckConfigArgs) -> anyhow::Result<()> {
    let config = load_config(Some(&args.file))?;
    println!("{}: OK", args.file.display());
    println!("  sample_rate      {}", config.sample_rate);
    println!("  block_size       {}", config.block_size);
    println!("  num_channels     {}", config.num_channels);
    println!("  num_buses        {}", config.num_buses);
    println!("  num_input_buses  {}", config.num_input_buses);
    Ok(())
}
