//! CLI command implementations.

pub mod check_config;
pub mod list;
pub mod render;

use std::path::Path;

use anyhow::Context;
use sonant_core::EnvironmentConfig;

/// Load `path`, or the default configuration when none is given.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<EnvironmentConfig> {
    let config = match path {
        Some(path) => EnvironmentConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => EnvironmentConfig::default(),
    };
    tracing::info!(
        sample_rate = config.sample_rate,
        block_size = config.block_size,
        num_channels = config.num_channels,
        num_buses = config.num_buses,
        "engine config"
    );
    Ok(config)
}
