//! Environment configuration.
//!
//! [`EnvironmentConfig`] holds the recognized engine options and can be
//! loaded from TOML:
//!
//! ```toml
//! sample_rate = 48000.0
//! block_size = 128
//! num_channels = 2
//! num_buses = 16
//! num_input_buses = 2
//! ```
//!
//! Missing keys take their defaults.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Largest accepted block size.
pub const MAX_BLOCK_SIZE: usize = 8192;

/// Engine options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Sample rate in Hz.
    pub sample_rate: f32,
    /// Samples per block.
    pub block_size: usize,
    /// Output channels (the first buses).
    pub num_channels: usize,
    /// Total buses, including output and input buses.
    pub num_buses: usize,
    /// Input buses following the output buses.
    pub num_input_buses: usize,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            block_size: 64,
            num_channels: 2,
            num_buses: 8,
            num_input_buses: 2,
        }
    }
}

impl EnvironmentConfig {
    /// Parse from a TOML string and validate.
    pub fn from_toml_str(toml_str: &str) -> Result<Self> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| Error::config_read(path, e))?;
        Self::from_toml_str(&content)
    }

    /// Check the options are usable.
    pub fn validate(&self) -> Result<()> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "sample_rate must be positive, got {}",
                self.sample_rate
            )));
        }
        if self.block_size == 0 || self.block_size > MAX_BLOCK_SIZE {
            return Err(Error::InvalidConfig(format!(
                "block_size must be in 1..={MAX_BLOCK_SIZE}, got {}",
                self.block_size
            )));
        }
        if self.num_channels == 0 {
            return Err(Error::InvalidConfig("num_channels must be at least 1".to_string()));
        }
        let reserved = self.num_channels + self.num_input_buses;
        if self.num_buses < reserved {
            return Err(Error::InvalidConfig(format!(
                "num_buses ({}) must cover num_channels + num_input_buses ({reserved})",
                self.num_buses
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = EnvironmentConfig::default();
        assert_eq!(config.sample_rate, 44100.0);
        assert_eq!(config.block_size, 64);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config = EnvironmentConfig::from_toml_str("block_size = 128\nnum_buses = 12").unwrap();
        assert_eq!(config.block_size, 128);
        assert_eq!(config.num_buses, 12);
        assert_eq!(config.num_channels, 2);
    }

    #[test]
    fn invalid_values_are_rejected() {
        for toml_str in [
            "sample_rate = 0.0",
            "block_size = 0",
            "block_size = 100000",
            "num_channels = 0",
            "num_buses = 3",
        ] {
            assert!(
                matches!(EnvironmentConfig::from_toml_str(toml_str), Err(Error::InvalidConfig(_))),
                "accepted: {toml_str}"
            );
        }
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        assert!(matches!(
            EnvironmentConfig::from_toml_str("block_size = \"big\""),
            Err(Error::ConfigParse(_))
        ));
    }

    #[test]
    fn load_missing_file_is_read_error() {
        assert!(matches!(
            EnvironmentConfig::load("/nonexistent/sonant.toml"),
            Err(Error::ConfigRead { .. })
        ));
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.toml");
        std::fs::write(&path, "sample_rate = 48000.0\nnum_channels = 1").unwrap();
        let config = EnvironmentConfig::load(&path).unwrap();
        assert_eq!(config.sample_rate, 48000.0);
        assert_eq!(config.num_channels, 1);
    }
}
