//! Error types for graph construction, mutation, and configuration.
//!
//! Every fallible operation in the engine happens at construction or mutation
//! time. Once a node is live its `generate` path never returns an error: bad
//! numeric data is absorbed as silence instead.

use std::path::PathBuf;

use thiserror::Error;

use crate::node::NodeId;
use crate::rate::Rate;

/// Errors surfaced synchronously by the engine's construction and mutation APIs.
#[derive(Debug, Error)]
pub enum Error {
    /// No generator is registered under this type identifier.
    #[error("unknown unit generator type: {0}")]
    UnknownUgen(String),

    /// The descriptor names an input the generator does not declare.
    #[error("unknown input '{input}' for unit generator '{ugen}'")]
    UnknownInput {
        /// Generator type identifier.
        ugen: String,
        /// The unrecognised input name.
        input: String,
    },

    /// A required input (one without a default) was not supplied.
    #[error("missing required input '{input}' for unit generator '{ugen}'")]
    MissingInput {
        /// Generator type identifier.
        ugen: String,
        /// The missing input name.
        input: String,
    },

    /// A multi-channel node was assigned to an input that accepts fewer channels.
    #[error("input '{input}' of '{ugen}' accepts at most {max} channel(s), got {found}")]
    ChannelMismatch {
        /// Generator type identifier.
        ugen: String,
        /// Input name.
        input: String,
        /// Maximum channel count the input accepts.
        max: usize,
        /// Channel count of the node that was assigned.
        found: usize,
    },

    /// The generator cannot run at the requested rate.
    #[error("unit generator '{ugen}' does not support {rate} rate")]
    UnsupportedRate {
        /// Generator type identifier.
        ugen: String,
        /// The rejected rate.
        rate: Rate,
    },

    /// A generator option is missing or malformed.
    #[error("invalid option '{option}' for unit generator '{ugen}': {reason}")]
    InvalidOption {
        /// Generator type identifier.
        ugen: String,
        /// Option key.
        option: String,
        /// Description of the problem.
        reason: String,
    },

    /// The node handle does not refer to a live node.
    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    /// A relative insert position names a node that is not in the node list.
    #[error("position anchor {0} is not in the node list")]
    PositionNotFound(NodeId),

    /// The node is already registered in the node list and cannot be swapped in.
    #[error("node {0} is already live")]
    AlreadyLive(NodeId),

    /// Every interconnect bus has been handed out.
    #[error("no free interconnect bus (requested bus {requested}, {available} buses available)")]
    BusesExhausted {
        /// The bus index that would have been allocated.
        requested: usize,
        /// Total number of buses in the environment.
        available: usize,
    },

    /// The environment configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Failed to parse a TOML configuration document.
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Failed to read a configuration file.
    #[error("failed to read configuration file '{path}': {source}")]
    ConfigRead {
        /// Path of the file that could not be read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    /// Create an invalid-option error.
    pub fn invalid_option(
        ugen: impl Into<String>,
        option: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Error::InvalidOption {
            ugen: ugen.into(),
            option: option.into(),
            reason: reason.into(),
        }
    }

    /// Create a config-read error.
    pub fn config_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::ConfigRead {
            path: path.into(),
            source,
        }
    }
}

/// Convenience result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn missing_input_display() {
        let err = Error::MissingInput {
            ugen: "writeBuffer".to_string(),
            input: "sources".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "missing required input 'sources' for unit generator 'writeBuffer'"
        );
    }

    #[test]
    fn channel_mismatch_display() {
        let err = Error::ChannelMismatch {
            ugen: "sinOsc".to_string(),
            input: "freq".to_string(),
            max: 1,
            found: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("freq"), "got: {msg}");
        assert!(msg.contains("at most 1"), "got: {msg}");
    }

    #[test]
    fn config_read_exposes_source() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "mock");
        let err = Error::config_read("/etc/sonant.toml", io);
        assert!(err.source().is_some());
        assert!(err.to_string().contains("/etc/sonant.toml"));
    }

    #[test]
    fn invalid_option_factory() {
        let err = Error::invalid_option("osc", "table", "must not be empty");
        assert!(matches!(err, Error::InvalidOption { ref option, .. } if option == "table"));
    }
}
