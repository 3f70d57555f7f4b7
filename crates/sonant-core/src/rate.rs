//! Signal rates.
//!
//! A node's [`Rate`] decides how often it recomputes its output and how long its
//! output buffer is. Consumers derive a per-input *stride* from the producer's
//! rate: audio-rate producers are read sample by sample, every other rate is
//! read at index 0 and held for the whole block.

use core::fmt;

/// How often a node recomputes its output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Rate {
    /// Computed once at creation (and again only when its value is replaced).
    Constant,
    /// Computed once per block.
    Control,
    /// Computed once per sample.
    #[default]
    Audio,
    /// Advanced only when explicitly pulled by a trigger.
    Demand,
}

impl Rate {
    /// Stride a consumer uses when reading a producer at this rate.
    ///
    /// Audio-rate producers advance one element per output sample; every other
    /// rate holds index 0 for the whole block.
    #[inline]
    pub const fn stride(self) -> usize {
        match self {
            Rate::Audio => 1,
            _ => 0,
        }
    }

    /// Length of an output buffer for a node at this rate.
    #[inline]
    pub const fn buffer_len(self, block_size: usize) -> usize {
        match self {
            Rate::Audio => {
                if block_size == 0 {
                    1
                } else {
                    block_size
                }
            }
            _ => 1,
        }
    }

    /// Returns true for audio rate.
    #[inline]
    pub const fn is_audio(self) -> bool {
        matches!(self, Rate::Audio)
    }

    /// Lowercase name of the rate.
    pub const fn name(self) -> &'static str {
        match self {
            Rate::Constant => "constant",
            Rate::Control => "control",
            Rate::Audio => "audio",
            Rate::Demand => "demand",
        }
    }

    /// Parse a rate name.
    ///
    /// Accepts the long names plus the conventional short forms
    /// (`ir`/`scalar`, `kr`, `ar`, `dr`).
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "constant" | "scalar" | "ir" => Some(Rate::Constant),
            "control" | "kr" => Some(Rate::Control),
            "audio" | "ar" => Some(Rate::Audio),
            "demand" | "dr" => Some(Rate::Demand),
            _ => None,
        }
    }
}

impl fmt::Display for Rate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
