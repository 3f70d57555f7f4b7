//! Generator registry keyed by type identifier.
//!
//! The registry maps a descriptor's `ugen` string to a constructor and the
//! generator's static [`UgenSpec`]. Node kinds are resolved once, at build
//! time; nothing dispatches on type names during `generate`.
//!
//! A fresh [`UgenRegistry::new`] knows only the core `value` generator. The
//! `sonant-ugens` crate fills in the built-in library.
//!
//! # Example
//!
//! ```rust
//! use sonant_core::{UgenCategory, UgenRegistry};
//!
//! let registry = UgenRegistry::new();
//! assert!(registry.contains("value"));
//!
//! for descriptor in registry.in_category(UgenCategory::Value) {
//!     println!("{}: {}", descriptor.id(), descriptor.description);
//! }
//! ```

use crate::error::{Error, Result};
use crate::ugen::{BuildContext, UgenSpec, UnitGenerator};
use crate::value::{VALUE_SPEC, build_value};

/// Category of generator for organization and filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UgenCategory {
    /// Periodic waveform generators
    Oscillator,
    /// Random and stochastic sources
    Noise,
    /// Ramps and envelopes
    Envelope,
    /// Sample-buffer readers and writers
    Buffer,
    /// Grain-based playback
    Granular,
    /// Stateless waveshapers
    Distortion,
    /// Arithmetic on signals
    Math,
    /// Sequencing and timed changes
    Control,
    /// Bus readers and writers
    Bus,
    /// Constant values
    Value,
}

impl UgenCategory {
    /// All categories in display order.
    pub const ALL: [UgenCategory; 10] = [
        UgenCategory::Oscillator,
        UgenCategory::Noise,
        UgenCategory::Envelope,
        UgenCategory::Buffer,
        UgenCategory::Granular,
        UgenCategory::Distortion,
        UgenCategory::Math,
        UgenCategory::Control,
        UgenCategory::Bus,
        UgenCategory::Value,
    ];

    /// Returns a human-readable name for the category.
    pub const fn name(&self) -> &'static str {
        match self {
            UgenCategory::Oscillator => "Oscillator",
            UgenCategory::Noise => "Noise",
            UgenCategory::Envelope => "Envelope",
            UgenCategory::Buffer => "Buffer",
            UgenCategory::Granular => "Granular",
            UgenCategory::Distortion => "Distortion",
            UgenCategory::Math => "Math",
            UgenCategory::Control => "Control",
            UgenCategory::Bus => "Bus",
            UgenCategory::Value => "Value",
        }
    }

    /// Returns a description of the category.
    pub const fn description(&self) -> &'static str {
        match self {
            UgenCategory::Oscillator => "Table-lookup and direct-computation oscillators",
            UgenCategory::Noise => "White, pink, stepped, and distribution-based noise",
            UgenCategory::Envelope => "Line segments and gated envelopes",
            UgenCategory::Buffer => "Interpolated buffer playback and recording",
            UgenCategory::Granular => "Triggered grains from a fixed-size pool",
            UgenCategory::Distortion => "Stateless per-sample waveshapers",
            UgenCategory::Math => "Binary arithmetic on signals",
            UgenCategory::Control => "Sequences and sample-accurate changes",
            UgenCategory::Bus => "Reading from and writing to shared buses",
            UgenCategory::Value => "Constant and block-rate values",
        }
    }

    /// Parse a category name, case-insensitively.
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|c| c.name().eq_ignore_ascii_case(name.trim()))
    }
}

/// Describes a generator in the registry.
#[derive(Debug, Clone)]
pub struct UgenDescriptor {
    /// Human-readable name.
    pub name: &'static str,
    /// Brief description of the generator.
    pub description: &'static str,
    /// Category for organization.
    pub category: UgenCategory,
    /// Inputs, rates, and type identifier.
    pub spec: &'static UgenSpec,
}

impl UgenDescriptor {
    /// Type identifier (registry key).
    pub fn id(&self) -> &'static str {
        self.spec.id
    }
}

/// Constructor function type for creating generators.
pub type UgenConstructor = fn(&BuildContext<'_>) -> Result<Box<dyn UnitGenerator>>;

/// Internal entry in the registry.
struct RegistryEntry {
    descriptor: UgenDescriptor,
    constructor: UgenConstructor,
}

/// Registry of available generator types.
pub struct UgenRegistry {
    entries: Vec<RegistryEntry>,
}

impl Default for UgenRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl UgenRegistry {
    /// Create a registry holding only the core `value` generator.
    pub fn new() -> Self {
        let mut registry = Self {
            entries: Vec::with_capacity(48),
        };
        registry.register(
            UgenDescriptor {
                name: "Value",
                description: "Constant value, one channel per element",
                category: UgenCategory::Value,
                spec: &VALUE_SPEC,
            },
            build_value,
        );
        registry
    }

    /// Register a generator, replacing any entry with the same identifier.
    pub fn register(&mut self, descriptor: UgenDescriptor, constructor: UgenConstructor) {
        let entry = RegistryEntry {
            descriptor,
            constructor,
        };
        match self
            .entries
            .iter_mut()
            .find(|e| e.descriptor.id() == entry.descriptor.id())
        {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    /// All registered descriptors.
    pub fn all(&self) -> Vec<&UgenDescriptor> {
        self.entries.iter().map(|e| &e.descriptor).collect()
    }

    /// Descriptors in a category.
    pub fn in_category(&self, category: UgenCategory) -> Vec<&UgenDescriptor> {
        self.entries
            .iter()
            .filter(|e| e.descriptor.category == category)
            .map(|e| &e.descriptor)
            .collect()
    }

    /// Descriptor for a type identifier.
    pub fn descriptor(&self, id: &str) -> Option<&UgenDescriptor> {
        self.entry(id).map(|e| &e.descriptor)
    }

    /// Spec for a type identifier.
    pub fn spec(&self, id: &str) -> Option<&'static UgenSpec> {
        self.entry(id).map(|e| e.descriptor.spec)
    }

    /// Whether a type identifier is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.entry(id).is_some()
    }

    /// Construct a generator.
    pub fn build(&self, id: &str, ctx: &BuildContext<'_>) -> Result<Box<dyn UnitGenerator>> {
        let entry = self
            .entry(id)
            .ok_or_else(|| Error::UnknownUgen(id.to_string()))?;
        (entry.constructor)(ctx)
    }

    /// Number of registered generators.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, id: &str) -> Option<&RegistryEntry> {
        self.entries.iter().find(|e| e.descriptor.id() == id)
    }
}
