//! Sonant Ugens - the built-in unit-generator library
//!
//! Every generator here implements [`sonant_core::UnitGenerator`] and is
//! registered under its type identifier by [`register_builtins`]. Nodes get
//! `mul`/`add`, rate handling, and input wiring from the core; the code in
//! this crate is only the per-family signal algorithm.
//!
//! # Families
//!
//! | Module | Type identifiers |
//! |--------|------------------|
//! | [`oscillator`] | `osc`, `sinOsc`, `triOsc`, `sawOsc`, `squareOsc`, `sin`, `lfSaw`, `lfPulse`, `impulse` |
//! | [`noise`] | `whiteNoise`, `lfNoise`, `pinkNoise`, `dust`, `random` |
//! | [`envelope`] | `line`, `xLine`, `asr` |
//! | [`buffer`] | `playBuffer`, `readBuffer`, `writeBuffer`, `bufferDuration`, `bufferLength` |
//! | [`granular`] | `triggerGrains` |
//! | [`distortion`] | `tanh`, `distortion`, `clip`, `foldback`, `deJonge`, `tarrabiaDeJong` |
//! | [`math`] | `math` |
//! | [`control`] | `sequence`, `sequencer`, `change` |
//! | [`bus`] | `out`, `in` |
//!
//! # Example
//!
//! ```rust
//! use sonant_core::{Environment, EnvironmentConfig, NodeDescriptor, Position};
//!
//! let mut env = Environment::new(EnvironmentConfig::default(), sonant_ugens::registry()).unwrap();
//! let voice = NodeDescriptor::new("out").input(
//!     "sources",
//!     NodeDescriptor::new("sinOsc").input("freq", 440.0).input("mul", 0.25),
//! );
//! env.add(&voice, Position::Tail).unwrap();
//! env.generate(64);
//! assert!(env.bus(0).unwrap().iter().any(|&s| s != 0.0));
//! ```

pub mod buffer;
pub mod bus;
pub mod control;
pub mod distortion;
pub mod envelope;
pub mod granular;
pub mod math;
pub mod noise;
pub mod oscillator;

mod options;

use sonant_core::UgenRegistry;

/// Register every built-in generator.
pub fn register_builtins(registry: &mut UgenRegistry) {
    oscillator::register(registry);
    noise::register(registry);
    envelope::register(registry);
    buffer::register(registry);
    granular::register(registry);
    distortion::register(registry);
    math::register(registry);
    control::register(registry);
    bus::register(registry);
}

/// A registry holding `value` and every built-in generator.
pub fn registry() -> UgenRegistry {
    let mut registry = UgenRegistry::new();
    register_builtins(&mut registry);
    registry
}
