//! Sonant Core - unit-generator graph and evaluation engine
//!
//! This crate provides the block-based synthesis engine: nodes wrapping unit
//! generators, the ordered node list that drives evaluation, a sample-accurate
//! scheduler, and the shared bus set. Concrete generators live in
//! `sonant-ugens`; this crate only knows the `value` generator it needs to
//! materialize constant inputs.
//!
//! # Core Abstractions
//!
//! ## Generators
//!
//! - [`UnitGenerator`] - Object-safe trait every generator implements
//! - [`UgenSpec`] / [`InputSpec`] - Static description of inputs and rates
//! - [`UgenRegistry`] - Name-to-constructor lookup with metadata
//!
//! ## Graph
//!
//! - [`NodeDescriptor`] - Declarative description of a node tree
//! - [`Graph`] - Arena of nodes addressed by generational [`NodeId`]s
//! - [`NodeList`] - Ordered evaluation sequence with a name index
//!
//! ## Runtime
//!
//! - [`Environment`] - Owns everything above and runs blocks
//! - [`Scheduler`] - Sample-accurate one-shot and repeating callbacks
//! - [`Buses`] - Shared accumulation buses
//!
//! ## Utilities
//!
//! - [`MulAdd`] - Post-processing strategy selected from input rates
//! - [`Interpolation`] - Table reads (none, linear, cubic)
//! - Math functions: [`soft_clip`], [`hard_clip`], [`foldback`], [`Rng`]
//!
//! # Example
//!
//! ```rust
//! use sonant_core::{Environment, EnvironmentConfig, NodeDescriptor, Position, UgenRegistry};
//!
//! let mut env = Environment::new(EnvironmentConfig::default(), UgenRegistry::new()).unwrap();
//! let id = env
//!     .add(&NodeDescriptor::value(0.5).named("level"), Position::Tail)
//!     .unwrap();
//! env.generate(64);
//! assert_eq!(env.output(id).unwrap()[0].first(), 0.5);
//! ```
//!
//! # Design Principles
//!
//! - **No allocation per block**: buffers are sized when nodes are built
//! - **Explicit environment**: no global state; pass `&mut Environment`
//! - **Silence over panics**: missing inputs read as zero, non-finite output is zeroed

pub mod buffer;
pub mod bus;
pub mod config;
pub mod descriptor;
pub mod environment;
pub mod error;
pub mod graph;
pub mod interpolate;
pub mod math;
pub mod mul_add;
pub mod node;
pub mod node_list;
pub mod rate;
pub mod registry;
pub mod scheduler;
pub mod ugen;
pub mod value;

// Re-export main types at crate root
pub use buffer::{BufferStore, SampleBuffer, SignalBuffer};
pub use bus::{BusAllocator, Buses};
pub use config::{EnvironmentConfig, MAX_BLOCK_SIZE};
pub use descriptor::{InputDef, NodeDescriptor, OptionValue, Options};
pub use environment::{Environment, PlayState};
pub use error::{Error, Result};
pub use graph::Graph;
pub use interpolate::Interpolation;
pub use math::{Rng, finite_or, foldback, hard_clip, lerp, soft_clip, wrap};
pub use mul_add::MulAdd;
pub use node::{Node, NodeId};
pub use node_list::{NodeList, NodeTree, Position, subtree};
pub use rate::Rate;
pub use registry::{UgenCategory, UgenConstructor, UgenDescriptor, UgenRegistry};
pub use scheduler::{Callback, Fire, HasScheduler, ScheduleHandle, Scheduler, TimeConverter, TimeUnit};
pub use ugen::{ADD, BuildContext, GenContext, InputSignal, InputSpec, Inputs, MUL, UgenSpec, UnitGenerator};
pub use value::{VALUE_SPEC, Value, build_value};
