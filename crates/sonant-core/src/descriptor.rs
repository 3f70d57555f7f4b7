//! Node descriptors: the already-resolved graph description the engine
//! consumes.
//!
//! A [`NodeDescriptor`] names a generator type, an optional rate and lookup
//! name, its inputs, and a free-form [`Options`] bag. Inputs can be scalars,
//! arrays, nested descriptors, or handles to nodes that already exist.
//!
//! ```rust
//! use sonant_core::{NodeDescriptor, Rate};
//!
//! let voice = NodeDescriptor::new("out")
//!     .input("sources", NodeDescriptor::new("sinOsc")
//!         .named("carrier")
//!         .input("freq", 440.0)
//!         .input("mul", 0.25))
//!     .input("bus", 0.0);
//!
//! assert_eq!(voice.ugen, "out");
//! assert_eq!(voice.inputs.len(), 2);
//! ```

use std::collections::BTreeMap;

use crate::node::NodeId;
use crate::rate::Rate;

/// One option value.
#[derive(Debug, Clone, PartialEq)]
pub enum OptionValue {
    /// A number.
    Number(f64),
    /// A flag.
    Bool(bool),
    /// A string.
    Text(String),
    /// A list of samples.
    List(Vec<f32>),
}

impl From<f64> for OptionValue {
    fn from(v: f64) -> Self {
        OptionValue::Number(v)
    }
}

impl From<f32> for OptionValue {
    fn from(v: f32) -> Self {
        OptionValue::Number(f64::from(v))
    }
}

impl From<i32> for OptionValue {
    fn from(v: i32) -> Self {
        OptionValue::Number(f64::from(v))
    }
}

impl From<u32> for OptionValue {
    fn from(v: u32) -> Self {
        OptionValue::Number(f64::from(v))
    }
}

impl From<usize> for OptionValue {
    fn from(v: usize) -> Self {
        OptionValue::Number(v as f64)
    }
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        OptionValue::Bool(v)
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        OptionValue::Text(v.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(v: String) -> Self {
        OptionValue::Text(v)
    }
}

impl From<Vec<f32>> for OptionValue {
    fn from(v: Vec<f32>) -> Self {
        OptionValue::List(v)
    }
}

impl From<&[f32]> for OptionValue {
    fn from(v: &[f32]) -> Self {
        OptionValue::List(v.to_vec())
    }
}

/// Free-form generator configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options {
    values: BTreeMap<String, OptionValue>,
}

impl Options {
    /// Create an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, replacing any previous one.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<OptionValue>) {
        self.values.insert(key.into(), value.into());
    }

    /// Raw lookup.
    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.values.get(key)
    }

    /// Numeric option. Booleans read as 0/1.
    pub fn number(&self, key: &str) -> Option<f64> {
        match self.values.get(key)? {
            OptionValue::Number(n) => Some(*n),
            OptionValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Numeric option as `f32`.
    pub fn f32(&self, key: &str) -> Option<f32> {
        self.number(key).map(|n| n as f32)
    }

    /// Non-negative integer option. Negative or non-finite numbers read as `None`.
    pub fn usize(&self, key: &str) -> Option<usize> {
        self.number(key)
            .filter(|n| n.is_finite() && *n >= 0.0)
            .map(|n| n as usize)
    }

    /// Flag option. Numbers read as true when positive.
    pub fn bool(&self, key: &str) -> Option<bool> {
        match self.values.get(key)? {
            OptionValue::Bool(b) => Some(*b),
            OptionValue::Number(n) => Some(*n > 0.0),
            _ => None,
        }
    }

    /// Text option.
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.values.get(key)? {
            OptionValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// List option. A single number reads as a one-element list.
    pub fn list(&self, key: &str) -> Option<Vec<f32>> {
        match self.values.get(key)? {
            OptionValue::List(l) => Some(l.clone()),
            OptionValue::Number(n) => Some(vec![*n as f32]),
            _ => None,
        }
    }

    /// Number of options.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the bag is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// A value assigned to an input.
#[derive(Debug, Clone, PartialEq)]
pub enum InputDef {
    /// Wrapped into a constant-rate `value` node.
    Scalar(f32),
    /// Wrapped into a constant-rate multi-channel `value` node.
    Array(Vec<f32>),
    /// A nested node to build.
    Node(Box<NodeDescriptor>),
    /// A node that already exists (shared sub-graph).
    Existing(NodeId),
}

impl From<f32> for InputDef {
    fn from(v: f32) -> Self {
        InputDef::Scalar(v)
    }
}

impl From<f64> for InputDef {
    fn from(v: f64) -> Self {
        InputDef::Scalar(v as f32)
    }
}

impl From<Vec<f32>> for InputDef {
    fn from(v: Vec<f32>) -> Self {
        InputDef::Array(v)
    }
}

impl From<&[f32]> for InputDef {
    fn from(v: &[f32]) -> Self {
        InputDef::Array(v.to_vec())
    }
}

impl From<NodeDescriptor> for InputDef {
    fn from(v: NodeDescriptor) -> Self {
        InputDef::Node(Box::new(v))
    }
}

impl From<NodeId> for InputDef {
    fn from(v: NodeId) -> Self {
        InputDef::Existing(v)
    }
}

/// Description of a node and its input tree.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDescriptor {
    /// Generator type identifier.
    pub ugen: String,
    /// Requested rate; the generator's default when `None`.
    pub rate: Option<Rate>,
    /// Optional lookup name.
    pub name: Option<String>,
    /// Input assignments in declaration order of the descriptor.
    pub inputs: Vec<(String, InputDef)>,
    /// Generator options.
    pub options: Options,
}

impl NodeDescriptor {
    /// Descriptor for generator type `ugen`.
    pub fn new(ugen: impl Into<String>) -> Self {
        Self {
            ugen: ugen.into(),
            rate: None,
            name: None,
            inputs: Vec::new(),
            options: Options::new(),
        }
    }

    /// A constant `value` node.
    pub fn value(value: f32) -> Self {
        Self::new("value").option("value", value)
    }

    /// Set the lookup name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the rate.
    pub fn rate(mut self, rate: Rate) -> Self {
        self.rate = Some(rate);
        self
    }

    /// Assign an input, replacing an earlier assignment with the same name.
    pub fn input(mut self, name: impl Into<String>, value: impl Into<InputDef>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.inputs.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.inputs.push((name, value)),
        }
        self
    }

    /// Set an option.
    pub fn option(mut self, key: impl Into<String>, value: impl Into<OptionValue>) -> Self {
        self.options.insert(key, value);
        self
    }

    /// Look up an input assignment.
    pub fn get_input(&self, name: &str) -> Option<&InputDef> {
        self.inputs.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}
