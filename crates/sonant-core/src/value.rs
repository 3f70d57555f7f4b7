//! The `value` generator: wraps scalars and arrays into nodes.

use crate::buffer::SignalBuffer;
use crate::error::{Error, Result};
use crate::rate::Rate;
use crate::ugen::{BuildContext, GenContext, Inputs, UgenSpec, UnitGenerator};

/// Spec for `value`. Constant by default; control rate allows per-block
/// updates through `set_value`.
pub static VALUE_SPEC: UgenSpec = UgenSpec {
    id: "value",
    inputs: &[],
    rates: &[Rate::Constant, Rate::Control, Rate::Audio],
    default_rate: Rate::Constant,
};

/// Holds one value per output channel.
#[derive(Debug, Clone)]
pub struct Value {
    values: Vec<f32>,
}

impl Value {
    /// Create a value node holding `values` (one channel each, at least one).
    pub fn new(values: Vec<f32>) -> Self {
        let values = if values.is_empty() { vec![0.0] } else { values };
        Self { values }
    }

    /// Current values.
    pub fn values(&self) -> &[f32] {
        &self.values
    }
}

impl UnitGenerator for Value {
    fn generate(&mut self, ctx: &mut GenContext<'_>, _inputs: &Inputs<'_>, outputs: &mut [SignalBuffer]) {
        let n = ctx.num_samples;
        for (out, &v) in outputs.iter_mut().zip(&self.values) {
            out[..n].fill(v);
        }
    }

    fn num_outputs(&self) -> usize {
        self.values.len()
    }

    fn set_value(&mut self, value: &[f32]) -> bool {
        if value.len() != self.values.len() {
            return false;
        }
        self.values.copy_from_slice(value);
        true
    }
}

/// Registry constructor for `value`. Reads option `value` (number or list).
pub fn build_value(ctx: &BuildContext<'_>) -> Result<Box<dyn UnitGenerator>> {
    let values = match ctx.options.get("value") {
        None => vec![0.0],
        Some(_) => ctx
            .options
            .list("value")
            .ok_or_else(|| Error::invalid_option("value", "value", "expected a number or a list"))?,
    };
    if values.is_empty() {
        return Err(Error::invalid_option("value", "value", "list must not be empty"));
    }
    Ok(Box::new(Value::new(values)))
}
