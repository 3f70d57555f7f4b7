//! Binary arithmetic on signals.

use sonant_core::{
    BuildContext, Error, GenContext, InputSpec, Inputs, Rate, Result, SignalBuffer, UgenCategory, UgenDescriptor,
    UgenRegistry, UgenSpec, UnitGenerator,
};

/// Spec for `math`.
pub static MATH_SPEC: UgenSpec = UgenSpec {
    id: "math",
    inputs: &[InputSpec::new("source", 0.0), InputSpec::new("operand", 0.0)],
    rates: &[Rate::Audio, Rate::Control],
    default_rate: Rate::Audio,
};

/// Operator applied by [`Math`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MathOp {
    /// `source + operand`
    #[default]
    Add,
    /// `source - operand`
    Sub,
    /// `source * operand`
    Mul,
    /// `source / operand`, 0 when `operand` is 0.
    Div,
    /// Larger of the two.
    Max,
    /// Smaller of the two.
    Min,
}

impl MathOp {
    /// Parse an operator name.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "add" => Some(MathOp::Add),
            "sub" => Some(MathOp::Sub),
            "mul" => Some(MathOp::Mul),
            "div" => Some(MathOp::Div),
            "max" => Some(MathOp::Max),
            "min" => Some(MathOp::Min),
            _ => None,
        }
    }

    /// Apply the operator.
    #[inline]
    pub fn apply(self, a: f32, b: f32) -> f32 {
        match self {
            MathOp::Add => a + b,
            MathOp::Sub => a - b,
            MathOp::Mul => a * b,
            MathOp::Div => {
                if b == 0.0 {
                    0.0
                } else {
                    a / b
                }
            }
            MathOp::Max => a.max(b),
            MathOp::Min => a.min(b),
        }
    }
}

/// `source <op> operand`, sample by sample.
#[derive(Debug, Clone)]
pub struct Math {
    op: MathOp,
}

impl UnitGenerator for Math {
    fn generate(&mut self, ctx: &mut GenContext<'_>, inputs: &Inputs<'_>, out: &mut [SignalBuffer]) {
        let (source, operand) = (inputs.get(0), inputs.get(1));
        for i in 0..ctx.num_samples {
            out[0][i] = self.op.apply(source.at(i), operand.at(i));
        }
    }
}

fn build_math(ctx: &BuildContext<'_>) -> Result<Box<dyn UnitGenerator>> {
    let op = match ctx.options.get("op") {
        None => MathOp::default(),
        Some(_) => ctx
            .options
            .text("op")
            .and_then(MathOp::parse)
            .ok_or_else(|| Error::invalid_option(ctx.spec.id, "op", "expected add, sub, mul, div, max or min"))?,
    };
    Ok(Box::new(Math { op }))
}

/// Register the math family.
pub fn register(registry: &mut UgenRegistry) {
    registry.register(
        UgenDescriptor {
            name: "Math",
            description: "Binary arithmetic between two signals",
            category: UgenCategory::Math,
            spec: &MATH_SPEC,
        },
        build_math,
    );
}
