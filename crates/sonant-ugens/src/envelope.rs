//! Lines and envelopes.
//!
//! Durations are in seconds. Control-rate instances advance a whole block
//! per output sample.

use libm::{expf, logf, roundf};
use sonant_core::{
    BuildContext, GenContext, InputSpec, Inputs, Rate, Result, SignalBuffer, UgenCategory, UgenDescriptor,
    UgenRegistry, UgenSpec, UnitGenerator, lerp,
};

use crate::options::{Edge, PendingRestart};

const RATES: &[Rate] = &[Rate::Audio, Rate::Control];

/// Smallest magnitude an `xLine` endpoint is clamped to.
pub const XLINE_EPSILON: f32 = 1e-6;

const LINE_INPUTS: &[InputSpec] = &[
    InputSpec::new("start", 0.0),
    InputSpec::new("end", 1.0),
    InputSpec::new("duration", 1.0),
];

/// Spec for `line`.
pub static LINE_SPEC: UgenSpec = UgenSpec {
    id: "line",
    inputs: LINE_INPUTS,
    rates: RATES,
    default_rate: Rate::Audio,
};

/// Spec for `xLine`.
pub static X_LINE_SPEC: UgenSpec = UgenSpec {
    id: "xLine",
    inputs: LINE_INPUTS,
    rates: RATES,
    default_rate: Rate::Audio,
};

/// Spec for `asr`.
pub static ASR_SPEC: UgenSpec = UgenSpec {
    id: "asr",
    inputs: &[
        InputSpec::new("gate", 0.0),
        InputSpec::new("start", 0.0),
        InputSpec::new("attack", 0.01),
        InputSpec::new("sustain", 1.0),
        InputSpec::new("release", 1.0),
    ],
    rates: RATES,
    default_rate: Rate::Audio,
};

fn samples_per_output(ctx: &BuildContext<'_>) -> f32 {
    if ctx.rate.is_audio() { 1.0 } else { ctx.block_size as f32 }
}

/// Output steps covering `seconds`, at least one.
fn steps(seconds: f32, steps_per_second: f32) -> u64 {
    let steps = roundf(seconds * steps_per_second);
    if steps.is_finite() && steps >= 1.0 { steps as u64 } else { 1 }
}

// ---------------------------------------------------------------------------
// Line / XLine
// ---------------------------------------------------------------------------

/// Curve shape of a [`Line`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Curve {
    /// Straight-line interpolation.
    Linear,
    /// Constant ratio per step.
    Exponential,
}

/// Moves from `start` to `end` over `duration` seconds, then holds `end`.
///
/// The last step of the ramp lands exactly on `end`.
#[derive(Debug, Clone)]
pub struct Line {
    curve: Curve,
    step: u64,
    steps_per_second: f32,
    restart: PendingRestart,
}

impl Line {
    #[inline]
    fn value(&self, start: f32, end: f32, total: u64) -> f32 {
        let (start, end) = match self.curve {
            Curve::Linear => (start, end),
            Curve::Exponential => (start.max(XLINE_EPSILON), end.max(XLINE_EPSILON)),
        };
        if self.step + 1 >= total {
            return end;
        }
        let t = self.step as f32 / (total - 1) as f32;
        match self.curve {
            Curve::Linear => lerp(start, end, t),
            Curve::Exponential => start * expf(logf(end / start) * t),
        }
    }
}

impl UnitGenerator for Line {
    fn generate(&mut self, ctx: &mut GenContext<'_>, inputs: &Inputs<'_>, out: &mut [SignalBuffer]) {
        let (start, end, duration) = (inputs.get(0), inputs.get(1), inputs.get(2));
        let restart = self.restart.take(ctx.num_samples);
        for i in 0..ctx.num_samples {
            if restart == Some(i) {
                self.step = 0;
            }
            let total = steps(duration.at(i), self.steps_per_second);
            out[0][i] = self.value(start.at(i), end.at(i), total);
            self.step = self.step.saturating_add(1);
        }
    }

    fn trigger_at(&mut self, offset: usize) -> bool {
        self.restart.set(offset);
        true
    }
}

fn build_line(ctx: &BuildContext<'_>) -> Result<Box<dyn UnitGenerator>> {
    let curve = if ctx.spec.id == X_LINE_SPEC.id {
        Curve::Exponential
    } else {
        Curve::Linear
    };
    Ok(Box::new(Line {
        curve,
        step: 0,
        steps_per_second: ctx.sample_rate / samples_per_output(ctx),
        restart: PendingRestart::default(),
    }))
}

// ---------------------------------------------------------------------------
// ASR
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Idle,
    Attack,
    Sustain,
    Release,
}

/// Attack-sustain-release envelope driven by `gate`.
///
/// A rising gate restarts the attack from the current level; a falling gate
/// releases toward `start` from wherever the envelope is.
#[derive(Debug, Clone)]
pub struct Asr {
    stage: Stage,
    level: f32,
    /// Level the current segment started from.
    from: f32,
    step: u64,
    gate: Edge,
    gate_open: bool,
    steps_per_second: f32,
}

impl Asr {
    fn new(steps_per_second: f32) -> Self {
        Self {
            stage: Stage::Idle,
            level: 0.0,
            from: 0.0,
            step: 0,
            gate: Edge::default(),
            gate_open: false,
            steps_per_second,
        }
    }

    fn enter(&mut self, stage: Stage) {
        self.stage = stage;
        self.from = self.level;
        self.step = 0;
    }

    #[inline]
    fn next(&mut self, gate: f32, start: f32, attack: f32, sustain: f32, release: f32) -> f32 {
        if self.gate.rising(gate) {
            self.gate_open = true;
            self.enter(Stage::Attack);
        } else if self.gate_open && gate <= 0.0 {
            self.gate_open = false;
            self.enter(Stage::Release);
        }

        match self.stage {
            Stage::Idle => self.level = start,
            Stage::Attack => {
                let total = steps(attack, self.steps_per_second);
                self.step += 1;
                if self.step >= total {
                    self.level = sustain;
                    self.enter(Stage::Sustain);
                } else {
                    self.level = lerp(self.from, sustain, self.step as f32 / total as f32);
                }
            }
            Stage::Sustain => self.level = sustain,
            Stage::Release => {
                let total = steps(release, self.steps_per_second);
                self.step += 1;
                if self.step >= total {
                    self.level = start;
                    self.stage = Stage::Idle;
                } else {
                    self.level = lerp(self.from, start, self.step as f32 / total as f32);
                }
            }
        }
        self.level
    }
}

impl UnitGenerator for Asr {
    fn generate(&mut self, ctx: &mut GenContext<'_>, inputs: &Inputs<'_>, out: &mut [SignalBuffer]) {
        let gate = inputs.get(0);
        let (start, attack) = (inputs.get(1), inputs.get(2));
        let (sustain, release) = (inputs.get(3), inputs.get(4));
        for i in 0..ctx.num_samples {
            out[0][i] = self.next(gate.at(i), start.at(i), attack.at(i), sustain.at(i), release.at(i));
        }
    }
}

/// Register the envelope family.
pub fn register(registry: &mut UgenRegistry) {
    let envelope = |name, description, spec| UgenDescriptor {
        name,
        description,
        category: UgenCategory::Envelope,
        spec,
    };
    registry.register(
        envelope("Line", "Linear ramp that holds its end value", &LINE_SPEC),
        build_line,
    );
    registry.register(
        envelope("Exponential Line", "Exponential ramp that holds its end value", &X_LINE_SPEC),
        build_line,
    );
    registry.register(
        envelope("ASR", "Gated attack-sustain-release envelope", &ASR_SPEC),
        |ctx| Ok(Box::new(Asr::new(ctx.sample_rate / samples_per_output(ctx)))),
    );
}
