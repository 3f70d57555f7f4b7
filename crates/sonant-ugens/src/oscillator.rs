//! Periodic waveform generators.
//!
//! Table oscillators (`osc`, `sinOsc`, `triOsc`, `sawOsc`, `squareOsc`)
//! accumulate phase in table units and wrap at the table length; reads go
//! through the selected [`Interpolation`]. The direct oscillators (`sin`,
//! `lfSaw`, `lfPulse`, `impulse`) accumulate phase in cycles.
//!
//! All of them take `freq` in Hz and a `phase` offset in cycles (0..1).
//! Control-rate instances advance by a whole block per evaluation.

use core::f32::consts::TAU;

use libm::sinf;
use sonant_core::{
    BuildContext, Error, GenContext, InputSpec, Inputs, Interpolation, Rate, Result, SignalBuffer, UgenCategory,
    UgenDescriptor, UgenRegistry, UgenSpec, UnitGenerator, wrap,
};

use crate::options;

/// Default table length for the generated-table oscillators.
pub const DEFAULT_TABLE_SIZE: usize = 8192;

const RATES: &[Rate] = &[Rate::Audio, Rate::Control];
const FREQ_PHASE: &[InputSpec] = &[InputSpec::new("freq", 440.0), InputSpec::new("phase", 0.0)];

const fn freq_phase_spec(id: &'static str) -> UgenSpec {
    UgenSpec {
        id,
        inputs: FREQ_PHASE,
        rates: RATES,
        default_rate: Rate::Audio,
    }
}

/// Spec for `osc`.
pub static OSC_SPEC: UgenSpec = freq_phase_spec("osc");
/// Spec for `sinOsc`.
pub static SIN_OSC_SPEC: UgenSpec = freq_phase_spec("sinOsc");
/// Spec for `triOsc`.
pub static TRI_OSC_SPEC: UgenSpec = freq_phase_spec("triOsc");
/// Spec for `sawOsc`.
pub static SAW_OSC_SPEC: UgenSpec = freq_phase_spec("sawOsc");
/// Spec for `squareOsc`.
pub static SQUARE_OSC_SPEC: UgenSpec = freq_phase_spec("squareOsc");
/// Spec for `sin`.
pub static SIN_SPEC: UgenSpec = freq_phase_spec("sin");
/// Spec for `lfSaw`.
pub static LF_SAW_SPEC: UgenSpec = freq_phase_spec("lfSaw");
/// Spec for `lfPulse`.
pub static LF_PULSE_SPEC: UgenSpec = UgenSpec {
    id: "lfPulse",
    inputs: &[
        InputSpec::new("freq", 440.0),
        InputSpec::new("phase", 0.0),
        InputSpec::new("width", 0.5),
    ],
    rates: RATES,
    default_rate: Rate::Audio,
};
/// Spec for `impulse`.
pub static IMPULSE_SPEC: UgenSpec = freq_phase_spec("impulse");

/// Shape of a generated wavetable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// One cycle of sine.
    Sine,
    /// Triangle starting at 0, rising.
    Triangle,
    /// Rising sawtooth starting at 0.
    Saw,
    /// 50% square starting high.
    Square,
}

impl Shape {
    /// Sample `t` in `[0, 1)` of one cycle.
    pub fn sample(self, t: f32) -> f32 {
        match self {
            Shape::Sine => sinf(TAU * t),
            Shape::Triangle => 4.0 * (wrap(t + 0.75, 1.0) - 0.5).abs() - 1.0,
            Shape::Saw => 2.0 * wrap(t + 0.5, 1.0) - 1.0,
            Shape::Square => {
                if t < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
        }
    }

    /// One cycle of `len` samples.
    pub fn table(self, len: usize) -> Vec<f32> {
        (0..len).map(|i| self.sample(i as f32 / len as f32)).collect()
    }
}

/// Samples of time that pass per generated output value.
fn samples_per_output(ctx: &BuildContext<'_>) -> f32 {
    if ctx.rate.is_audio() {
        1.0
    } else {
        ctx.block_size as f32
    }
}

// ---------------------------------------------------------------------------
// Table oscillator
// ---------------------------------------------------------------------------

/// Wavetable oscillator.
#[derive(Debug, Clone)]
pub struct TableOsc {
    table: Vec<f32>,
    interpolation: Interpolation,
    /// Read position in table units, `[0, len)`.
    phase: f32,
    /// Table units per Hz per output value.
    increment_scale: f32,
}

impl TableOsc {
    /// Oscillator over `table` (must not be empty).
    pub fn new(table: Vec<f32>, interpolation: Interpolation, sample_rate: f32, samples_per_output: f32) -> Self {
        let increment_scale = table.len() as f32 * samples_per_output / sample_rate;
        Self {
            table,
            interpolation,
            phase: 0.0,
            increment_scale,
        }
    }

    /// The wavetable.
    pub fn table(&self) -> &[f32] {
        &self.table
    }
}

impl UnitGenerator for TableOsc {
    fn generate(&mut self, ctx: &mut GenContext<'_>, inputs: &Inputs<'_>, out: &mut [SignalBuffer]) {
        let freq = inputs.get(0);
        let phase = inputs.get(1);
        let len = self.table.len() as f32;
        for i in 0..ctx.num_samples {
            let index = self.phase + phase.at(i) * len;
            out[0][i] = self.interpolation.read(&self.table, index);
            self.phase = wrap(self.phase + freq.at(i) * self.increment_scale, len);
        }
    }
}

fn build_osc(ctx: &BuildContext<'_>) -> Result<Box<dyn UnitGenerator>> {
    let table = options::list(ctx, "table")?;
    let interpolation = options::interpolation(ctx, Interpolation::Linear)?;
    Ok(Box::new(TableOsc::new(
        table,
        interpolation,
        ctx.sample_rate,
        samples_per_output(ctx),
    )))
}

fn build_shaped(ctx: &BuildContext<'_>, shape: Shape) -> Result<Box<dyn UnitGenerator>> {
    let size = options::count(ctx, "tableSize", DEFAULT_TABLE_SIZE)?;
    if size < 4 {
        return Err(Error::invalid_option(ctx.spec.id, "tableSize", "must be at least 4"));
    }
    let interpolation = options::interpolation(ctx, Interpolation::Linear)?;
    Ok(Box::new(TableOsc::new(
        shape.table(size),
        interpolation,
        ctx.sample_rate,
        samples_per_output(ctx),
    )))
}

// ---------------------------------------------------------------------------
// Direct oscillators
// ---------------------------------------------------------------------------

/// Which waveform a [`PhaseOsc`] computes from its phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direct {
    Sin,
    Saw,
    Pulse,
}

/// Directly computed oscillator with phase in cycles.
#[derive(Debug, Clone)]
pub struct PhaseOsc {
    kind: Direct,
    phase: f32,
    /// Cycles per Hz per output value.
    increment_scale: f32,
}

impl UnitGenerator for PhaseOsc {
    fn generate(&mut self, ctx: &mut GenContext<'_>, inputs: &Inputs<'_>, out: &mut [SignalBuffer]) {
        let freq = inputs.get(0);
        let phase = inputs.get(1);
        let width = inputs.get(2);
        for i in 0..ctx.num_samples {
            let t = wrap(self.phase + phase.at(i), 1.0);
            out[0][i] = match self.kind {
                Direct::Sin => sinf(TAU * t),
                Direct::Saw => 2.0 * t - 1.0,
                Direct::Pulse => {
                    if t < width.at(i) {
                        1.0
                    } else {
                        -1.0
                    }
                }
            };
            self.phase = wrap(self.phase + freq.at(i) * self.increment_scale, 1.0);
        }
    }
}

fn build_direct(ctx: &BuildContext<'_>, kind: Direct) -> Result<Box<dyn UnitGenerator>> {
    Ok(Box::new(PhaseOsc {
        kind,
        phase: 0.0,
        increment_scale: samples_per_output(ctx) / ctx.sample_rate,
    }))
}

/// Impulse train: 1.0 on the sample each cycle begins, 0 elsewhere.
#[derive(Debug, Clone)]
pub struct Impulse {
    phase: f32,
    increment_scale: f32,
    started: bool,
}

impl UnitGenerator for Impulse {
    fn generate(&mut self, ctx: &mut GenContext<'_>, inputs: &Inputs<'_>, out: &mut [SignalBuffer]) {
        let freq = inputs.get(0);
        if !self.started {
            self.phase = 1.0 - wrap(inputs.value(1), 1.0);
            self.started = true;
        }
        for i in 0..ctx.num_samples {
            out[0][i] = if self.phase >= 1.0 {
                self.phase = wrap(self.phase, 1.0);
                1.0
            } else {
                0.0
            };
            let increment = freq.at(i) * self.increment_scale;
            if increment.is_finite() && increment > 0.0 {
                self.phase += increment;
            }
        }
    }
}

fn build_impulse(ctx: &BuildContext<'_>) -> Result<Box<dyn UnitGenerator>> {
    Ok(Box::new(Impulse {
        phase: 0.0,
        increment_scale: samples_per_output(ctx) / ctx.sample_rate,
        started: false,
    }))
}

/// Register the oscillator family.
pub fn register(registry: &mut UgenRegistry) {
    let oscillator = |name, description, spec| UgenDescriptor {
        name,
        description,
        category: UgenCategory::Oscillator,
        spec,
    };
    registry.register(
        oscillator("Oscillator", "Wavetable oscillator over a supplied table", &OSC_SPEC),
        build_osc,
    );
    registry.register(
        oscillator("Sine Oscillator", "Wavetable sine", &SIN_OSC_SPEC),
        |ctx| build_shaped(ctx, Shape::Sine),
    );
    registry.register(
        oscillator("Triangle Oscillator", "Wavetable triangle", &TRI_OSC_SPEC),
        |ctx| build_shaped(ctx, Shape::Triangle),
    );
    registry.register(
        oscillator("Saw Oscillator", "Wavetable sawtooth", &SAW_OSC_SPEC),
        |ctx| build_shaped(ctx, Shape::Saw),
    );
    registry.register(
        oscillator("Square Oscillator", "Wavetable square", &SQUARE_OSC_SPEC),
        |ctx| build_shaped(ctx, Shape::Square),
    );
    registry.register(
        oscillator("Sine", "Directly computed sine", &SIN_SPEC),
        |ctx| build_direct(ctx, Direct::Sin),
    );
    registry.register(
        oscillator("LF Saw", "Non-band-limited sawtooth, -1 to 1", &LF_SAW_SPEC),
        |ctx| build_direct(ctx, Direct::Saw),
    );
    registry.register(
        oscillator("LF Pulse", "Non-band-limited pulse with variable width", &LF_PULSE_SPEC),
        |ctx| build_direct(ctx, Direct::Pulse),
    );
    registry.register(
        oscillator("Impulse", "One-sample impulse per cycle", &IMPULSE_SPEC),
        build_impulse,
    );
}
