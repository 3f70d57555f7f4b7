//! Random and stochastic sources.
//!
//! Every generator here owns a seedable [`Rng`]. Option `seed` makes output
//! reproducible; without it each node draws a distinct seed.

use libm::{logf, tanf};
use sonant_core::{
    BuildContext, Error, GenContext, InputSpec, Inputs, Rate, Result, Rng, SignalBuffer, UgenCategory,
    UgenDescriptor, UgenRegistry, UgenSpec, UnitGenerator, lerp,
};

use crate::options;

const RATES: &[Rate] = &[Rate::Audio, Rate::Control];

/// Spec for `whiteNoise`.
pub static WHITE_NOISE_SPEC: UgenSpec = UgenSpec {
    id: "whiteNoise",
    inputs: &[],
    rates: RATES,
    default_rate: Rate::Audio,
};

/// Spec for `lfNoise`.
pub static LF_NOISE_SPEC: UgenSpec = UgenSpec {
    id: "lfNoise",
    inputs: &[InputSpec::new("freq", 4.0)],
    rates: RATES,
    default_rate: Rate::Audio,
};

/// Spec for `pinkNoise`.
pub static PINK_NOISE_SPEC: UgenSpec = UgenSpec {
    id: "pinkNoise",
    inputs: &[],
    rates: &[Rate::Audio],
    default_rate: Rate::Audio,
};

/// Spec for `dust`.
pub static DUST_SPEC: UgenSpec = UgenSpec {
    id: "dust",
    inputs: &[InputSpec::new("density", 1.0)],
    rates: &[Rate::Audio],
    default_rate: Rate::Audio,
};

/// Spec for `random`.
pub static RANDOM_SPEC: UgenSpec = UgenSpec {
    id: "random",
    inputs: &[
        InputSpec::new("scale", 1.0),
        InputSpec::new("lambda", 1.0),
        InputSpec::new("mean", 0.0),
        InputSpec::new("deviation", 1.0),
    ],
    rates: RATES,
    default_rate: Rate::Audio,
};

// ---------------------------------------------------------------------------
// White
// ---------------------------------------------------------------------------

/// Uniform noise in `[-1, 1)`.
#[derive(Debug, Clone)]
pub struct WhiteNoise {
    rng: Rng,
}

impl UnitGenerator for WhiteNoise {
    fn generate(&mut self, ctx: &mut GenContext<'_>, _inputs: &Inputs<'_>, out: &mut [SignalBuffer]) {
        for s in &mut out[0][..ctx.num_samples] {
            *s = self.rng.next_bipolar();
        }
    }
}

// ---------------------------------------------------------------------------
// Low-frequency noise
// ---------------------------------------------------------------------------

/// Random steps at `freq` per second, held or linearly interpolated.
#[derive(Debug, Clone)]
pub struct LfNoise {
    rng: Rng,
    interpolate: bool,
    /// Progress through the current step, `[0, 1)`.
    phase: f32,
    from: f32,
    to: f32,
    increment_scale: f32,
}

impl UnitGenerator for LfNoise {
    fn generate(&mut self, ctx: &mut GenContext<'_>, inputs: &Inputs<'_>, out: &mut [SignalBuffer]) {
        let freq = inputs.get(0);
        for i in 0..ctx.num_samples {
            out[0][i] = if self.interpolate {
                lerp(self.from, self.to, self.phase)
            } else {
                self.to
            };
            let increment = (freq.at(i) * self.increment_scale).max(0.0);
            if !increment.is_finite() {
                continue;
            }
            self.phase += increment;
            if self.phase >= 1.0 {
                self.phase -= libm::floorf(self.phase);
                self.from = self.to;
                self.to = self.rng.next_bipolar();
            }
        }
    }
}

fn build_lf_noise(ctx: &BuildContext<'_>) -> Result<Box<dyn UnitGenerator>> {
    let interpolate = match ctx.options.text("interpolation") {
        None | Some("none") => false,
        Some("linear") => true,
        Some(_) => {
            return Err(Error::invalid_option(
                ctx.spec.id,
                "interpolation",
                "expected none or linear",
            ));
        }
    };
    let mut rng = Rng::new(options::seed(ctx));
    let from = rng.next_bipolar();
    let to = rng.next_bipolar();
    let samples_per_output = if ctx.rate.is_audio() { 1.0 } else { ctx.block_size as f32 };
    Ok(Box::new(LfNoise {
        rng,
        interpolate,
        phase: 0.0,
        from,
        to,
        increment_scale: samples_per_output / ctx.sample_rate,
    }))
}

// ---------------------------------------------------------------------------
// Pink
// ---------------------------------------------------------------------------

/// Pink noise from Paul Kellet's weighted sum of one-pole filters.
#[derive(Debug, Clone)]
pub struct PinkNoise {
    rng: Rng,
    b: [f32; 7],
}

impl PinkNoise {
    /// Create a generator with `seed`.
    pub fn new(seed: u32) -> Self {
        Self {
            rng: Rng::new(seed),
            b: [0.0; 7],
        }
    }

    #[inline]
    fn next(&mut self) -> f32 {
        let white = self.rng.next_bipolar();
        let b = &mut self.b;
        b[0] = 0.99886 * b[0] + white * 0.055_517_9;
        b[1] = 0.99332 * b[1] + white * 0.075_075_9;
        b[2] = 0.96900 * b[2] + white * 0.153_852;
        b[3] = 0.86650 * b[3] + white * 0.310_485_6;
        b[4] = 0.55000 * b[4] + white * 0.532_952_2;
        b[5] = -0.7616 * b[5] - white * 0.016_898;
        let pink = b[0] + b[1] + b[2] + b[3] + b[4] + b[5] + b[6] + white * 0.5362;
        b[6] = white * 0.115_926;
        (pink * 0.11).clamp(-1.0, 1.0)
    }
}

impl UnitGenerator for PinkNoise {
    fn generate(&mut self, ctx: &mut GenContext<'_>, _inputs: &Inputs<'_>, out: &mut [SignalBuffer]) {
        for s in &mut out[0][..ctx.num_samples] {
            *s = self.next();
        }
    }
}

// ---------------------------------------------------------------------------
// Dust
// ---------------------------------------------------------------------------

/// Random impulses, `density` per second on average, amplitude in `(0, 1]`.
#[derive(Debug, Clone)]
pub struct Dust {
    rng: Rng,
    inv_sample_rate: f32,
}

impl UnitGenerator for Dust {
    fn generate(&mut self, ctx: &mut GenContext<'_>, inputs: &Inputs<'_>, out: &mut [SignalBuffer]) {
        let density = inputs.get(0);
        for i in 0..ctx.num_samples {
            let threshold = density.at(i) * self.inv_sample_rate;
            let u = self.rng.next_open();
            out[0][i] = if threshold > 0.0 && u <= threshold {
                u / threshold
            } else {
                0.0
            };
        }
    }
}

// ---------------------------------------------------------------------------
// Distributions
// ---------------------------------------------------------------------------

/// Named distribution for `random`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Distribution {
    /// Uniform in `[-scale, scale)`.
    #[default]
    Uniform,
    /// Normal with `mean` and `deviation`.
    Gaussian,
    /// Exponential with rate `lambda`.
    Exponential,
    /// Triangular in `(-scale, scale)`, peaked at 0.
    Triangular,
    /// Cauchy with scale `scale`, clamped to `±16 * scale`.
    Cauchy,
}

impl Distribution {
    /// Parse a distribution name.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "uniform" => Some(Distribution::Uniform),
            "gaussian" | "normal" => Some(Distribution::Gaussian),
            "exponential" => Some(Distribution::Exponential),
            "triangular" => Some(Distribution::Triangular),
            "cauchy" => Some(Distribution::Cauchy),
            _ => None,
        }
    }
}

/// Draws from a [`Distribution`] every sample.
#[derive(Debug, Clone)]
pub struct Random {
    rng: Rng,
    distribution: Distribution,
}

impl Random {
    #[inline]
    fn draw(&mut self, scale: f32, lambda: f32, mean: f32, deviation: f32) -> f32 {
        match self.distribution {
            Distribution::Uniform => self.rng.next_bipolar() * scale,
            Distribution::Gaussian => mean + deviation * self.rng.next_gaussian(),
            Distribution::Exponential => {
                if lambda > 0.0 {
                    -logf(self.rng.next_open()) / lambda
                } else {
                    0.0
                }
            }
            Distribution::Triangular => (self.rng.next_f32() + self.rng.next_f32() - 1.0) * scale,
            Distribution::Cauchy => {
                let limit = scale.abs() * 16.0;
                let x = scale * tanf(core::f32::consts::PI * (self.rng.next_f32() - 0.5));
                x.clamp(-limit, limit)
            }
        }
    }
}

impl UnitGenerator for Random {
    fn generate(&mut self, ctx: &mut GenContext<'_>, inputs: &Inputs<'_>, out: &mut [SignalBuffer]) {
        let (scale, lambda) = (inputs.get(0), inputs.get(1));
        let (mean, deviation) = (inputs.get(2), inputs.get(3));
        for i in 0..ctx.num_samples {
            out[0][i] = self.draw(scale.at(i), lambda.at(i), mean.at(i), deviation.at(i));
        }
    }
}

fn build_random(ctx: &BuildContext<'_>) -> Result<Box<dyn UnitGenerator>> {
    let distribution = match ctx.options.get("distribution") {
        None => Distribution::Uniform,
        Some(_) => ctx
            .options
            .text("distribution")
            .and_then(Distribution::parse)
            .ok_or_else(|| {
                Error::invalid_option(
                    ctx.spec.id,
                    "distribution",
                    "expected uniform, gaussian, exponential, triangular or cauchy",
                )
            })?,
    };
    Ok(Box::new(Random {
        rng: Rng::new(options::seed(ctx)),
        distribution,
    }))
}

/// Register the noise family.
pub fn register(registry: &mut UgenRegistry) {
    let noise = |name, description, spec| UgenDescriptor {
        name,
        description,
        category: UgenCategory::Noise,
        spec,
    };
    registry.register(
        noise("White Noise", "Uniform noise in [-1, 1)", &WHITE_NOISE_SPEC),
        |ctx| {
            Ok(Box::new(WhiteNoise {
                rng: Rng::new(options::seed(ctx)),
            }))
        },
    );
    registry.register(
        noise("LF Noise", "Held or interpolated random steps", &LF_NOISE_SPEC),
        build_lf_noise,
    );
    registry.register(
        noise("Pink Noise", "Kellet weighted-sum pink noise", &PINK_NOISE_SPEC),
        |ctx| Ok(Box::new(PinkNoise::new(options::seed(ctx)))),
    );
    registry.register(
        noise("Dust", "Random impulses at a mean density", &DUST_SPEC),
        |ctx| {
            Ok(Box::new(Dust {
                rng: Rng::new(options::seed(ctx)),
                inv_sample_rate: 1.0 / ctx.sample_rate,
            }))
        },
    );
    registry.register(
        noise("Random", "Samples from a named distribution", &RANDOM_SPEC),
        build_random,
    );
}
