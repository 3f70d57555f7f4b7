//! Waveshapers.
//!
//! All shapers are memoryless: one input sample in, one output sample out.
//! They share a single generator parameterised by [`Shaper`].

use sonant_core::{
    BuildContext, GenContext, InputSpec, Inputs, Rate, Result, SignalBuffer, UgenCategory, UgenDescriptor,
    UgenRegistry, UgenSpec, UnitGenerator, foldback, hard_clip, soft_clip,
};

const RATES: &[Rate] = &[Rate::Audio, Rate::Control];

const fn shaper_spec(id: &'static str, inputs: &'static [InputSpec]) -> UgenSpec {
    UgenSpec {
        id,
        inputs,
        rates: RATES,
        default_rate: Rate::Audio,
    }
}

const SOURCE: &[InputSpec] = &[InputSpec::new("source", 0.0)];
const GAIN: &[InputSpec] = &[InputSpec::new("source", 0.0), InputSpec::new("gain", 1.0)];
const THRESHOLD: &[InputSpec] = &[InputSpec::new("source", 0.0), InputSpec::new("threshold", 1.0)];
const AMOUNT_2: &[InputSpec] = &[InputSpec::new("source", 0.0), InputSpec::new("amount", 2.0)];
const AMOUNT_1: &[InputSpec] = &[InputSpec::new("source", 0.0), InputSpec::new("amount", 1.0)];

/// Spec for `tanh`.
pub static TANH_SPEC: UgenSpec = shaper_spec("tanh", SOURCE);
/// Spec for `distortion`.
pub static DISTORTION_SPEC: UgenSpec = shaper_spec("distortion", GAIN);
/// Spec for `clip`.
pub static CLIP_SPEC: UgenSpec = shaper_spec("clip", THRESHOLD);
/// Spec for `foldback`.
pub static FOLDBACK_SPEC: UgenSpec = shaper_spec("foldback", THRESHOLD);
/// Spec for `deJonge`.
pub static DE_JONGE_SPEC: UgenSpec = shaper_spec("deJonge", AMOUNT_2);
/// Spec for `tarrabiaDeJong`.
pub static TARRABIA_DE_JONG_SPEC: UgenSpec = shaper_spec("tarrabiaDeJong", AMOUNT_1);

/// Transfer curve applied by a [`Waveshaper`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shaper {
    /// `tanh(x)`.
    Tanh,
    /// `tanh(x * gain)`.
    Drive,
    /// Clamp to `±threshold`.
    Clip,
    /// Reflect back inside `±threshold`.
    Foldback,
    /// `x * (1 + k) / (1 + k|x|)`.
    DeJonge,
    /// `x * (|x| + a) / (x² + (a - 1)|x| + 1)`.
    TarrabiaDeJong,
}

impl Shaper {
    /// Apply the curve with parameter `p` (ignored by `Tanh`).
    #[inline]
    pub fn apply(self, x: f32, p: f32) -> f32 {
        match self {
            Shaper::Tanh => soft_clip(x),
            Shaper::Drive => soft_clip(x * p),
            Shaper::Clip => hard_clip(x, p),
            Shaper::Foldback => foldback(x, p),
            Shaper::DeJonge => {
                let k = p.max(0.0);
                x * (1.0 + k) / (1.0 + k * x.abs())
            }
            Shaper::TarrabiaDeJong => {
                let a = p.max(0.0);
                let ax = x.abs();
                x * (ax + a) / (x * x + (a - 1.0) * ax + 1.0)
            }
        }
    }

    fn for_id(id: &str) -> Self {
        match id {
            "distortion" => Shaper::Drive,
            "clip" => Shaper::Clip,
            "foldback" => Shaper::Foldback,
            "deJonge" => Shaper::DeJonge,
            "tarrabiaDeJong" => Shaper::TarrabiaDeJong,
            _ => Shaper::Tanh,
        }
    }
}

/// Applies a [`Shaper`] to `source` sample by sample.
#[derive(Debug, Clone)]
pub struct Waveshaper {
    shaper: Shaper,
}

impl UnitGenerator for Waveshaper {
    fn generate(&mut self, ctx: &mut GenContext<'_>, inputs: &Inputs<'_>, out: &mut [SignalBuffer]) {
        let (source, param) = (inputs.get(0), inputs.get(1));
        for i in 0..ctx.num_samples {
            out[0][i] = self.shaper.apply(source.at(i), param.at(i));
        }
    }
}

fn build_shaper(ctx: &BuildContext<'_>) -> Result<Box<dyn UnitGenerator>> {
    Ok(Box::new(Waveshaper {
        shaper: Shaper::for_id(ctx.spec.id),
    }))
}

/// Register the distortion family.
pub fn register(registry: &mut UgenRegistry) {
    let entries: [(&'static str, &'static str, &'static UgenSpec); 6] = [
        ("Tanh", "Hyperbolic tangent saturation", &TANH_SPEC),
        ("Distortion", "Driven tanh saturation", &DISTORTION_SPEC),
        ("Clip", "Hard clipping at a threshold", &CLIP_SPEC),
        ("Foldback", "Folds peaks back below a threshold", &FOLDBACK_SPEC),
        ("De Jonge", "Rational soft clipper", &DE_JONGE_SPEC),
        ("Tarrabia-De Jong", "Rational shaper with adjustable knee", &TARRABIA_DE_JONG_SPEC),
    ];
    for (name, description, spec) in entries {
        registry.register(
            UgenDescriptor {
                name,
                description,
                category: UgenCategory::Distortion,
                spec,
            },
            build_shaper,
        );
    }
}
