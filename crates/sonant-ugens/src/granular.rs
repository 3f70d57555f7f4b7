//! Triggered granular playback.
//!
//! Grains live in a fixed pool sized by option `maxGrains`. A free list and an
//! active list of pool indices make spawn and retire O(1) with no allocation
//! after construction. When the pool is exhausted new grains are dropped.

use core::f32::consts::TAU;

use libm::{cosf, roundf};
use sonant_core::{
    BuildContext, Error, GenContext, InputSpec, Inputs, Interpolation, Rate, Result, SignalBuffer, UgenCategory,
    UgenDescriptor, UgenRegistry, UgenSpec, UnitGenerator, finite_or,
};

use crate::options::{self, Edge};

/// Pool size used when `maxGrains` is absent.
pub const DEFAULT_MAX_GRAINS: usize = 512;

/// Spec for `triggerGrains`.
pub static TRIGGER_GRAINS_SPEC: UgenSpec = UgenSpec {
    id: "triggerGrains",
    inputs: &[
        InputSpec::new("trigger", 0.0),
        InputSpec::new("centerPos", 0.0),
        InputSpec::new("dur", 0.1),
        InputSpec::new("amp", 1.0),
        InputSpec::new("speed", 1.0),
    ],
    rates: &[Rate::Audio],
    default_rate: Rate::Audio,
};

#[derive(Debug, Clone, Copy, Default)]
struct Grain {
    /// Read position in buffer frames.
    position: f32,
    increment: f32,
    amp: f32,
    elapsed: usize,
    length: usize,
}

impl Grain {
    /// Hann window value for the current sample.
    #[inline]
    fn window(&self) -> f32 {
        if self.length <= 1 {
            return 1.0;
        }
        0.5 - 0.5 * cosf(TAU * self.elapsed as f32 / self.length as f32)
    }
}

/// Spawns a Hann-windowed grain from a buffer on each rising `trigger`.
///
/// Each grain is `dur` seconds long, centered on `centerPos` seconds into the
/// buffer, read at `speed` and scaled by `amp`. All four are sampled when the
/// grain starts.
#[derive(Debug, Clone)]
pub struct TriggerGrains {
    buffer: String,
    interpolation: Interpolation,
    pool: Vec<Grain>,
    free: Vec<usize>,
    active: Vec<usize>,
    trigger: Edge,
}

impl TriggerGrains {
    /// Create a player with a pool of `max_grains`.
    pub fn new(buffer: impl Into<String>, max_grains: usize, interpolation: Interpolation) -> Self {
        Self {
            buffer: buffer.into(),
            interpolation,
            pool: vec![Grain::default(); max_grains],
            free: (0..max_grains).rev().collect(),
            active: Vec::with_capacity(max_grains),
            trigger: Edge::default(),
        }
    }

    /// Number of grains currently sounding.
    pub fn active_grains(&self) -> usize {
        self.active.len()
    }

    fn spawn(&mut self, grain: Grain) -> bool {
        match self.free.pop() {
            Some(slot) => {
                self.pool[slot] = grain;
                self.active.push(slot);
                true
            }
            None => false,
        }
    }
}

impl UnitGenerator for TriggerGrains {
    fn generate(&mut self, ctx: &mut GenContext<'_>, inputs: &Inputs<'_>, out: &mut [SignalBuffer]) {
        let n = ctx.num_samples;
        let data = ctx.buffers.get(&self.buffer).and_then(|b| {
            let ratio = b.sample_rate() / ctx.sample_rate;
            b.channel(0).map(|data| (data, b.sample_rate(), ratio))
        });
        let Some((data, buffer_rate, ratio)) = data else {
            // Nothing to read; let sounding grains lapse.
            self.free.extend(self.active.drain(..));
            out[0][..n].fill(0.0);
            return;
        };

        let trigger = inputs.get(0);
        let (center, dur) = (inputs.get(1), inputs.get(2));
        let (amp, speed) = (inputs.get(3), inputs.get(4));
        let mut dropped = 0usize;

        for i in 0..n {
            if self.trigger.rising(trigger.at(i)) {
                let length = roundf(finite_or(dur.at(i), 0.0) * ctx.sample_rate).max(1.0) as usize;
                let increment = finite_or(speed.at(i), 0.0) * ratio;
                let span = length as f32 * increment;
                let grain = Grain {
                    position: finite_or(center.at(i), 0.0) * buffer_rate - span * 0.5,
                    increment,
                    amp: finite_or(amp.at(i), 0.0),
                    elapsed: 0,
                    length,
                };
                if !self.spawn(grain) {
                    dropped += 1;
                }
            }

            let mut sum = 0.0;
            let mut k = 0;
            while k < self.active.len() {
                let slot = self.active[k];
                let grain = &mut self.pool[slot];
                sum += self.interpolation.read(data, grain.position) * grain.window() * grain.amp;
                grain.position += grain.increment;
                grain.elapsed += 1;
                if grain.elapsed >= grain.length {
                    self.active.swap_remove(k);
                    self.free.push(slot);
                } else {
                    k += 1;
                }
            }
            out[0][i] = sum;
        }

        if dropped > 0 {
            tracing::debug!(dropped, pool = self.pool.len(), "grain pool exhausted");
        }
    }
}

fn build_trigger_grains(ctx: &BuildContext<'_>) -> Result<Box<dyn UnitGenerator>> {
    let max_grains = options::count(ctx, "maxGrains", DEFAULT_MAX_GRAINS)?;
    if max_grains == 0 {
        return Err(Error::invalid_option(ctx.spec.id, "maxGrains", "expected at least one grain"));
    }
    Ok(Box::new(TriggerGrains::new(
        options::buffer_name(ctx)?,
        max_grains,
        options::interpolation(ctx, Interpolation::Linear)?,
    )))
}

/// Register the granular family.
pub fn register(registry: &mut UgenRegistry) {
    registry.register(
        UgenDescriptor {
            name: "Trigger Grains",
            description: "Hann-windowed grains spawned on trigger",
            category: UgenCategory::Granular,
            spec: &TRIGGER_GRAINS_SPEC,
        },
        build_trigger_grains,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{SR, env, render};
    use sonant_core::{NodeDescriptor, SampleBuffer};

    fn ones() -> SampleBuffer {
        SampleBuffer::mono(vec![1.0; 48000], SR)
    }

    fn grains(trigger_hz: f32, max_grains: usize) -> NodeDescriptor {
        NodeDescriptor::new("triggerGrains")
            .option("buffer", "ones")
            .option("maxGrains", max_grains)
            .input("trigger", NodeDescriptor::new("impulse").input("freq", trigger_hz))
            .input("centerPos", 0.5)
            .input("dur", 100.0 / SR)
    }

    #[test]
    fn single_grain_has_hann_shape() {
        let mut env = env(128);
        env.set_buffer("ones", ones());
        let (_, out) = render(&mut env, &grains(1.0, 4), 1);
        assert_eq!(out[0], 0.0);
        assert!((out[50] - 1.0).abs() < 1e-5);
        assert!((out[25] - out[75]).abs() < 1e-5);
        assert!(out[100..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn pool_limit_caps_overlap() {
        let mut env = env(256);
        env.set_buffer("ones", ones());
        // A trigger every 10 samples, each grain 100 samples long.
        let (_, limited) = render(&mut env, &grains(4800.0, 2), 1);
        let peak = limited.iter().copied().fold(0.0f32, f32::max);
        assert!(peak > 1.5 && peak <= 2.0 + 1e-5, "peak {peak}");

        let (_, unlimited) = render(&mut env, &grains(4800.0, 64), 1);
        let peak = unlimited.iter().copied().fold(0.0f32, f32::max);
        assert!(peak > 4.0, "peak {peak}");
    }

    #[test]
    fn grains_read_the_buffer_at_speed() {
        let mut env = env(64);
        env.set_buffer("ramp", SampleBuffer::mono((0..1000).map(|i| i as f32).collect(), SR));
        let desc = NodeDescriptor::new("triggerGrains")
            .option("buffer", "ramp")
            .input("trigger", NodeDescriptor::new("impulse").input("freq", 1.0))
            .input("centerPos", 500.0 / SR)
            .input("dur", 40.0 / SR)
            .input("speed", 2.0);
        let (_, out) = render(&mut env, &desc, 1);
        // Centered on frame 500 and covering 80 frames: starts at frame 460.
        let window = 0.5 - 0.5 * cosf(TAU * 20.0 / 40.0);
        assert!((out[20] - 500.0 * window).abs() < 1e-2);
    }

    #[test]
    fn missing_buffer_is_silent() {
        let mut env = env(64);
        let (_, out) = render(&mut env, &grains(100.0, 4), 2);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn zero_pool_is_rejected() {
        let mut env = env(64);
        assert!(env.build(&grains(1.0, 0)).is_err());
    }

    #[test]
    fn grains_retire_to_the_free_list() {
        let mut player = TriggerGrains::new("x", 2, Interpolation::None);
        assert!(player.spawn(Grain { length: 1, ..Grain::default() }));
        assert!(player.spawn(Grain { length: 1, ..Grain::default() }));
        assert!(!player.spawn(Grain::default()));
        assert_eq!(player.active_grains(), 2);
    }
}
