//! Control-flow generators: value sequences and timed changes.

use libm::{floorf, roundf};
use sonant_core::{
    BuildContext, Error, GenContext, InputSpec, Inputs, Rate, Result, SignalBuffer, UgenCategory, UgenDescriptor,
    UgenRegistry, UgenSpec, UnitGenerator, finite_or, lerp,
};

use crate::options::{self, Edge, PendingRestart};

/// Spec for `sequence`.
pub static SEQUENCE_SPEC: UgenSpec = UgenSpec {
    id: "sequence",
    inputs: &[
        InputSpec::new("freq", 1.0),
        InputSpec::new("start", 0.0),
        InputSpec::new("end", 0.0),
        InputSpec::new("loop", 0.0),
        InputSpec::new("trigger", 0.0),
    ],
    rates: &[Rate::Control, Rate::Audio, Rate::Demand],
    default_rate: Rate::Control,
};

/// Spec for `sequencer`.
pub static SEQUENCER_SPEC: UgenSpec = UgenSpec {
    id: "sequencer",
    inputs: &[InputSpec::new("loop", 0.0)],
    rates: &[Rate::Control, Rate::Audio],
    default_rate: Rate::Control,
};

/// Spec for `change`.
pub static CHANGE_SPEC: UgenSpec = UgenSpec {
    id: "change",
    inputs: &[
        InputSpec::required("initial"),
        InputSpec::required("target"),
        InputSpec::new("time", 0.0),
        InputSpec::new("crossfade", 0.0),
    ],
    rates: &[Rate::Audio, Rate::Control],
    default_rate: Rate::Audio,
};

fn samples_per_output(ctx: &BuildContext<'_>) -> u64 {
    if ctx.rate.is_audio() { 1 } else { ctx.block_size as u64 }
}

// ---------------------------------------------------------------------------
// Sequence
// ---------------------------------------------------------------------------

/// Steps through option `values`.
///
/// Free-running it advances `freq` times per second. At demand rate, or when
/// `trigger` is driven by a non-constant node, it advances on each rising
/// trigger instead. `start`/`end` select an index range (an `end` at or before
/// `start` means the whole list). Without `loop` the last value is held.
#[derive(Debug, Clone)]
pub struct Sequence {
    values: Vec<f32>,
    /// Steps taken from `start`.
    step: usize,
    phase: f32,
    samples_per_output: f32,
    sample_rate: f32,
    demand: bool,
    triggered: bool,
    trigger: Edge,
    restart: PendingRestart,
}

impl Sequence {
    fn range(&self, start: f32, end: f32) -> (usize, usize) {
        let len = self.values.len();
        let start = (finite_or(start, 0.0).max(0.0) as usize).min(len - 1);
        let end = finite_or(end, 0.0).max(0.0) as usize;
        let end = if end <= start { len } else { end.min(len) };
        (start, end)
    }

    fn advance(&mut self, count: usize, span: usize, looping: bool) {
        self.step = if looping {
            (self.step + count % span) % span
        } else {
            self.step.saturating_add(count).min(span - 1)
        };
    }
}

impl UnitGenerator for Sequence {
    fn generate(&mut self, ctx: &mut GenContext<'_>, inputs: &Inputs<'_>, out: &mut [SignalBuffer]) {
        let freq = inputs.get(0);
        let (start, end) = (inputs.get(1), inputs.get(2));
        let (looping, trigger) = (inputs.get(3), inputs.get(4));
        let restart = self.restart.take(ctx.num_samples);
        for i in 0..ctx.num_samples {
            if restart == Some(i) {
                self.step = 0;
                self.phase = 0.0;
            }
            let (first, last) = self.range(start.at(i), end.at(i));
            let span = last - first;
            let looping = looping.at(i) > 0.0;
            if self.step >= span {
                self.step = span - 1;
            }

            if self.demand || self.triggered {
                if self.trigger.rising(trigger.at(i)) {
                    self.advance(1, span, looping);
                }
                out[0][i] = self.values[first + self.step];
                continue;
            }

            out[0][i] = self.values[first + self.step];
            let increment = finite_or(freq.at(i) * self.samples_per_output / self.sample_rate, 0.0).max(0.0);
            self.phase += increment;
            if self.phase >= 1.0 {
                let whole = floorf(self.phase);
                self.phase -= whole;
                self.advance(whole as usize, span, looping);
            }
        }
    }

    fn on_input_changed(&mut self, rates: &[Rate]) {
        self.triggered = rates.get(4).is_some_and(|&rate| rate != Rate::Constant);
    }

    fn trigger_at(&mut self, offset: usize) -> bool {
        self.restart.set(offset);
        true
    }
}

fn build_sequence(ctx: &BuildContext<'_>) -> Result<Box<dyn UnitGenerator>> {
    Ok(Box::new(Sequence {
        values: options::list(ctx, "values")?,
        step: 0,
        phase: 0.0,
        samples_per_output: samples_per_output(ctx) as f32,
        sample_rate: ctx.sample_rate,
        demand: ctx.rate == Rate::Demand,
        triggered: false,
        trigger: Edge::default(),
        restart: PendingRestart::default(),
    }))
}

// ---------------------------------------------------------------------------
// Sequencer
// ---------------------------------------------------------------------------

/// Holds each of option `values` for the matching entry of option
/// `durations` (seconds), then moves to the next.
#[derive(Debug, Clone)]
pub struct Sequencer {
    values: Vec<f32>,
    /// Length of each step in samples.
    lengths: Vec<u64>,
    index: usize,
    elapsed: u64,
    samples_per_output: u64,
    finished: bool,
    restart: PendingRestart,
}

impl UnitGenerator for Sequencer {
    fn generate(&mut self, ctx: &mut GenContext<'_>, inputs: &Inputs<'_>, out: &mut [SignalBuffer]) {
        let looping = inputs.get(0);
        let restart = self.restart.take(ctx.num_samples);
        for i in 0..ctx.num_samples {
            if restart == Some(i) {
                self.index = 0;
                self.elapsed = 0;
                self.finished = false;
            }
            // Skip zero-length steps, at most one full pass per sample.
            let mut skipped = 0;
            while !self.finished && self.elapsed >= self.lengths[self.index] && skipped < self.values.len() {
                self.elapsed -= self.lengths[self.index];
                skipped += 1;
                if self.index + 1 < self.values.len() {
                    self.index += 1;
                } else if looping.at(i) > 0.0 {
                    self.index = 0;
                } else {
                    self.finished = true;
                }
            }
            out[0][i] = self.values[self.index];
            self.elapsed += self.samples_per_output;
        }
    }

    fn trigger_at(&mut self, offset: usize) -> bool {
        self.restart.set(offset);
        true
    }
}

fn build_sequencer(ctx: &BuildContext<'_>) -> Result<Box<dyn UnitGenerator>> {
    let values = options::list(ctx, "values")?;
    let durations = options::list(ctx, "durations")?;
    if durations.len() != values.len() {
        return Err(Error::invalid_option(
            ctx.spec.id,
            "durations",
            format!("expected {} durations, found {}", values.len(), durations.len()),
        ));
    }
    let lengths = durations
        .iter()
        .map(|&d| roundf(finite_or(d, 0.0).max(0.0) * ctx.sample_rate) as u64)
        .collect();
    Ok(Box::new(Sequencer {
        values,
        lengths,
        index: 0,
        elapsed: 0,
        samples_per_output: samples_per_output(ctx),
        finished: false,
        restart: PendingRestart::default(),
    }))
}

// ---------------------------------------------------------------------------
// Change
// ---------------------------------------------------------------------------

/// Outputs `initial` until `time` seconds have passed, then `target`, with an
/// optional linear crossfade of `crossfade` seconds.
///
/// The switch lands exactly on sample `round(time * sampleRate)`. A trigger
/// restarts the timing at the given offset.
#[derive(Debug, Clone)]
pub struct Change {
    elapsed: u64,
    samples_per_output: u64,
    sample_rate: f32,
    restart: PendingRestart,
}

impl Change {
    #[inline]
    fn value(&self, initial: f32, target: f32, time: f32, crossfade: f32) -> f32 {
        let switch = roundf(finite_or(time, 0.0).max(0.0) * self.sample_rate) as u64;
        let fade = roundf(finite_or(crossfade, 0.0).max(0.0) * self.sample_rate) as u64;
        if self.elapsed < switch {
            initial
        } else if self.elapsed < switch.saturating_add(fade) {
            lerp(initial, target, (self.elapsed - switch) as f32 / fade as f32)
        } else {
            target
        }
    }
}

impl UnitGenerator for Change {
    fn generate(&mut self, ctx: &mut GenContext<'_>, inputs: &Inputs<'_>, out: &mut [SignalBuffer]) {
        let (initial, target) = (inputs.get(0), inputs.get(1));
        let (time, crossfade) = (inputs.get(2), inputs.get(3));
        let restart = self.restart.take(ctx.num_samples);
        for i in 0..ctx.num_samples {
            if restart == Some(i) {
                self.elapsed = 0;
            }
            out[0][i] = self.value(initial.at(i), target.at(i), time.at(i), crossfade.at(i));
            self.elapsed = self.elapsed.saturating_add(self.samples_per_output);
        }
    }

    fn trigger_at(&mut self, offset: usize) -> bool {
        self.restart.set(offset);
        true
    }
}

/// Register the control family.
pub fn register(registry: &mut UgenRegistry) {
    let control = |name, description, spec| UgenDescriptor {
        name,
        description,
        category: UgenCategory::Control,
        spec,
    };
    registry.register(
        control("Sequence", "Steps through a list of values", &SEQUENCE_SPEC),
        build_sequence,
    );
    registry.register(
        control("Sequencer", "Values held for per-step durations", &SEQUENCER_SPEC),
        build_sequencer,
    );
    registry.register(
        control("Change", "Timed switch with optional crossfade", &CHANGE_SPEC),
        |ctx| {
            Ok(Box::new(Change {
                elapsed: 0,
                samples_per_output: samples_per_output(ctx),
                sample_rate: ctx.sample_rate,
                restart: PendingRestart::default(),
            }))
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{SR, collect, env, render};
    use sonant_core::NodeDescriptor;

    // 100 control-rate outputs per second.
    const BLOCK: usize = 480;

    fn sequence(values: &[f32]) -> NodeDescriptor {
        NodeDescriptor::new("sequence").option("values", values)
    }

    #[test]
    fn sequence_holds_last_value() {
        let desc = sequence(&[1.0, 2.0, 3.0]).input("freq", 50.0);
        let (_, out) = render(&mut env(BLOCK), &desc, 8);
        assert_eq!(out, [1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 3.0, 3.0]);
    }

    #[test]
    fn sequence_loops() {
        let desc = sequence(&[1.0, 2.0, 3.0]).input("freq", 50.0).input("loop", 1.0);
        let (_, out) = render(&mut env(BLOCK), &desc, 8);
        assert_eq!(out, [1.0, 1.0, 2.0, 2.0, 3.0, 3.0, 1.0, 1.0]);
    }

    #[test]
    fn sequence_index_range() {
        let desc = sequence(&[1.0, 2.0, 3.0, 4.0])
            .input("freq", 100.0)
            .input("start", 1.0)
            .input("end", 3.0)
            .input("loop", 1.0);
        let (_, out) = render(&mut env(BLOCK), &desc, 5);
        assert_eq!(out, [2.0, 3.0, 2.0, 3.0, 2.0]);
    }

    #[test]
    fn audio_rate_sequence() {
        let desc = sequence(&[0.0, 1.0])
            .rate(Rate::Audio)
            .input("freq", SR / 2.0)
            .input("loop", 1.0);
        let (_, out) = render(&mut env(8), &desc, 1);
        assert_eq!(out, [0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn demand_sequence_advances_on_trigger() {
        let mut env = env(16);
        let desc = sequence(&[5.0, 6.0]).rate(Rate::Demand);
        let (id, out) = render(&mut env, &desc, 2);
        assert_eq!(out, [5.0, 5.0]);

        env.set_input(id, "trigger", 1.0).unwrap();
        assert_eq!(collect(&mut env, id, 2), [6.0, 6.0]);
        env.set_input(id, "trigger", 0.0).unwrap();
        collect(&mut env, id, 1);
        env.set_input(id, "trigger", 1.0).unwrap();
        // No loop: holds the last value.
        assert_eq!(collect(&mut env, id, 1), [6.0]);
    }

    #[test]
    fn driven_trigger_switches_to_triggered_mode() {
        let mut env = env(48);
        // A trigger every 16 samples at audio rate.
        let desc = sequence(&[1.0, 2.0, 3.0])
            .rate(Rate::Audio)
            .input("loop", 1.0)
            .input("trigger", NodeDescriptor::new("impulse").input("freq", SR / 16.0));
        let (_, out) = render(&mut env, &desc, 1);
        assert_eq!([out[0], out[8], out[24], out[40]], [2.0, 2.0, 3.0, 1.0]);
    }

    #[test]
    fn control_rate_sequence_restarts_on_next_output() {
        let mut env = env(BLOCK);
        let desc = sequence(&[1.0, 2.0, 3.0]).input("freq", 50.0);
        let (id, out) = render(&mut env, &desc, 4);
        assert_eq!(out, [1.0, 1.0, 2.0, 2.0]);
        assert!(env.trigger_at(id, 100));
        assert_eq!(collect(&mut env, id, 4), [1.0, 1.0, 2.0, 2.0]);
    }

    #[test]
    fn audio_rate_sequence_restarts_at_offset() {
        let mut env = env(8);
        let desc = sequence(&[0.0, 1.0])
            .rate(Rate::Audio)
            .input("freq", SR / 2.0)
            .input("loop", 1.0);
        let (id, _) = render(&mut env, &desc, 1);
        assert!(env.trigger_at(id, 3));
        assert_eq!(collect(&mut env, id, 1), [0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn sequence_requires_values() {
        let mut env = env(16);
        assert!(env.build(&NodeDescriptor::new("sequence")).is_err());
        assert!(env.build(&sequence(&[])).is_err());
    }

    #[test]
    fn sequencer_follows_durations() {
        let desc = NodeDescriptor::new("sequencer")
            .rate(Rate::Audio)
            .option("values", vec![1.0, 2.0])
            .option("durations", vec![4.0 / SR, 8.0 / SR]);
        let (_, out) = render(&mut env(16), &desc, 1);
        assert_eq!(out, [1.0, 1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0, 2.0]);

        let looped = desc.input("loop", 1.0);
        let (_, out) = render(&mut env(16), &looped, 1);
        assert_eq!(&out[12..], &[1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn sequencer_lengths_must_match() {
        let desc = NodeDescriptor::new("sequencer")
            .option("values", vec![1.0, 2.0])
            .option("durations", vec![1.0]);
        assert!(env(16).build(&desc).is_err());
    }

    #[test]
    fn change_switches_with_crossfade() {
        let desc = NodeDescriptor::new("change")
            .input("initial", 0.0)
            .input("target", 1.0)
            .input("time", 10.0 / SR)
            .input("crossfade", 4.0 / SR);
        let (_, out) = render(&mut env(32), &desc, 1);
        assert!(out[..11].iter().all(|&s| s == 0.0));
        assert_eq!(&out[11..14], &[0.25, 0.5, 0.75]);
        assert!(out[14..].iter().all(|&s| s == 1.0));
    }

    #[test]
    fn change_trigger_restarts_at_offset() {
        let mut env = env(32);
        let desc = NodeDescriptor::new("change")
            .input("initial", -1.0)
            .input("target", 1.0)
            .input("time", 10.0 / SR);
        let (id, _) = render(&mut env, &desc, 1);
        assert!(env.trigger_at(id, 5));
        let out = collect(&mut env, id, 1);
        assert!(out[..5].iter().all(|&s| s == 1.0));
        assert!(out[5..15].iter().all(|&s| s == -1.0));
        assert!(out[15..].iter().all(|&s| s == 1.0));
    }

    #[test]
    fn control_rate_change_restarts_on_next_output() {
        let mut env = env(32);
        let desc = NodeDescriptor::new("change")
            .rate(Rate::Control)
            .input("initial", -1.0)
            .input("target", 1.0)
            .input("time", 64.0 / SR);
        let (id, out) = render(&mut env, &desc, 4);
        assert_eq!(out, [-1.0, -1.0, 1.0, 1.0]);
        assert!(env.trigger_at(id, 5));
        assert_eq!(collect(&mut env, id, 3), [-1.0, -1.0, 1.0]);
    }

    #[test]
    fn change_requires_both_endpoints() {
        let mut env = env(32);
        assert!(env.build(&NodeDescriptor::new("change").input("initial", 0.0)).is_err());
    }
}
