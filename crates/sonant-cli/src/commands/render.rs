//! Offline render of a demo patch.

#![allow(clippy::print_literal)] // Table labels use literal strings intentionally

use std::path::PathBuf;

use clap::Args;
use sonant_core::{Environment, NodeDescriptor, NodeId, Position};

use super::load_config;

/// Pitch ratios the first voice steps through, one per beat.
const MELODY: [f32; 4] = [1.0, 1.25, 1.5, 2.0];

/// Frames rendered per pull.
const CHUNK_FRAMES: usize = 4096;

#[derive(Args)]
pub struct RenderArgs {
    /// Engine configuration file (TOML)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Base frequency in Hz
    #[arg(long, default_value = "220.0")]
    freq: f32,

    /// Duration in seconds
    #[arg(long, default_value = "2.0")]
    seconds: f32,

    /// Number of detuned voices
    #[arg(long, default_value = "3", value_parser = clap::value_parser!(u16).range(1..=64))]
    voices: u16,

    /// Tempo for the retuning pattern
    #[arg(long, default_value = "120.0")]
    bpm: f64,
}

/// Level statistics over rendered frames.
#[derive(Debug, Default)]
struct Levels {
    peak: f32,
    sum_squares: f64,
    samples: usize,
    non_finite: usize,
}

impl Levels {
    fn add(&mut self, samples: &[f32]) {
        for &s in samples {
            if s.is_finite() {
                self.peak = self.peak.max(s.abs());
                self.sum_squares += f64::from(s) * f64::from(s);
            } else {
                self.non_finite += 1;
            }
            self.samples += 1;
        }
    }

    fn rms(&self) -> f64 {
        if self.samples == 0 {
            0.0
        } else {
            (self.sum_squares / self.samples as f64).sqrt()
        }
    }
}

fn to_db(level: f64) -> f64 {
    if level > 0.0 { 20.0 * level.log10() } else { f64::NEG_INFINITY }
}

/// Add `voices` detuned sines mixed to every output channel. Returns the
/// first voice's oscillator.
fn build_patch(env: &mut Environment, freq: f32, voices: u16) -> anyhow::Result<NodeId> {
    let channels = env.config().num_channels as f32;
    let gain = 0.5 / f32::from(voices);
    let center = f32::from(voices - 1) / 2.0;
    let mut first = None;
    for v in 0..voices {
        let detune = 1.0 + 0.003 * (f32::from(v) - center);
        let osc = NodeDescriptor::new("sinOsc")
            .input("freq", freq * detune)
            .input("mul", gain);
        let out = NodeDescriptor::new("out").input("sources", osc).input("expand", channels);
        let id = env.add(&out, Position::Tail)?;
        if first.is_none() {
            first = env.get_input(id, "sources");
        }
    }
    first.ok_or_else(|| anyhow::anyhow!("patch has no voices"))
}

pub fn run(args: RenderArgs) -> anyhow::Result<()> {
    let config = load_config(args.config.as_deref())?;
    let channels = config.num_channels;
    let sample_rate = config.sample_rate;
    let mut env = Environment::new(config, sonant_ugens::registry())?;
    env.set_tempo(args.bpm);

    let lead = build_patch(&mut env, args.freq, args.voices)?;
    let base = args.freq;
    let mut beat = 0usize;
    env.repeat_beats(1.0, move |env: &mut Environment, _| {
        beat = (beat + 1) % MELODY.len();
        if let Err(err) = env.set_input(lead, "freq", base * MELODY[beat]) {
            tracing::warn!(%err, "retune failed");
        }
    });

    let total_frames = (f64::from(args.seconds.max(0.0)) * f64::from(sample_rate)).round() as usize;
    tracing::info!(frames = total_frames, voices = args.voices, bpm = args.bpm, "rendering");

    env.start();
    let mut levels = Levels::default();
    let mut chunk = vec![0.0f32; CHUNK_FRAMES * channels];
    let mut remaining = total_frames;
    while remaining > 0 {
        let frames = remaining.min(CHUNK_FRAMES);
        let out = &mut chunk[..frames * channels];
        let rendered = env.render(out);
        levels.add(&out[..rendered * channels]);
        remaining -= frames;
    }
    env.stop();

    println!("Rendered {total_frames} frames ({channels} ch @ {sample_rate} Hz)");
    println!("  {:10} {:>10.4}", "Peak", levels.peak);
    println!("  {:10} {:>10.2}", "Peak dBFS", to_db(f64::from(levels.peak)));
    println!("  {:10} {:>10.4}", "RMS", levels.rms());
    println!("  {:10} {:>10.2}", "RMS dBFS", to_db(levels.rms()));
    println!("  {:10} {:>10}", "NaN/Inf", levels.non_finite);
    println!("  {:10} {:>10}", "Blocks", env.blocks_generated());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_track_peak_rms_and_non_finite() {
        let mut levels = Levels::default();
        levels.add(&[0.5, -1.0, f32::NAN, 0.0]);
        assert_eq!(levels.peak, 1.0);
        assert_eq!(levels.non_finite, 1);
        assert!((levels.rms() - (1.25f64 / 4.0).sqrt()).abs() < 1e-9);
    }

    #[test]
    fn patch_builds_one_out_per_voice() {
        let mut env = Environment::new(Default::default(), sonant_ugens::registry()).unwrap();
        let lead = build_patch(&mut env, 220.0, 3).unwrap();
        assert_eq!(env.node(lead).unwrap().ugen_id(), "sinOsc");
        // Each voice: out, sinOsc, and freq/mul/expand/bus values.
        assert_eq!(env.node_list().iter().filter(|&id| env.node(id).unwrap().ugen_id() == "out").count(), 3);
    }
}
