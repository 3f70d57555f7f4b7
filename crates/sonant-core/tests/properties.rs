//! Property-based tests for sonant-core.
//!
//! Tests time conversion, mul/add arithmetic, table interpolation bounds,
//! scheduler period accuracy, and node-list bookkeeping using proptest for
//! randomized input generation.

use proptest::prelude::*;
use sonant_core::{
    Environment, EnvironmentConfig, HasScheduler, Interpolation, MulAdd, NodeDescriptor, Position, Rate,
    Scheduler, TimeConverter, TimeUnit, UgenRegistry,
};

struct Counter {
    scheduler: Scheduler<Counter>,
    fires: Vec<u64>,
}

impl HasScheduler for Counter {
    fn scheduler(&mut self) -> &mut Scheduler<Counter> {
        &mut self.scheduler
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Seconds convert to the rounded sample count; negative durations and
    /// non-positive tempos convert to zero.
    #[test]
    fn time_conversion(
        seconds in -10.0f64..10.0,
        sample_rate in 8000.0f64..192000.0,
        bpm in -60.0f64..300.0,
    ) {
        let samples = TimeUnit::Seconds.to_samples(seconds, sample_rate);
        if seconds <= 0.0 {
            prop_assert_eq!(samples, 0);
        } else {
            prop_assert_eq!(samples, (seconds * sample_rate).round() as u64);
        }
        let beats = TimeUnit::Beats { bpm }.to_samples(1.0, sample_rate);
        if bpm <= 0.0 {
            prop_assert_eq!(beats, 0);
        } else {
            prop_assert_eq!(beats, (60.0 / bpm * sample_rate).round() as u64);
        }
    }

    /// Control-rate mul/add is plain `x * mul + add` on every sample.
    #[test]
    fn kr_mul_add_matches_arithmetic(
        input in prop::collection::vec(-1.0f32..=1.0, 1..128),
        mul in -4.0f32..4.0,
        add in -4.0f32..4.0,
    ) {
        let strategy = MulAdd::select(Rate::Audio, Some(Rate::Control), Some(Rate::Constant));
        prop_assert_eq!(strategy, MulAdd::KrMulKrAdd);
        let mut out = input.clone();
        strategy.apply(&mut out, &[mul], &[add]);
        for (o, i) in out.iter().zip(&input) {
            prop_assert_eq!(*o, i * mul + add);
        }
    }

    /// Non-audio consumers never get per-sample strategies.
    #[test]
    fn non_audio_consumer_is_kr(mul_audio in any::<bool>(), add_audio in any::<bool>()) {
        let rate = |audio: bool| Some(if audio { Rate::Audio } else { Rate::Control });
        let strategy = MulAdd::select(Rate::Control, rate(mul_audio), rate(add_audio));
        prop_assert_eq!(strategy, MulAdd::KrMulKrAdd);
    }

    /// Linear reads stay within the table's range for any index.
    #[test]
    fn linear_read_is_bounded(
        table in prop::collection::vec(-1.0f32..=1.0, 1..64),
        index in -1000.0f32..1000.0,
    ) {
        let lo = table.iter().copied().fold(f32::INFINITY, f32::min);
        let hi = table.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let v = Interpolation::Linear.read(&table, index);
        prop_assert!(v >= lo - 1e-5 && v <= hi + 1e-5, "{} outside [{}, {}]", v, lo, hi);
    }

    /// A repeating action fires exactly at multiples of its period no matter
    /// how the timeline is cut into blocks.
    #[test]
    fn repeat_period_is_exact(
        interval in 1u64..200,
        blocks in prop::collection::vec(1usize..128, 1..40),
    ) {
        let mut ctx = Counter { scheduler: Scheduler::new(44100.0), fires: Vec::new() };
        ctx.scheduler.repeat(interval as f64, TimeUnit::Samples, |c: &mut Counter, fire| c.fires.push(fire.due));
        for &n in &blocks {
            Scheduler::tick(&mut ctx, n);
        }
        let total: u64 = blocks.iter().map(|&n| n as u64).sum();
        let expected: Vec<u64> = (1..).map(|k| k * interval).take_while(|&t| t < total).collect();
        prop_assert_eq!(ctx.fires, expected);
    }

    /// Adding then removing every tree leaves the list, the name index, and
    /// the arena empty, in any removal order.
    #[test]
    fn add_remove_balances(
        values in prop::collection::vec(-1.0f32..=1.0, 1..16),
        order in prop::collection::vec(any::<prop::sample::Index>(), 16),
    ) {
        let config = EnvironmentConfig { block_size: 16, ..EnvironmentConfig::default() };
        let mut env = Environment::new(config, UgenRegistry::new()).unwrap();
        let mut ids = Vec::new();
        for (i, &v) in values.iter().enumerate() {
            let desc = NodeDescriptor::value(v).named(format!("v{}", i % 3));
            ids.push(env.add(&desc, Position::Head).unwrap());
        }
        env.generate(16);
        for pick in order {
            if ids.is_empty() {
                break;
            }
            let id = ids.remove(pick.index(ids.len()));
            prop_assert!(env.remove_tree(id));
        }
        for id in ids {
            prop_assert!(env.remove_tree(id));
        }
        prop_assert!(env.node_list().is_empty());
        prop_assert_eq!(env.node_list().names_len(), 0);
        prop_assert!(env.graph().is_empty());
    }
}
