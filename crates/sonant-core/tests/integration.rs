//! Integration tests for sonant-core.
//!
//! Exercises the engine through its public API only: descriptor expansion,
//! rate-dependent strides, mul/add post-processing, feedback, scheduling
//! against the evaluation loop, and node lifetime across swaps.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use sonant_core::{
    Environment, EnvironmentConfig, Error, GenContext, InputSpec, Inputs, NodeDescriptor, PlayState, Position,
    Rate, SignalBuffer, TimeUnit, UgenCategory, UgenDescriptor, UgenRegistry, UgenSpec, UnitGenerator,
};

const BLOCK: usize = 32;

// ============================================================================
// Test generators
// ============================================================================

static RAMP_SPEC: UgenSpec = UgenSpec {
    id: "ramp",
    inputs: &[InputSpec::new("step", 1.0)],
    rates: &[Rate::Audio, Rate::Control],
    default_rate: Rate::Audio,
};

/// Running counter advanced by `step` per sample.
struct Ramp {
    value: f32,
}

impl UnitGenerator for Ramp {
    fn generate(&mut self, ctx: &mut GenContext<'_>, inputs: &Inputs<'_>, out: &mut [SignalBuffer]) {
        let step = inputs.get(0);
        for i in 0..ctx.num_samples {
            out[0][i] = self.value;
            self.value += step.at(i);
        }
    }
}

static SUM_SPEC: UgenSpec = UgenSpec {
    id: "sum",
    inputs: &[InputSpec::new("a", 0.0), InputSpec::new("b", 0.0)],
    rates: &[Rate::Audio, Rate::Control],
    default_rate: Rate::Audio,
};

struct Sum;

impl UnitGenerator for Sum {
    fn generate(&mut self, ctx: &mut GenContext<'_>, inputs: &Inputs<'_>, out: &mut [SignalBuffer]) {
        let (a, b) = (inputs.get(0), inputs.get(1));
        for i in 0..ctx.num_samples {
            out[0][i] = a.at(i) + b.at(i);
        }
    }
}

static OUT_SPEC: UgenSpec = UgenSpec {
    id: "out",
    inputs: &[InputSpec::multi("sources"), InputSpec::new("bus", 0.0)],
    rates: &[Rate::Audio],
    default_rate: Rate::Audio,
};

/// Writes each source channel to consecutive buses.
struct Out;

impl UnitGenerator for Out {
    fn generate(&mut self, ctx: &mut GenContext<'_>, inputs: &Inputs<'_>, out: &mut [SignalBuffer]) {
        let sources = inputs.get(0);
        let bus = inputs.value(1).max(0.0) as usize;
        let n = ctx.num_samples;
        for ch in 0..sources.num_channels() {
            let mut block = [0.0f32; BLOCK];
            for (i, s) in block[..n].iter_mut().enumerate() {
                *s = sources.channel_at(ch, i);
            }
            ctx.buses.mix_into(bus + ch, &block[..n]);
        }
        out[0][..n].fill(0.0);
    }
}

static BLIP_SPEC: UgenSpec = UgenSpec {
    id: "blip",
    inputs: &[],
    rates: &[Rate::Audio],
    default_rate: Rate::Audio,
};

/// Emits a one-sample impulse at its trigger offset.
struct Blip {
    pending: Option<usize>,
}

impl UnitGenerator for Blip {
    fn generate(&mut self, ctx: &mut GenContext<'_>, _inputs: &Inputs<'_>, out: &mut [SignalBuffer]) {
        out[0][..ctx.num_samples].fill(0.0);
        if let Some(offset) = self.pending.take()
            && offset < ctx.num_samples
        {
            out[0][offset] = 1.0;
        }
    }

    fn trigger_at(&mut self, offset: usize) -> bool {
        self.pending = Some(offset);
        true
    }
}

fn registry() -> UgenRegistry {
    let mut registry = UgenRegistry::new();
    let entries: [(&'static UgenSpec, sonant_core::UgenConstructor); 4] = [
        (&RAMP_SPEC, |_| Ok(Box::new(Ramp { value: 0.0 }))),
        (&SUM_SPEC, |_| Ok(Box::new(Sum))),
        (&OUT_SPEC, |_| Ok(Box::new(Out))),
        (&BLIP_SPEC, |_| Ok(Box::new(Blip { pending: None }))),
    ];
    for (spec, constructor) in entries {
        registry.register(
            UgenDescriptor {
                name: spec.id,
                description: "integration test generator",
                category: UgenCategory::Math,
                spec,
            },
            constructor,
        );
    }
    registry
}

fn env() -> Environment {
    let config = EnvironmentConfig {
        block_size: BLOCK,
        sample_rate: 1000.0,
        ..EnvironmentConfig::default()
    };
    Environment::new(config, registry()).unwrap()
}

// ============================================================================
// 1. Descriptor expansion and validation
// ============================================================================

#[test]
fn unknown_ugen_and_input_are_rejected() {
    let mut env = env();
    assert!(matches!(
        env.build(&NodeDescriptor::new("nope")),
        Err(Error::UnknownUgen(name)) if name == "nope"
    ));
    assert!(matches!(
        env.build(&NodeDescriptor::new("sum").input("c", 1.0)),
        Err(Error::UnknownInput { .. })
    ));
    assert!(env.graph().is_empty());
}

#[test]
fn missing_required_input_is_rejected() {
    let mut env = env();
    assert!(matches!(
        env.build(&NodeDescriptor::new("out")),
        Err(Error::MissingInput { input, .. }) if input == "sources"
    ));
}

#[test]
fn unsupported_rate_is_rejected() {
    let mut env = env();
    assert!(matches!(
        env.build(&NodeDescriptor::new("out").input("sources", 0.0).rate(Rate::Control)),
        Err(Error::UnsupportedRate { .. })
    ));
}

#[test]
fn failed_nested_build_leaves_no_nodes() {
    let mut env = env();
    let desc = NodeDescriptor::new("sum")
        .input("a", NodeDescriptor::new("ramp"))
        .input("b", NodeDescriptor::new("sum").input("a", NodeDescriptor::new("missing")));
    assert!(env.build(&desc).is_err());
    assert!(env.graph().is_empty());
}

#[test]
fn array_input_becomes_multichannel_value() {
    let mut env = env();
    env.add(
        &NodeDescriptor::new("out").input("sources", vec![0.25, -0.5]),
        Position::Tail,
    )
    .unwrap();
    env.generate(BLOCK);
    assert!(env.bus(0).unwrap().iter().all(|&s| s == 0.25));
    assert!(env.bus(1).unwrap().iter().all(|&s| s == -0.5));
}

// ============================================================================
// 2. Rates, strides, and mul/add
// ============================================================================

#[test]
fn audio_consumer_reads_control_input_as_held_value() {
    let mut env = env();
    let id = env
        .add(
            &NodeDescriptor::new("sum")
                .input("a", NodeDescriptor::new("ramp").rate(Rate::Control))
                .input("b", NodeDescriptor::new("ramp")),
            Position::Tail,
        )
        .unwrap();
    env.generate(BLOCK);
    env.generate(BLOCK);
    // Control ramp emitted 1.0 for block two; audio ramp runs 32..64.
    let out = &env.output(id).unwrap()[0];
    for (i, &s) in out.iter().enumerate() {
        assert_eq!(s, 1.0 + (BLOCK + i) as f32);
    }
}

#[test]
fn mul_and_add_apply_after_generation() {
    let mut env = env();
    let id = env
        .add(
            &NodeDescriptor::new("ramp").input("mul", 10.0).input("add", 2.0),
            Position::Tail,
        )
        .unwrap();
    env.generate(BLOCK);
    let out = &env.output(id).unwrap()[0];
    for (i, &s) in out.iter().enumerate() {
        assert_eq!(s, i as f32 * 10.0 + 2.0);
    }
}

#[test]
fn audio_rate_mul_is_applied_per_sample() {
    let mut env = env();
    let id = env
        .add(
            &NodeDescriptor::new("ramp")
                .input("step", 0.0)
                .input("add", 1.0)
                .input("mul", NodeDescriptor::new("ramp")),
            Position::Tail,
        )
        .unwrap();
    env.generate(BLOCK);
    // Ramp with step 0 outputs 0, so out = 0 * mul + 1.
    assert!(env.output(id).unwrap()[0].iter().all(|&s| s == 1.0));
}

#[test]
fn multichannel_mul_is_rejected() {
    let mut env = env();
    assert!(matches!(
        env.build(&NodeDescriptor::new("ramp").input("mul", vec![1.0, 2.0])),
        Err(Error::ChannelMismatch { .. })
    ));
}

#[test]
fn shared_input_is_generated_once_per_block() {
    let mut env = env();
    let ramp = env.build(&NodeDescriptor::new("ramp")).unwrap();
    let id = env
        .add(&NodeDescriptor::new("sum").input("a", ramp).input("b", ramp), Position::Tail)
        .unwrap();
    env.generate(BLOCK);
    let out = &env.output(id).unwrap()[0];
    for (i, &s) in out.iter().enumerate() {
        assert_eq!(s, 2.0 * i as f32);
    }
}

// ============================================================================
// 3. Feedback and sanitizing
// ============================================================================

#[test]
fn self_feedback_reads_silence() {
    let mut env = env();
    let id = env.add(&NodeDescriptor::new("sum").input("b", 0.5), Position::Tail).unwrap();
    env.set_input(id, "a", id).unwrap();
    for _ in 0..4 {
        env.generate(BLOCK);
    }
    assert!(env.output(id).unwrap()[0].iter().all(|&s| s == 0.5));
}

#[test]
fn non_finite_output_is_zeroed() {
    let mut env = env();
    let id = env
        .add(
            &NodeDescriptor::new("ramp").input("step", NodeDescriptor::new("ramp").input("mul", f32::MAX)),
            Position::Tail,
        )
        .unwrap();
    env.generate(BLOCK);
    // The step node overflows to infinity, so its whole block is zeroed and
    // the ramp never moves.
    let step = env.get_input(id, "step").unwrap();
    assert!(env.output(step).unwrap()[0].iter().all(|&s| s == 0.0));
    assert!(env.output(id).unwrap()[0].iter().all(|&s| s == 0.0));
}

// ============================================================================
// 4. Scheduling against evaluation
// ============================================================================

#[test]
fn scheduled_trigger_lands_on_exact_sample() {
    let mut env = env();
    let blip = env.add(&NodeDescriptor::new("blip"), Position::Tail).unwrap();
    // 50 ms at 1 kHz = sample 50 = block 1, offset 18.
    env.once(50.0, TimeUnit::Milliseconds, move |env: &mut Environment, fire| {
        env.trigger_at(blip, fire.offset);
    });
    env.generate(BLOCK);
    assert!(env.output(blip).unwrap()[0].iter().all(|&s| s == 0.0));
    env.generate(BLOCK);
    let out = &env.output(blip).unwrap()[0];
    assert_eq!(out.iter().position(|&s| s == 1.0), Some(18));
}

#[test]
fn callback_stop_takes_effect_after_its_block() {
    let mut env = env();
    env.add(&NodeDescriptor::new("out").input("sources", 1.0), Position::Tail)
        .unwrap();
    env.once(BLOCK as f64 * 2.0, TimeUnit::Samples, |env: &mut Environment, _| env.stop());
    env.start();
    let mut out = vec![0.0; 2 * BLOCK * 4];
    let frames = env.render(&mut out);
    // Fires at the start of the third block, which still renders.
    assert_eq!(frames, BLOCK * 3);
    assert_eq!(env.state(), PlayState::Stopped);
    assert!(out[..2 * BLOCK * 3].chunks(2).all(|f| f[0] == 1.0));
    assert!(out[2 * BLOCK * 3..].iter().all(|&s| s == 0.0));
}

#[test]
fn repeat_can_cancel_itself() {
    let mut env = env();
    let count = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&count);
    env.repeat(10.0, TimeUnit::Samples, move |env: &mut Environment, fire| {
        if seen.fetch_add(1, Ordering::SeqCst) == 2 {
            env.clear(fire.handle);
        }
    });
    for _ in 0..10 {
        env.generate(BLOCK);
    }
    assert_eq!(count.load(Ordering::SeqCst), 3);
}

#[test]
fn callback_reset_abandons_its_block() {
    let mut env = env();
    env.add(&NodeDescriptor::new("out").input("sources", 1.0), Position::Tail)
        .unwrap();
    env.once(BLOCK as f64 * 2.0, TimeUnit::Samples, |env: &mut Environment, _| env.reset());
    assert_eq!(env.generate(BLOCK), BLOCK);
    assert_eq!(env.generate(BLOCK), BLOCK);
    assert_eq!(env.now(), 2 * BLOCK as u64);

    assert_eq!(env.generate(BLOCK), 0);
    assert_eq!(env.now(), 0);
    assert_eq!(env.blocks_generated(), 0);
    assert!(env.node_list().is_empty());
    assert!(env.bus(0).unwrap().iter().all(|&s| s == 0.0));

    // The clock runs again from zero on the next block.
    assert_eq!(env.generate(BLOCK), BLOCK);
    assert_eq!(env.now(), BLOCK as u64);
}

#[test]
fn clearing_a_one_shot_from_its_own_callback_is_a_no_op() {
    let mut env = env();
    let cleared = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&cleared);
    let handle = env.once(5.0, TimeUnit::Samples, move |env: &mut Environment, fire| {
        seen.store(if env.clear(fire.handle) { 1 } else { 2 }, Ordering::SeqCst);
    });
    env.generate(BLOCK);
    assert_eq!(cleared.load(Ordering::SeqCst), 2);
    assert!(!env.clear(handle));
}

// ============================================================================
// 5. Node lifetime
// ============================================================================

#[test]
fn replacing_a_tree_destroys_only_orphans() {
    let mut env = env();
    let shared = env.build(&NodeDescriptor::new("blip").named("shared")).unwrap();
    let old = env
        .add(&NodeDescriptor::new("sum").input("a", shared).input("b", NodeDescriptor::new("blip")), Position::Tail)
        .unwrap();
    let unshared = env.get_input(old, "b").unwrap();
    env.add(&NodeDescriptor::new("sum").input("a", shared), Position::Tail).unwrap();

    let new = env.build(&NodeDescriptor::new("ramp")).unwrap();
    env.replace_tree(new, old).unwrap();

    assert!(env.node(old).is_none());
    assert!(env.node(shared).is_some());
    assert_eq!(env.get_node("shared"), Some(shared));
    assert!(env.node(unshared).is_none());
    assert!(env.node_list().contains(new));
}

#[test]
fn stale_handles_do_not_alias_new_nodes() {
    let mut env = env();
    let a = env.add(&NodeDescriptor::new("blip"), Position::Tail).unwrap();
    env.remove_tree(a);
    let b = env.add(&NodeDescriptor::new("blip"), Position::Tail).unwrap();
    assert_ne!(a, b);
    assert!(env.node(a).is_none());
    assert!(!env.trigger_at(a, 0));
    assert!(env.trigger_at(b, 0));
}
