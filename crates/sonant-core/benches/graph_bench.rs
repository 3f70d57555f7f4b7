//! Criterion benchmarks for the node graph and evaluation loop.
//!
//! Measures engine overhead independently of DSP cost using a trivial `Gain`
//! generator. Three axes:
//!
//! - **Build**: descriptor expansion into nodes
//! - **Generate**: `Environment::generate()` throughput at varying block sizes
//! - **Schedule**: callback dispatch for dense repeating actions
//!
//! Run with: `cargo bench -p sonant-core -- graph/`
#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use sonant_core::{
    Environment, EnvironmentConfig, GenContext, InputSpec, Inputs, NodeDescriptor, Position, Rate, SignalBuffer,
    TimeUnit, UgenCategory, UgenDescriptor, UgenRegistry, UgenSpec, UnitGenerator,
};

const SAMPLE_RATE: f32 = 48000.0;
const BLOCK_SIZES: &[usize] = &[64, 128, 256, 512, 1024];

// ---------------------------------------------------------------------------
// Trivial Gain generator, isolates graph overhead from DSP cost
// ---------------------------------------------------------------------------

static GAIN_SPEC: UgenSpec = UgenSpec {
    id: "gain",
    inputs: &[InputSpec::new("source", 0.0)],
    rates: &[Rate::Audio],
    default_rate: Rate::Audio,
};

struct Gain;

impl UnitGenerator for Gain {
    fn generate(&mut self, ctx: &mut GenContext<'_>, inputs: &Inputs<'_>, out: &mut [SignalBuffer]) {
        let source = inputs.get(0);
        for i in 0..ctx.num_samples {
            out[0][i] = source.at(i) * 0.9;
        }
    }
}

fn registry() -> UgenRegistry {
    let mut registry = UgenRegistry::new();
    registry.register(
        UgenDescriptor {
            name: "Gain",
            description: "Constant gain",
            category: UgenCategory::Math,
            spec: &GAIN_SPEC,
        },
        |_| Ok(Box::new(Gain)),
    );
    registry
}

fn environment(block_size: usize) -> Environment {
    let config = EnvironmentConfig {
        sample_rate: SAMPLE_RATE,
        block_size,
        ..EnvironmentConfig::default()
    };
    Environment::new(config, registry()).unwrap()
}

/// A chain of `depth` gains over a constant, with `mul` and `add`.
fn chain(depth: usize) -> NodeDescriptor {
    (0..depth).fold(NodeDescriptor::value(0.5), |inner, _| {
        NodeDescriptor::new("gain")
            .input("source", inner)
            .input("mul", 0.5)
            .input("add", 0.1)
    })
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph/build");
    for depth in [4, 16, 64] {
        let desc = chain(depth);
        group.bench_with_input(BenchmarkId::new("chain", depth), &desc, |b, desc| {
            let mut env = environment(256);
            b.iter(|| {
                let id = env.add(black_box(desc), Position::Tail).unwrap();
                env.remove_tree(id);
            });
        });
    }
    group.finish();
}

fn bench_generate(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph/generate");
    for &block_size in BLOCK_SIZES {
        group.bench_with_input(BenchmarkId::new("16_voices", block_size), &block_size, |b, &block_size| {
            let mut env = environment(block_size);
            for _ in 0..16 {
                env.add(&chain(4), Position::Tail).unwrap();
            }
            b.iter(|| black_box(env.generate(block_size)));
        });
    }
    group.finish();
}

fn bench_schedule(c: &mut Criterion) {
    let mut group = c.benchmark_group("graph/schedule");
    group.bench_function("repeat_every_8_samples", |b| {
        let mut env = environment(256);
        let id = env.add(&chain(1), Position::Tail).unwrap();
        let mut level = 0.0f32;
        env.repeat(8.0, TimeUnit::Samples, move |env: &mut Environment, _| {
            level = (level + 0.01) % 1.0;
            if let Some(source) = env.get_input(id, "source") {
                env.set_value(source, &[level]);
            }
        });
        b.iter(|| black_box(env.generate(256)));
    });
    group.finish();
}

criterion_group!(benches, bench_build, bench_generate, bench_schedule);
criterion_main!(benches);
