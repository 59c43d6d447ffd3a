//! Benchmarks for the per-block synchronization path.
//!
//! Run with: cargo bench
//!
//! The block protocol runs inside the audio callback, so it must fit
//! comfortably within real-time deadlines alongside the actual DSP.
//!
//! Reference timing at 48kHz sample rate:
//!   - 64 samples  = 1.33ms deadline
//!   - 128 samples = 2.67ms deadline
//!   - 256 samples = 5.33ms deadline
//!   - 512 samples = 10.67ms deadline

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

use saavy_params::dsp::shape::LfoShape;
use saavy_params::engine::{Edit, ParamController};
use saavy_params::modulation::lfo::LfoModulator;
use saavy_params::modulation::matrix::SourceId;
use saavy_params::modulation::BlockCtx;
use saavy_params::param::{ParamId, ParamRange};
use saavy_params::preset::{build_configs, ConnectionSpec, ModeSpec, ParamSpec};

/// Common buffer sizes used in audio applications.
const BLOCK_SIZES: &[usize] = &[64, 128, 256, 512];

const SAMPLE_RATE: f32 = 48_000.0;
const PARAMS: u32 = 32;

fn build_controller(
    sources: u32,
    connections_per_source: u32,
) -> ParamController<rtrb::Consumer<Edit>> {
    let specs: Vec<ParamSpec> = (0..PARAMS)
        .map(|index| {
            ParamSpec::new(
                ParamId(index),
                format!("p{index}"),
                ModeSpec::new("linear", ParamRange::linear(0.0, 1.0)),
            )
        })
        .collect();
    let configs = build_configs(&specs).expect("bench definitions");
    let (mut controller, mut handle) = ParamController::with_edit_queue(configs, SAMPLE_RATE, 1024);

    for source in 0..sources {
        handle.add_source(
            SourceId(source),
            Box::new(LfoModulator::new(LfoShape::Sine, 0.5 + source as f32)),
        );
        for connection in 0..connections_per_source {
            handle.add_connection(
                ConnectionSpec::new(
                    SourceId(source),
                    ParamId((source * connections_per_source + connection) % PARAMS),
                    0.25,
                )
                .with_times(5.0, 50.0),
            );
        }
    }
    // Apply the staged edits before measuring
    controller.process_block(&BlockCtx::new(SAMPLE_RATE, 120.0), 64);
    controller
}

fn bench_unmodulated(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine/block");
    let ctx = BlockCtx::new(SAMPLE_RATE, 120.0);

    for &size in BLOCK_SIZES {
        // 32 parameters, no modulation routing
        let mut controller = build_controller(0, 0);
        group.bench_with_input(BenchmarkId::new("unmodulated", size), &size, |b, _| {
            b.iter(|| {
                let state = controller.process_block(black_box(&ctx), size);
                black_box(state.ending(0));
            })
        });
    }

    group.finish();
}

fn bench_modulated(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine/block");
    let ctx = BlockCtx::new(SAMPLE_RATE, 120.0);

    for &size in BLOCK_SIZES {
        // 8 LFOs feeding 32 smoothed connections
        let mut controller = build_controller(8, 4);
        group.bench_with_input(BenchmarkId::new("8_lfos_32_routes", size), &size, |b, _| {
            b.iter(|| {
                let state = controller.process_block(black_box(&ctx), size);
                black_box(state.ending(0));
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_unmodulated, bench_modulated);
criterion_main!(benches);
