//! Benchmarks for rendering the output bus.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use rtrb::Consumer;
use tonetape::{tone::ToneConfig, AudioContext, EngineConfig, ToneSource};

use crate::BLOCK_SIZES;

fn running_context() -> AudioContext {
    let ctx = AudioContext::new(EngineConfig::default());
    ctx.resume().expect("fresh context");
    ctx
}

/// Pull everything out of the tap so it never fills up
fn drain(stream: &mut Consumer<f32>) {
    let available = stream.slots();
    if let Ok(chunk) = stream.read_chunk(available) {
        chunk.commit_all();
    }
}

pub fn bench_bus(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/bus");

    for &size in BLOCK_SIZES {
        // Device-shaped stereo buffer
        let mut data = vec![0.0f32; size * 2];

        // === IDLE: running context, nothing connected ===
        let ctx = running_context();
        group.bench_with_input(BenchmarkId::new("empty", size), &size, |b, _| {
            b.iter(|| ctx.render(black_box(&mut data)))
        });

        // === TONE: the live test tone ===
        let ctx = running_context();
        let mut tone = ToneSource::new(&ctx, &ToneConfig::default()).expect("tone");
        tone.start().expect("start");
        group.bench_with_input(BenchmarkId::new("tone", size), &size, |b, _| {
            b.iter(|| ctx.render(black_box(&mut data)))
        });

        // === RECORDING: tone routed into an armed tap ===
        let ctx = running_context();
        let mut tone = ToneSource::new(&ctx, &ToneConfig::default()).expect("tone");
        tone.start().expect("start");
        let (tap, mut stream) = ctx.create_tap(48_000).expect("tap");
        ctx.connect_tap(tone.source_id(), tap).expect("route");
        ctx.arm_tap(tap).expect("arm");
        group.bench_with_input(BenchmarkId::new("tone_recording", size), &size, |b, _| {
            b.iter(|| {
                ctx.render(black_box(&mut data));
                drain(&mut stream);
            })
        });
    }

    group.finish();
}
