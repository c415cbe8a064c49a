//! Benchmarks for bus summing and channel fan-out.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use tonetape::dsp::mix;

use crate::BLOCK_SIZES;

pub fn bench_mix(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/mix");

    for &size in BLOCK_SIZES {
        let signal_a: Vec<f32> = (0..size).map(|i| (i as f32 * 0.1).sin()).collect();
        let signal_b: Vec<f32> = (0..size).map(|i| (i as f32 * 0.15).cos()).collect();

        let mut buffer_a = signal_a.clone();
        group.bench_with_input(BenchmarkId::new("sum_into", size), &size, |b, _| {
            b.iter(|| {
                buffer_a.copy_from_slice(&signal_a);
                mix::sum_into(black_box(&mut buffer_a), black_box(&signal_b));
            })
        });

        // Mono to stereo, the common device layout
        let mut interleaved = vec![0.0f32; size * 2];
        group.bench_with_input(BenchmarkId::new("fan_out_stereo", size), &size, |b, _| {
            b.iter(|| {
                mix::fan_out(black_box(&signal_a), black_box(&mut interleaved), 2);
            })
        });

        group.bench_with_input(BenchmarkId::new("peak", size), &size, |b, _| {
            b.iter(|| black_box(mix::peak(black_box(&signal_a))))
        });
    }

    group.finish();
}
