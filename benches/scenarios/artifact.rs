//! Benchmarks for finalizing and decoding a take.
//!
//! These run off the audio thread, but a slow encode delays the playback
//! schedule, so they are worth watching.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use tonetape::{
    capture::{ArtifactEncoder, SessionId, WavEncoder, WAV_MIME},
    playback::MediaElement,
    RecordedArtifact,
};

const SAMPLE_RATE: u32 = 48_000;

pub fn bench_artifact(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/artifact");
    group.sample_size(20);

    for seconds in [1u32, 2, 10] {
        let frames = (SAMPLE_RATE * seconds) as usize;
        let samples: Vec<f32> = (0..frames)
            .map(|i| if (i / 55) % 2 == 0 { 0.1 } else { -0.1 })
            .collect();

        group.bench_with_input(BenchmarkId::new("wav_encode", seconds), &seconds, |b, _| {
            b.iter(|| WavEncoder.encode(black_box(&samples), SAMPLE_RATE))
        });

        let data = WavEncoder.encode(&samples, SAMPLE_RATE).expect("encode");
        let artifact =
            RecordedArtifact::new(SessionId::new(0), data, WAV_MIME, SAMPLE_RATE, frames as u64);
        group.bench_with_input(BenchmarkId::new("wav_decode", seconds), &seconds, |b, _| {
            b.iter(|| MediaElement::decode(black_box(&artifact)))
        });
    }

    group.finish();
}
