//! Media element and source node for artifact playback
//!
//! A [`MediaElement`] is the decoded artifact. A [`MediaSourceNode`] reads
//! from it on the bus, resampling when the artifact's rate differs from the
//! context's, and goes inactive once it reaches the end.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use crate::{
    capture::{RecordedArtifact, WAV_MIME},
    graph::{GraphNode, RenderCtx},
};

use super::PlaybackError;

/// Decoded artifact audio (mono)
#[derive(Debug, Clone)]
pub struct MediaElement {
    samples: Arc<[f32]>,
    sample_rate: u32,
}

impl MediaElement {
    /// Decode an artifact. Multichannel audio is averaged down to mono.
    pub fn decode(artifact: &RecordedArtifact) -> Result<Self, PlaybackError> {
        if artifact.mime_type() != WAV_MIME {
            return Err(PlaybackError::UnsupportedFormat(artifact.mime_type()));
        }

        let reader = hound::WavReader::new(Cursor::new(artifact.bytes())).map_err(decode_error)?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<Result<Vec<_>, _>>()
                .map_err(decode_error)?,
            hound::SampleFormat::Int => {
                let max_val = (1i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / max_val))
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(decode_error)?
            }
        };

        let samples: Vec<f32> = if channels == 1 {
            interleaved
        } else {
            interleaved
                .chunks_exact(channels)
                .map(|frame| frame.iter().sum::<f32>() / channels as f32)
                .collect()
        };

        Ok(Self {
            samples: samples.into(),
            sample_rate: spec.sample_rate.max(1),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn frames(&self) -> usize {
        self.samples.len()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    /// Create a source node reading this element from the start
    pub fn source_node(&self) -> MediaSourceNode {
        MediaSourceNode {
            samples: Arc::clone(&self.samples),
            sample_rate: self.sample_rate as f64,
            position: 0.0,
            finished: self.samples.is_empty(),
        }
    }
}

fn decode_error(err: hound::Error) -> PlaybackError {
    PlaybackError::Decode(err.to_string())
}

/// Bus node playing a [`MediaElement`] once
pub struct MediaSourceNode {
    samples: Arc<[f32]>,
    sample_rate: f64,
    /// Read position in source frames
    position: f64,
    finished: bool,
}

impl GraphNode for MediaSourceNode {
    fn render_block(&mut self, out: &mut [f32], ctx: &RenderCtx) {
        let step = self.sample_rate / ctx.sample_rate as f64;
        let len = self.samples.len();

        for sample in out.iter_mut() {
            let index = self.position as usize;
            if index >= len {
                *sample = 0.0;
                self.finished = true;
                continue;
            }

            // Linear interpolation between neighbouring frames
            let frac = (self.position - index as f64) as f32;
            let current = self.samples[index];
            let next = self.samples.get(index + 1).copied().unwrap_or(current);
            *sample = current + (next - current) * frac;

            self.position += step;
        }

        if self.position as usize >= len {
            self.finished = true;
        }
    }

    fn is_active(&self) -> bool {
        !self.finished
    }
}
