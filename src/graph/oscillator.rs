use crate::dsp::oscillator::{OscillatorBlock, OscillatorWaveform};
use crate::graph::node::{GraphNode, RenderCtx};

/*
Audio Oscillator
================

The oscillator is the only sound source on the live bus. It produces a
repeating waveform at a fixed frequency; the gain stage after it sets the
level.

Square: Hollow but powerful - only odd harmonics.
  - Harmonics: 1st, 3rd, 5th, 7th, ... falling off as 1/n
  - A 440 Hz square reads clearly on any speaker, which makes it a good
    test tone for a capture/playback loop.

Sine: A single frequency, no harmonics.
  - Useful when checking levels, since peak amplitude equals gain exactly
    only for the square wave.

Example usage:
  let tone = OscNode::square().with_frequency(440.0);

  // Tone chain: square → fixed gain
  let chain = OscNode::square()
      .with_frequency(440.0)
      .through(GainNode::new(0.1));
*/

pub struct OscNode {
    osc: OscillatorBlock,
    frequency: f32,
}

impl OscNode {
    pub fn new(waveform: OscillatorWaveform) -> Self {
        Self {
            osc: OscillatorBlock::new(waveform),
            frequency: 440.0,
        }
    }

    pub fn sine() -> Self {
        Self::new(OscillatorWaveform::Sine)
    }

    pub fn square() -> Self {
        Self::new(OscillatorWaveform::Square)
    }

    /// Set the oscillator frequency in Hz (clamped to 20 Hz - 20 kHz).
    pub fn with_frequency(mut self, freq: f32) -> Self {
        self.frequency = freq.clamp(20.0, 20_000.0);
        self
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }
}

impl GraphNode for OscNode {
    fn render_block(&mut self, out: &mut [f32], ctx: &RenderCtx) {
        self.osc.render(out, self.frequency, ctx.sample_rate);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::TAU;

    #[test]
    fn valid_sine() {
        let sample_rate = 48_000.0;
        let ctx = RenderCtx::new(sample_rate);
        let mut osc = OscNode::sine().with_frequency(440.0);

        let mut buffer = vec![0.0f32; 128];
        osc.render_block(&mut buffer, &ctx);

        let sample_index = 12;
        let expected = (TAU * 440.0 * sample_index as f32 / sample_rate).sin();
        let actual = buffer[sample_index];
        assert!(
            (actual - expected).abs() < 1e-4,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn square_is_full_scale() {
        let ctx = RenderCtx::new(48_000.0);
        let mut osc = OscNode::square();

        let mut buffer = vec![0.0f32; 512];
        osc.render_block(&mut buffer, &ctx);

        assert!(buffer.iter().all(|&s| s == 1.0 || s == -1.0));
        assert!(buffer.contains(&1.0) && buffer.contains(&-1.0));
    }

    #[test]
    fn frequency_is_clamped() {
        assert_eq!(OscNode::square().with_frequency(5.0).frequency(), 20.0);
    }
}
