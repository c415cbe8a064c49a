#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use std::f32::consts::TAU;

/*
Phase Accumulator
=================

Every waveform here is driven by a normalized phase in [0.0, 1.0). Each
sample advances the phase by `frequency / sample_rate` and wraps at 1.0, so
one full cycle takes `sample_rate / frequency` samples.

  440 Hz at 48 kHz  →  increment 0.00917, ~109 samples per cycle

The waveform is a pure function of the phase:

  Sine     sin(2π · phase)
  Square   +1.0 for the first half of the cycle, -1.0 for the second

The square wave is naive (not band-limited). At 440 Hz the aliased
harmonics sit far below the fundamental, which is fine for a test tone.
*/

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OscillatorWaveform {
    Sine,
    #[default]
    Square,
}

#[derive(Debug, Clone)]
pub struct OscillatorBlock {
    waveform: OscillatorWaveform,
    phase: f32,
}

impl OscillatorBlock {
    pub fn new(waveform: OscillatorWaveform) -> Self {
        Self {
            waveform,
            phase: 0.0,
        }
    }

    pub fn sine() -> Self {
        Self::new(OscillatorWaveform::Sine)
    }

    pub fn square() -> Self {
        Self::new(OscillatorWaveform::Square)
    }

    pub fn waveform(&self) -> OscillatorWaveform {
        self.waveform
    }

    pub fn reset(&mut self) {
        self.phase = 0.0;
    }

    /// Fill `out` with the waveform at `frequency`, continuing from the
    /// current phase.
    pub fn render(&mut self, out: &mut [f32], frequency: f32, sample_rate: f32) {
        let increment = frequency / sample_rate;

        for sample in out.iter_mut() {
            *sample = match self.waveform {
                OscillatorWaveform::Sine => (TAU * self.phase).sin(),
                OscillatorWaveform::Square => {
                    if self.phase < 0.5 {
                        1.0
                    } else {
                        -1.0
                    }
                }
            };

            self.phase += increment;
            if self.phase >= 1.0 {
                self.phase = self.phase.fract();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn square_holds_each_half_cycle() {
        // 1 Hz at 8 Hz sample rate: exact 0.125 increments
        let mut osc = OscillatorBlock::square();
        let mut buffer = [0.0f32; 16];
        osc.render(&mut buffer, 1.0, 8.0);

        assert_eq!(&buffer[..4], &[1.0; 4]);
        assert_eq!(&buffer[4..8], &[-1.0; 4]);
        assert_eq!(&buffer[8..12], &[1.0; 4]);
        assert_eq!(&buffer[12..], &[-1.0; 4]);
    }

    #[test]
    fn sine_matches_reference() {
        let sample_rate = 48_000.0;
        let mut osc = OscillatorBlock::sine();
        let mut buffer = vec![0.0f32; 128];
        osc.render(&mut buffer, 440.0, sample_rate);

        let index = 12;
        let expected = (TAU * 440.0 * index as f32 / sample_rate).sin();
        assert!(
            (buffer[index] - expected).abs() < 1e-4,
            "expected {expected}, got {}",
            buffer[index]
        );
    }

    #[test]
    fn phase_continues_across_blocks() {
        let mut split = OscillatorBlock::square();
        let mut whole = OscillatorBlock::square();

        let mut a = [0.0f32; 6];
        let mut b = [0.0f32; 10];
        split.render(&mut a, 1.0, 8.0);
        split.render(&mut b, 1.0, 8.0);

        let mut reference = [0.0f32; 16];
        whole.render(&mut reference, 1.0, 8.0);

        assert_eq!(&reference[..6], &a);
        assert_eq!(&reference[6..], &b);
    }
}
