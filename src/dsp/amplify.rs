//! Constant gain primitive.

/*
Gain
====

A gain stage multiplies every sample by one constant:

    output[i] = input[i] × gain

  gain > 1.0  →  louder
  gain = 1.0  →  unchanged (unity)
  gain < 1.0  →  quieter (attenuation)
  gain = 0.0  →  silence

Levels are usually quoted in decibels, since hearing is logarithmic:

    dB = 20 × log₁₀(gain)

    ×1.0   =   0 dB
    ×0.5   ≈  -6 dB
    ×0.1   = -20 dB   (the tone stage: a full-scale square wave at 0.1)

The operation is stateless; each output sample depends only on the input
sample at the same index.
*/

/// Multiply a signal by a constant gain factor (in-place).
#[inline]
pub fn apply_gain(signal: &mut [f32], gain: f32) {
    for sample in signal.iter_mut() {
        *sample *= gain;
    }
}

/// Convert a linear gain factor to decibels.
#[inline]
pub fn gain_to_db(gain: f32) -> f32 {
    20.0 * gain.abs().max(f32::MIN_POSITIVE).log10()
}
