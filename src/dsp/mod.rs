//! Low-level DSP primitives used by the higher level graph nodes.
//!
//! These components are allocation-free and realtime-safe, so they can run
//! inside the output bus render callback. They stay focused on the
//! signal-processing math; routing and lifecycle live in `engine` and
//! `graph`.

/// Constant gain stage.
pub mod amplify;
/// Summing and channel fan-out.
pub mod mix;
/// Oscillator waveforms.
pub mod oscillator;

pub use oscillator::OscillatorWaveform;
