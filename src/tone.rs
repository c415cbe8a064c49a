//! Tone source - the always-on synth feeding the output bus
//!
//! A [`ToneSource`] is a square oscillator followed by a fixed gain stage,
//! connected to the main output when it is created. `start` and `stop` are
//! one-shot: a stopped tone is removed from the bus on the next render and
//! can never sound again. Make a new `ToneSource` for a new tone.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    dsp::OscillatorWaveform,
    engine::{AudioContext, EngineError, SourceId},
    graph::{GraphNode, NodeExt, OscNode, RenderCtx},
};

/// Tone generator settings
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct ToneConfig {
    pub waveform: OscillatorWaveform,
    /// Frequency in Hz
    pub frequency: f32,
    /// Linear gain applied after the oscillator
    pub gain: f32,
}

impl Default for ToneConfig {
    fn default() -> Self {
        Self {
            waveform: OscillatorWaveform::Square,
            frequency: 440.0,
            gain: 0.1,
        }
    }
}

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToneState {
    /// Connected, not yet started (silent)
    Idle = 0,
    Running = 1,
    /// Spent; will never produce output again
    Stopped = 2,
}

impl ToneState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ToneState::Idle,
            1 => ToneState::Running,
            _ => ToneState::Stopped,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ToneError {
    #[error("tone source can only be started once")]
    AlreadyStarted,

    #[error("tone source has not been started")]
    NotStarted,

    #[error("tone source is already stopped")]
    AlreadyStopped,

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Bus-side half of a tone: gates the chain on the shared state
struct ToneNode<N> {
    chain: N,
    gate: Arc<AtomicU8>,
}

impl<N: GraphNode> GraphNode for ToneNode<N> {
    fn render_block(&mut self, out: &mut [f32], ctx: &RenderCtx) {
        match ToneState::from_u8(self.gate.load(Ordering::Acquire)) {
            ToneState::Running => self.chain.render_block(out, ctx),
            ToneState::Idle | ToneState::Stopped => out.fill(0.0),
        }
    }

    fn is_active(&self) -> bool {
        ToneState::from_u8(self.gate.load(Ordering::Acquire)) != ToneState::Stopped
    }
}

/// Control-side handle to a tone on the bus
pub struct ToneSource {
    id: SourceId,
    gate: Arc<AtomicU8>,
}

impl ToneSource {
    /// Build the oscillator → gain chain and connect it to the main output.
    pub fn new(context: &AudioContext, config: &ToneConfig) -> Result<Self, ToneError> {
        let gate = Arc::new(AtomicU8::new(ToneState::Idle as u8));
        let chain = OscNode::new(config.waveform)
            .with_frequency(config.frequency)
            .gain(config.gain);

        let id = context.add_source(ToneNode {
            chain,
            gate: Arc::clone(&gate),
        })?;

        debug!(source = %id, frequency = config.frequency, gain = config.gain, "tone source connected");
        Ok(Self { id, gate })
    }

    pub fn source_id(&self) -> SourceId {
        self.id
    }

    pub fn state(&self) -> ToneState {
        ToneState::from_u8(self.gate.load(Ordering::Acquire))
    }

    /// True once the tone has been stopped and must be replaced
    pub fn is_spent(&self) -> bool {
        self.state() == ToneState::Stopped
    }

    pub fn start(&mut self) -> Result<(), ToneError> {
        match self.state() {
            ToneState::Idle => {
                self.gate.store(ToneState::Running as u8, Ordering::Release);
                debug!(source = %self.id, "tone started");
                Ok(())
            }
            ToneState::Running | ToneState::Stopped => Err(ToneError::AlreadyStarted),
        }
    }

    pub fn stop(&mut self) -> Result<(), ToneError> {
        match self.state() {
            ToneState::Running => {
                self.gate.store(ToneState::Stopped as u8, Ordering::Release);
                debug!(source = %self.id, "tone stopped");
                Ok(())
            }
            ToneState::Idle => Err(ToneError::NotStarted),
            ToneState::Stopped => Err(ToneError::AlreadyStopped),
        }
    }
}

impl Drop for ToneSource {
    fn drop(&mut self) {
        // Let the bus retire the node on its next block
        self.gate.store(ToneState::Stopped as u8, Ordering::Release);
    }
}

impl std::fmt::Debug for ToneSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToneSource")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish()
    }
}
