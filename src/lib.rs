pub mod capture; // Recording taps, recorder lifecycle, artifacts
pub mod config;
pub mod dsp;
pub mod engine; // Shared audio context and output bus
pub mod graph; // Composable audio graph nodes
pub mod io;
pub mod playback; // Delayed artifact playback
pub mod sequencer; // Record/stop/replay orchestration
pub mod tone;

pub use capture::{CaptureError, CaptureSink, RecordedArtifact, RecordingSession};
pub use config::TonetapeConfig;
pub use engine::{AudioContext, BusEvent, ContextState, EngineConfig, EngineError};
pub use playback::{DuePlayback, PlaybackError, PlaybackId, PlaybackPath};
pub use sequencer::{
    Command, Sequencer, SequencerError, SequencerEvent, SequencerHandle, SequencerPhase,
    SequencerService, SequencerStatus,
};
pub use tone::{ToneError, ToneSource, ToneState};

pub const MAX_BLOCK_SIZE: usize = 2048;
