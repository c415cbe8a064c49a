//! Capture sink - records a source from the output bus into an artifact
//!
//! A capture cycle has three steps:
//!
//! 1. [`CaptureSink::attach`] creates a tap (the recording destination),
//!    routes the source into it, and binds a [`Recorder`] to the tap's stream.
//! 2. [`CaptureSink::begin`] arms the tap; audio is captured from that call on.
//! 3. [`CaptureSink::finalize`] detaches the tap, drains what was captured,
//!    and encodes it off the async threads. The result reaches the callback
//!    exactly once.
//!
//! A [`RecordingSession`] is consumed by `finalize` (or `discard`), so its
//! destination and recorder can't be reused afterwards.

mod artifact;
mod recorder;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::engine::{AudioContext, EngineError, SourceId, TapId};

pub use artifact::{ArtifactEncoder, RecordedArtifact, WavEncoder, WAV_MIME};
pub use recorder::{Recorder, RecorderState};

/// Capture settings
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureConfig {
    /// Longest recording the tap buffers; later samples are dropped
    #[cfg_attr(feature = "serde", serde(with = "crate::config::duration_ms"))]
    pub max_duration: Duration,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_duration: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("recorder was never started")]
    NotRecording,

    #[error("recorder is already recording")]
    AlreadyRecording,

    #[error("failed to encode recording: {0}")]
    Encode(String),

    #[error("encoder task failed: {0}")]
    Join(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Identifies one recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rec#{}", self.0)
    }
}

/// Destination node plus recorder for one capture
#[derive(Debug)]
pub struct RecordingSession {
    id: SessionId,
    source: SourceId,
    tap: TapId,
    recorder: Recorder,
}

impl RecordingSession {
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Source routed into this session's destination
    pub fn source(&self) -> SourceId {
        self.source
    }

    pub fn tap(&self) -> TapId {
        self.tap
    }

    pub fn recorder(&self) -> &Recorder {
        &self.recorder
    }
}

pub struct CaptureSink {
    context: AudioContext,
    config: CaptureConfig,
    encoder: Arc<dyn ArtifactEncoder>,
    next_session: u64,
}

impl CaptureSink {
    pub fn new(context: AudioContext, config: CaptureConfig) -> Self {
        Self {
            context,
            config,
            encoder: Arc::new(WavEncoder),
            next_session: 0,
        }
    }

    /// Replace the default WAV encoder
    pub fn with_encoder<E: ArtifactEncoder + 'static>(mut self, encoder: E) -> Self {
        self.encoder = Arc::new(encoder);
        self
    }

    fn tap_capacity(&self) -> usize {
        (self.config.max_duration.as_secs_f64() * self.context.sample_rate() as f64).ceil() as usize
    }

    /// Create a destination for `source` and bind a recorder to it
    pub fn attach(&mut self, source: SourceId) -> Result<RecordingSession, CaptureError> {
        let (tap, stream) = self.context.create_tap(self.tap_capacity())?;
        if let Err(err) = self.context.connect_tap(source, tap) {
            self.context.remove_tap(tap);
            return Err(err.into());
        }

        let id = SessionId(self.next_session);
        self.next_session += 1;

        debug!(session = %id, %source, %tap, "recording destination attached");
        Ok(RecordingSession {
            id,
            source,
            tap,
            recorder: Recorder::new(stream, self.context.sample_rate()),
        })
    }

    /// Start capturing. Nothing before this call ends up in the artifact.
    pub fn begin(&self, session: &mut RecordingSession) -> Result<(), CaptureError> {
        if session.recorder.state() == RecorderState::Recording {
            return Err(CaptureError::AlreadyRecording);
        }
        self.context.arm_tap(session.tap)?;
        session.recorder.mark_recording();
        info!(session = %session.id, "recording started");
        Ok(())
    }

    /// Stop capturing and deliver the artifact to `on_artifact`.
    ///
    /// Encoding runs on tokio's blocking pool when a runtime is available,
    /// otherwise inline. Either way `on_artifact` is called exactly once.
    pub fn finalize<F>(&self, session: RecordingSession, on_artifact: F)
    where
        F: FnOnce(Result<RecordedArtifact, CaptureError>) + Send + 'static,
    {
        let RecordingSession {
            id,
            tap,
            mut recorder,
            ..
        } = session;

        let stats = self.context.remove_tap(tap).unwrap_or_default();
        let was_recording = recorder.state() == RecorderState::Recording;
        let samples = recorder.drain();
        let sample_rate = recorder.sample_rate();

        if stats.dropped > 0 {
            warn!(
                session = %id,
                dropped = stats.dropped,
                "recording exceeded buffer, tail was dropped"
            );
        }
        debug!(session = %id, frames = samples.len(), "recording stopped, finalizing");

        if !was_recording {
            on_artifact(Err(CaptureError::NotRecording));
            return;
        }

        let encoder = Arc::clone(&self.encoder);
        let encode = move || {
            let frames = samples.len() as u64;
            encoder.encode(&samples, sample_rate).map(|data| {
                RecordedArtifact::new(id, data, encoder.mime_type(), sample_rate, frames)
            })
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let result = match tokio::task::spawn_blocking(encode).await {
                        Ok(result) => result,
                        Err(err) => Err(CaptureError::Join(err.to_string())),
                    };
                    deliver(id, result, on_artifact);
                });
            }
            Err(_) => deliver(id, encode(), on_artifact),
        }
    }

    /// Tear down a session without producing an artifact
    pub fn discard(&self, session: RecordingSession) {
        self.context.remove_tap(session.tap);
        debug!(session = %session.id, "recording discarded");
    }
}

fn deliver<F>(id: SessionId, result: Result<RecordedArtifact, CaptureError>, on_artifact: F)
where
    F: FnOnce(Result<RecordedArtifact, CaptureError>),
{
    match &result {
        Ok(artifact) => info!(
            session = %id,
            bytes = artifact.len(),
            frames = artifact.frames(),
            "artifact produced"
        ),
        Err(err) => warn!(session = %id, %err, "finalize failed"),
    }
    on_artifact(result);
}
