//! Sequencer - record, finalize, replay
//!
//! The sequencer owns the tone, the capture sink and the playback path, and
//! walks them through one cycle at a time:
//!
//! ```text
//! Idle ──start_recording──→ Recording ──stop_recording──→ Finalizing
//!   ↑                                                         │
//!   └──────────── finalize ok: playback scheduled ────────────┤
//!   └──────────── finalize failed: nothing scheduled ─────────┘
//! ```
//!
//! Commands are synchronous. Everything asynchronous (finalize completion,
//! playback timers, the bus reporting a finished source) arrives as a
//! [`SequencerEvent`] through [`Sequencer::next_event`] and is applied with
//! [`Sequencer::handle_event`]. [`SequencerService`] runs that loop as a task.

mod service;

use std::fmt;

use tokio::sync::{broadcast, mpsc};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::{
    capture::{
        ArtifactEncoder, CaptureError, CaptureSink, RecordedArtifact, RecordingSession, SessionId,
    },
    config::TonetapeConfig,
    engine::{AudioContext, BusEvent, ContextState, EngineError},
    playback::{DuePlayback, PlaybackPath},
    tone::{ToneError, ToneSource, ToneState},
};

pub use service::{SequencerHandle, SequencerService};

/// Externally invoked commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    StartRecording,
    StopRecording,
    /// The user gesture that unlocks audio output
    Resume,
    Shutdown,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::StartRecording => "start_recording",
            Command::StopRecording => "stop_recording",
            Command::Resume => "resume",
            Command::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerPhase {
    Idle,
    Recording,
    Finalizing,
}

impl SequencerPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SequencerPhase::Idle => "idle",
            SequencerPhase::Recording => "recording",
            SequencerPhase::Finalizing => "finalizing",
        }
    }
}

impl fmt::Display for SequencerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SequencerError {
    #[error("{command} is not allowed while {phase}")]
    InvalidState {
        command: Command,
        phase: SequencerPhase,
    },

    #[error("tone: {0}")]
    Tone(#[from] ToneError),

    #[error("capture: {0}")]
    Capture(#[from] CaptureError),

    #[error("engine: {0}")]
    Engine(#[from] EngineError),

    #[error("sequencer service has stopped")]
    ServiceStopped,
}

/// Asynchronous input to the state machine
#[derive(Debug)]
pub enum SequencerEvent {
    /// The recorder finished (or failed) finalizing
    Finalized {
        session: SessionId,
        result: Result<RecordedArtifact, CaptureError>,
    },
    /// A scheduled playback's delay elapsed
    PlaybackDue(DuePlayback),
    /// Something happened on the output bus
    Bus(BusEvent),
    /// This many bus events were missed
    BusLagged(u64),
}

/// Lifetime counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequencerStats {
    pub recordings_started: u64,
    pub artifacts_produced: u64,
    pub capture_failures: u64,
    pub playbacks_started: u64,
    pub playbacks_released: u64,
}

/// Point-in-time view of the sequencer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequencerStatus {
    pub phase: SequencerPhase,
    pub context: ContextState,
    pub tone: ToneState,
    pub pending_playbacks: usize,
    pub active_playbacks: usize,
    pub stats: SequencerStats,
    pub last_failure: Option<CaptureError>,
}

enum SequencerState {
    Idle,
    Recording {
        session: RecordingSession,
        started_at: Instant,
    },
    Finalizing {
        session: SessionId,
        requested_at: Instant,
    },
}

impl SequencerState {
    fn phase(&self) -> SequencerPhase {
        match self {
            SequencerState::Idle => SequencerPhase::Idle,
            SequencerState::Recording { .. } => SequencerPhase::Recording,
            SequencerState::Finalizing { .. } => SequencerPhase::Finalizing,
        }
    }
}

struct Finalized {
    session: SessionId,
    result: Result<RecordedArtifact, CaptureError>,
}

pub struct Sequencer {
    context: AudioContext,
    config: TonetapeConfig,
    state: SequencerState,
    tone: ToneSource,
    capture: CaptureSink,
    playback: PlaybackPath,
    finalized_tx: mpsc::UnboundedSender<Finalized>,
    finalized_rx: mpsc::UnboundedReceiver<Finalized>,
    due_rx: mpsc::UnboundedReceiver<DuePlayback>,
    bus_events: broadcast::Receiver<BusEvent>,
    stats: SequencerStats,
    last_failure: Option<CaptureError>,
}

impl Sequencer {
    /// Connect the tone to `context` and build an idle sequencer.
    pub fn new(context: AudioContext, config: TonetapeConfig) -> Result<Self, SequencerError> {
        let capture = CaptureSink::new(context.clone(), config.capture.clone());
        Self::with_capture(context, config, capture)
    }

    /// Like [`Sequencer::new`] with a custom artifact encoder
    pub fn with_encoder<E: ArtifactEncoder + 'static>(
        context: AudioContext,
        config: TonetapeConfig,
        encoder: E,
    ) -> Result<Self, SequencerError> {
        let capture =
            CaptureSink::new(context.clone(), config.capture.clone()).with_encoder(encoder);
        Self::with_capture(context, config, capture)
    }

    fn with_capture(
        context: AudioContext,
        config: TonetapeConfig,
        capture: CaptureSink,
    ) -> Result<Self, SequencerError> {
        let bus_events = context.subscribe();
        let tone = ToneSource::new(&context, &config.tone)?;
        let (finalized_tx, finalized_rx) = mpsc::unbounded_channel();
        let (due_tx, due_rx) = mpsc::unbounded_channel();
        let playback = PlaybackPath::new(context.clone(), config.playback.clone(), due_tx);

        Ok(Self {
            context,
            config,
            state: SequencerState::Idle,
            tone,
            capture,
            playback,
            finalized_tx,
            finalized_rx,
            due_rx,
            bus_events,
            stats: SequencerStats::default(),
            last_failure: None,
        })
    }

    pub fn context(&self) -> &AudioContext {
        &self.context
    }

    pub fn config(&self) -> &TonetapeConfig {
        &self.config
    }

    pub fn phase(&self) -> SequencerPhase {
        self.state.phase()
    }

    pub fn playback(&self) -> &PlaybackPath {
        &self.playback
    }

    pub fn status(&self) -> SequencerStatus {
        SequencerStatus {
            phase: self.phase(),
            context: self.context.state(),
            tone: self.tone.state(),
            pending_playbacks: self.playback.pending_count(),
            active_playbacks: self.playback.active_count(),
            stats: self.stats,
            last_failure: self.last_failure.clone(),
        }
    }

    /// The user gesture: unlock audio output. Idempotent.
    pub fn resume(&self) -> Result<bool, SequencerError> {
        Ok(self.context.resume()?)
    }

    /// Tap the tone, start recording, start the tone.
    ///
    /// Rejected with `InvalidState` unless idle, so at most one recording
    /// session ever exists.
    pub fn start_recording(&mut self) -> Result<(), SequencerError> {
        if !matches!(self.state, SequencerState::Idle) {
            return Err(self.invalid(Command::StartRecording));
        }

        debug!("starting recording");

        if self.tone.is_spent() {
            self.tone = ToneSource::new(&self.context, &self.config.tone)?;
        }

        let mut session = self.capture.attach(self.tone.source_id())?;
        if let Err(err) = self.capture.begin(&mut session) {
            self.capture.discard(session);
            return Err(err.into());
        }
        if let Err(err) = self.tone.start() {
            self.capture.discard(session);
            return Err(err.into());
        }

        self.stats.recordings_started += 1;
        info!(session = %session.id(), "recording");
        self.state = SequencerState::Recording {
            session,
            started_at: Instant::now(),
        };
        Ok(())
    }

    /// Finalize the recording and stop the tone.
    ///
    /// The artifact arrives later as [`SequencerEvent::Finalized`]. Rejected
    /// with `InvalidState` unless recording.
    pub fn stop_recording(&mut self) -> Result<(), SequencerError> {
        let (session, started_at) = match std::mem::replace(&mut self.state, SequencerState::Idle) {
            SequencerState::Recording {
                session,
                started_at,
            } => (session, started_at),
            other => {
                self.state = other;
                return Err(self.invalid(Command::StopRecording));
            }
        };

        let id = session.id();
        debug!(
            session = %id,
            recorded_ms = started_at.elapsed().as_millis() as u64,
            "stopping recording"
        );

        let finalized_tx = self.finalized_tx.clone();
        self.capture.finalize(session, move |result| {
            let _ = finalized_tx.send(Finalized {
                session: id,
                result,
            });
        });

        if let Err(err) = self.tone.stop() {
            warn!(%err, "tone was not running at stop");
        }

        self.state = SequencerState::Finalizing {
            session: id,
            requested_at: Instant::now(),
        };
        Ok(())
    }

    /// Wait for the next asynchronous event
    pub async fn next_event(&mut self) -> Option<SequencerEvent> {
        tokio::select! {
            Some(finalized) = self.finalized_rx.recv() => Some(SequencerEvent::Finalized {
                session: finalized.session,
                result: finalized.result,
            }),
            Some(due) = self.due_rx.recv() => Some(SequencerEvent::PlaybackDue(due)),
            event = self.bus_events.recv() => match event {
                Ok(event) => Some(SequencerEvent::Bus(event)),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "bus events lagged");
                    Some(SequencerEvent::BusLagged(missed))
                }
                Err(broadcast::error::RecvError::Closed) => None,
            },
        }
    }

    pub fn handle_event(&mut self, event: SequencerEvent) {
        match event {
            SequencerEvent::Finalized { session, result } => self.on_finalized(session, result),
            SequencerEvent::PlaybackDue(due) => {
                let id = due.id();
                match self.playback.fire(due) {
                    Ok(_) => self.stats.playbacks_started += 1,
                    Err(err) => warn!(playback = %id, %err, "playback dropped"),
                }
            }
            SequencerEvent::Bus(BusEvent::SourceEnded(source)) => {
                if self.playback.on_source_ended(source).is_some() {
                    self.stats.playbacks_released += 1;
                }
            }
            // Missed SourceEnded signals: reconcile against the bus
            SequencerEvent::BusLagged(_) => {
                self.stats.playbacks_released += self.playback.release_finished() as u64;
            }
        }
    }

    fn on_finalized(&mut self, session: SessionId, result: Result<RecordedArtifact, CaptureError>) {
        let requested_at = match &self.state {
            SequencerState::Finalizing {
                session: current,
                requested_at,
            } if *current == session => *requested_at,
            _ => {
                warn!(session = %session, phase = %self.phase(), "ignoring stale finalize");
                return;
            }
        };

        self.state = SequencerState::Idle;
        let latency_ms = requested_at.elapsed().as_millis() as u64;

        match result {
            Ok(artifact) => {
                self.stats.artifacts_produced += 1;
                debug!(session = %session, latency_ms, ?artifact, "recording finalized");
                self.playback.schedule(artifact);
            }
            Err(err) => {
                self.stats.capture_failures += 1;
                error!(session = %session, %err, "capture failed, playback not scheduled");
                self.last_failure = Some(err);
            }
        }
    }

    /// Cancel pending playbacks, release active ones, drop any in-flight
    /// session and close the context.
    pub fn shutdown(&mut self) {
        match std::mem::replace(&mut self.state, SequencerState::Idle) {
            SequencerState::Recording { session, .. } => {
                self.capture.discard(session);
                let _ = self.tone.stop();
            }
            SequencerState::Finalizing { session, .. } => {
                debug!(session = %session, "abandoning finalize");
            }
            SequencerState::Idle => {}
        }

        let cancelled = self.playback.cancel_all();
        let released = self.playback.release_all();
        self.context.close();
        info!(cancelled, released, "sequencer shut down");
    }

    fn invalid(&self, command: Command) -> SequencerError {
        let phase = self.phase();
        warn!(%command, %phase, "command rejected");
        SequencerError::InvalidState { command, phase }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;

    fn sequencer() -> Sequencer {
        let ctx = AudioContext::new(EngineConfig::default().with_sample_rate(8_000).with_channels(1));
        ctx.resume().unwrap();
        Sequencer::new(ctx, TonetapeConfig::default()).unwrap()
    }

    #[tokio::test]
    async fn second_start_is_rejected() {
        let mut seq = sequencer();
        seq.start_recording().unwrap();

        assert_eq!(
            seq.start_recording(),
            Err(SequencerError::InvalidState {
                command: Command::StartRecording,
                phase: SequencerPhase::Recording,
            })
        );
        assert_eq!(seq.status().stats.recordings_started, 1);
    }

    #[tokio::test]
    async fn stop_without_session_is_rejected() {
        let mut seq = sequencer();
        assert_eq!(
            seq.stop_recording(),
            Err(SequencerError::InvalidState {
                command: Command::StopRecording,
                phase: SequencerPhase::Idle,
            })
        );
        assert_eq!(seq.phase(), SequencerPhase::Idle);
    }

    #[tokio::test]
    async fn commands_are_rejected_while_finalizing() {
        let mut seq = sequencer();
        seq.start_recording().unwrap();
        seq.stop_recording().unwrap();
        assert_eq!(seq.phase(), SequencerPhase::Finalizing);

        assert!(matches!(
            seq.start_recording(),
            Err(SequencerError::InvalidState { phase: SequencerPhase::Finalizing, .. })
        ));
        assert!(matches!(
            seq.stop_recording(),
            Err(SequencerError::InvalidState { phase: SequencerPhase::Finalizing, .. })
        ));
    }

    #[tokio::test]
    async fn stale_finalize_is_ignored() {
        let mut seq = sequencer();
        seq.handle_event(SequencerEvent::Finalized {
            session: SessionId::new(42),
            result: Err(CaptureError::NotRecording),
        });
        assert_eq!(seq.phase(), SequencerPhase::Idle);
        assert_eq!(seq.status().stats.capture_failures, 0);
    }

    #[tokio::test]
    async fn start_recreates_a_spent_tone() {
        let mut seq = sequencer();
        seq.start_recording().unwrap();
        let first = seq.tone.source_id();
        seq.stop_recording().unwrap();

        while seq.phase() != SequencerPhase::Idle {
            let event = seq.next_event().await.unwrap();
            seq.handle_event(event);
        }

        seq.start_recording().unwrap();
        assert_ne!(seq.tone.source_id(), first);
        assert_eq!(seq.tone.state(), ToneState::Running);
    }

    #[tokio::test]
    async fn shutdown_closes_everything() {
        let mut seq = sequencer();
        seq.start_recording().unwrap();
        seq.shutdown();

        let status = seq.status();
        assert_eq!(status.phase, SequencerPhase::Idle);
        assert_eq!(status.context, ContextState::Closed);
        assert_eq!(status.tone, ToneState::Stopped);
        assert!(matches!(
            seq.start_recording(),
            Err(SequencerError::Tone(ToneError::Engine(EngineError::Closed)))
        ));
    }
}
