//! Playback path - replays finalized artifacts after a delay
//!
//! [`PlaybackPath::schedule`] hands the artifact to a tokio task that decodes
//! it on the blocking pool and then waits out the delay. When the delay is up
//! the task sends a [`DuePlayback`] on the due channel; the owner (the
//! sequencer) then calls [`PlaybackPath::fire`], which connects a source node
//! for the decoded media element to the bus.
//!
//! Every playback is tracked from schedule to release:
//!
//! ```text
//! schedule ──→ pending ──fire──→ active ──(bus: source ended)──→ released
//!                 └──cancel──→ dropped
//! ```

pub mod media;

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    capture::{RecordedArtifact, SessionId},
    engine::{AudioContext, EngineError, SourceId},
};

pub use media::{MediaElement, MediaSourceNode};

pub const DEFAULT_PLAYBACK_DELAY: Duration = Duration::from_millis(5_000);

/// Playback settings
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackConfig {
    /// Wait between finalize completion and playback start
    #[cfg_attr(feature = "serde", serde(with = "crate::config::duration_ms"))]
    pub delay: Duration,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            delay: DEFAULT_PLAYBACK_DELAY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlaybackError {
    #[error("playback {0} is not pending")]
    NotPending(PlaybackId),

    #[error("unsupported artifact format: {0}")]
    UnsupportedFormat(&'static str),

    #[error("failed to decode artifact: {0}")]
    Decode(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlaybackId(u64);

impl fmt::Display for PlaybackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "play#{}", self.0)
    }
}

/// A playback whose delay has elapsed, with its decoded artifact
#[derive(Debug, Clone)]
pub struct DuePlayback {
    id: PlaybackId,
    recording: SessionId,
    element: Result<MediaElement, PlaybackError>,
}

impl DuePlayback {
    pub fn id(&self) -> PlaybackId {
        self.id
    }

    pub fn recording(&self) -> SessionId {
        self.recording
    }
}

struct PendingPlayback {
    timer: JoinHandle<()>,
    due_at: Instant,
}

/// A playback that has started: the decoded element and its bus node
#[derive(Debug)]
pub struct PlaybackSession {
    id: PlaybackId,
    recording: SessionId,
    element: MediaElement,
    source: SourceId,
    started_at: Instant,
}

impl PlaybackSession {
    pub fn id(&self) -> PlaybackId {
        self.id
    }

    /// Recording session whose artifact is playing
    pub fn recording(&self) -> SessionId {
        self.recording
    }

    pub fn element(&self) -> &MediaElement {
        &self.element
    }

    pub fn source(&self) -> SourceId {
        self.source
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }
}

pub struct PlaybackPath {
    context: AudioContext,
    delay: Duration,
    due_tx: mpsc::UnboundedSender<DuePlayback>,
    pending: HashMap<PlaybackId, PendingPlayback>,
    active: HashMap<PlaybackId, PlaybackSession>,
    next_id: u64,
}

impl PlaybackPath {
    /// Timers report due playbacks on `due_tx`.
    pub fn new(
        context: AudioContext,
        config: PlaybackConfig,
        due_tx: mpsc::UnboundedSender<DuePlayback>,
    ) -> Self {
        Self {
            context,
            delay: config.delay,
            due_tx,
            pending: HashMap::new(),
            active: HashMap::new(),
            next_id: 0,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Schedule playback after the configured delay.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(&mut self, artifact: RecordedArtifact) -> PlaybackId {
        self.schedule_after(artifact, self.delay)
    }

    pub fn schedule_after(&mut self, artifact: RecordedArtifact, delay: Duration) -> PlaybackId {
        let id = PlaybackId(self.next_id);
        self.next_id += 1;

        let recording = artifact.session();
        let due_at = Instant::now() + delay;
        let due_tx = self.due_tx.clone();
        let timer = tokio::spawn(async move {
            let decoded =
                tokio::task::spawn_blocking(move || MediaElement::decode(&artifact)).await;
            let element = match decoded {
                Ok(result) => result,
                Err(err) => Err(PlaybackError::Decode(err.to_string())),
            };
            tokio::time::sleep_until(due_at).await;
            let _ = due_tx.send(DuePlayback {
                id,
                recording,
                element,
            });
        });

        debug!(
            playback = %id,
            recording = %recording,
            delay_ms = delay.as_millis() as u64,
            "playback scheduled"
        );
        self.pending.insert(id, PendingPlayback { timer, due_at });
        id
    }

    /// Start a due playback. Each id plays at most once; a second call, or a
    /// call after `cancel`, returns `NotPending`.
    pub fn fire(&mut self, due: DuePlayback) -> Result<SourceId, PlaybackError> {
        let DuePlayback {
            id,
            recording,
            element,
        } = due;
        self.pending
            .remove(&id)
            .ok_or(PlaybackError::NotPending(id))?;

        let element = element?;
        let source = self.context.add_source(element.source_node())?;

        info!(
            playback = %id,
            recording = %recording,
            frames = element.frames(),
            "playing artifact"
        );
        self.active.insert(
            id,
            PlaybackSession {
                id,
                recording,
                element,
                source,
                started_at: Instant::now(),
            },
        );
        Ok(source)
    }

    /// Abort a pending playback. Returns false if it already fired or was
    /// never scheduled.
    pub fn cancel(&mut self, id: PlaybackId) -> bool {
        match self.pending.remove(&id) {
            Some(pending) => {
                pending.timer.abort();
                debug!(playback = %id, "playback cancelled");
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) -> usize {
        let ids: Vec<_> = self.pending.keys().copied().collect();
        ids.into_iter().filter(|&id| self.cancel(id)).count()
    }

    /// Release the session whose source just ended on the bus
    pub fn on_source_ended(&mut self, source: SourceId) -> Option<PlaybackId> {
        let id = self
            .active
            .values()
            .find(|session| session.source == source)
            .map(|session| session.id)?;

        let session = self.active.remove(&id)?;
        debug!(
            playback = %id,
            played_ms = session.started_at.elapsed().as_millis() as u64,
            "playback ended, released"
        );
        Some(id)
    }

    /// Release every active session whose source is no longer on the bus.
    ///
    /// Catches up after `SourceEnded` signals were missed.
    pub fn release_finished(&mut self) -> usize {
        let finished: Vec<_> = self
            .active
            .values()
            .filter(|session| !self.context.has_source(session.source))
            .map(|session| session.id)
            .collect();

        for id in &finished {
            self.active.remove(id);
        }
        if !finished.is_empty() {
            debug!(released = finished.len(), "finished playbacks swept");
        }
        finished.len()
    }

    /// Stop and release every active playback
    pub fn release_all(&mut self) -> usize {
        let released = self.active.len();
        for (id, session) in self.active.drain() {
            if !self.context.remove_source(session.source) {
                warn!(playback = %id, "playback source already gone from bus");
            }
        }
        released
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn is_pending(&self, id: PlaybackId) -> bool {
        self.pending.contains_key(&id)
    }

    /// When a pending playback is due to fire
    pub fn due_at(&self, id: PlaybackId) -> Option<Instant> {
        self.pending.get(&id).map(|pending| pending.due_at)
    }

    pub fn active_sessions(&self) -> impl Iterator<Item = &PlaybackSession> {
        self.active.values()
    }
}

impl Drop for PlaybackPath {
    fn drop(&mut self) {
        for pending in self.pending.values() {
            pending.timer.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{ArtifactEncoder, WavEncoder, WAV_MIME};
    use crate::engine::{BusEvent, EngineConfig};

    fn context() -> AudioContext {
        let ctx = AudioContext::new(EngineConfig::default().with_sample_rate(8_000).with_channels(1));
        ctx.resume().unwrap();
        ctx
    }

    fn artifact(frames: usize) -> RecordedArtifact {
        let samples = vec![0.1f32; frames];
        let data = WavEncoder.encode(&samples, 8_000).unwrap();
        RecordedArtifact::new(SessionId::new(3), data, WAV_MIME, 8_000, frames as u64)
    }

    fn path(ctx: &AudioContext) -> (PlaybackPath, mpsc::UnboundedReceiver<DuePlayback>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (PlaybackPath::new(ctx.clone(), PlaybackConfig::default(), tx), rx)
    }

    #[tokio::test(start_paused = true)]
    async fn fires_no_earlier_than_delay() {
        let ctx = context();
        let (mut playback, mut due) = path(&ctx);

        let scheduled = Instant::now();
        let id = playback.schedule(artifact(800));
        assert_eq!(playback.due_at(id), Some(scheduled + DEFAULT_PLAYBACK_DELAY));

        let ready = due.recv().await.unwrap();
        assert_eq!(ready.id(), id);
        assert_eq!(ready.recording(), SessionId::new(3));
        assert!(scheduled.elapsed() >= DEFAULT_PLAYBACK_DELAY);

        playback.fire(ready.clone()).unwrap();
        assert_eq!(playback.pending_count(), 0);
        assert_eq!(playback.active_count(), 1);
        assert_eq!(playback.fire(ready), Err(PlaybackError::NotPending(id)));
    }

    #[tokio::test(start_paused = true)]
    async fn artifact_is_decoded_before_it_is_due() {
        let ctx = context();
        let (mut playback, mut due) = path(&ctx);

        playback.schedule(artifact(800));
        let ready = due.recv().await.unwrap();
        let element = ready.element.as_ref().unwrap();
        assert_eq!(element.frames(), 800);
        assert_eq!(element.sample_rate(), 8_000);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_playback_never_fires() {
        let ctx = context();
        let (mut playback, mut due) = path(&ctx);

        let id = playback.schedule(artifact(800));
        assert!(playback.cancel(id));
        assert!(!playback.cancel(id));

        tokio::time::sleep(DEFAULT_PLAYBACK_DELAY * 2).await;
        assert!(due.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn ended_source_releases_session() {
        let ctx = context();
        let mut events = ctx.subscribe();
        let (mut playback, mut due) = path(&ctx);

        let id = playback.schedule_after(artifact(400), Duration::from_millis(10));
        let source = playback.fire(due.recv().await.unwrap()).unwrap();

        let out = ctx.render_offline(400);
        assert!(out.iter().all(|&s| (s - 0.1).abs() < 1e-6));
        ctx.render_offline(16);

        assert_eq!(events.recv().await.unwrap(), BusEvent::SourceEnded(source));
        assert_eq!(playback.on_source_ended(source), Some(id));
        assert_eq!(playback.active_count(), 0);
        assert_eq!(playback.on_source_ended(source), None);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_releases_sessions_whose_source_is_gone() {
        let ctx = context();
        let (mut playback, mut due) = path(&ctx);

        playback.schedule_after(artifact(100), Duration::from_millis(1));
        playback.schedule_after(artifact(8_000), Duration::from_millis(2));
        let short = playback.fire(due.recv().await.unwrap()).unwrap();
        let long = playback.fire(due.recv().await.unwrap()).unwrap();
        assert_eq!(playback.release_finished(), 0);

        // The bus retires the short take without anyone hearing about it
        ctx.render_offline(200);
        assert!(!ctx.has_source(short));
        assert!(ctx.has_source(long));

        assert_eq!(playback.release_finished(), 1);
        assert_eq!(playback.active_count(), 1);
        assert_eq!(playback.active_sessions().next().unwrap().source(), long);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_and_release_all() {
        let ctx = context();
        let (mut playback, mut due) = path(&ctx);

        playback.schedule(artifact(10));
        playback.schedule(artifact(10));
        let quick = playback.schedule_after(artifact(8_000), Duration::from_millis(1));
        let ready = due.recv().await.unwrap();
        assert_eq!(ready.id(), quick);
        let source = playback.fire(ready).unwrap();

        assert_eq!(playback.cancel_all(), 2);
        assert_eq!(playback.release_all(), 1);
        assert!(!ctx.has_source(source));
        assert_eq!(playback.pending_count() + playback.active_count(), 0);
    }

    #[tokio::test]
    async fn undecodable_artifact_is_dropped() {
        let ctx = context();
        let (mut playback, mut due) = path(&ctx);
        let blob = RecordedArtifact::new(SessionId::new(1), vec![0; 4], "audio/ogg", 8_000, 0);

        let id = playback.schedule_after(blob, Duration::ZERO);
        let ready = due.recv().await.unwrap();
        assert_eq!(
            playback.fire(ready),
            Err(PlaybackError::UnsupportedFormat("audio/ogg"))
        );
        assert!(!playback.is_pending(id));
        assert_eq!(playback.active_count(), 0);
    }
}
