//! Shared audio context
//!
//! One [`AudioContext`] exists per session. It owns the output bus and the
//! suspended/running lifecycle: a new context is suspended, renders silence,
//! and only starts processing once a user gesture calls [`AudioContext::resume`].
//! Resume is idempotent. Closing is terminal.
//!
//! Rendering is pulled, either by a device callback (see `io::device`) or
//! offline through [`AudioContext::render_offline`].

pub mod bus;

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use rtrb::Consumer;
use tokio::sync::broadcast;
use tracing::{debug, info};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::graph::GraphNode;

pub use bus::{BusEvent, OutputBus, SourceId, TapId, TapStats};

const BUS_EVENT_CAPACITY: usize = 64;

/// Lifecycle of the audio context
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// Created but not yet resumed by a user gesture; renders silence
    Suspended = 0,
    /// Processing audio
    Running = 1,
    /// Shut down; renders silence and rejects graph changes
    Closed = 2,
}

impl ContextState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => ContextState::Suspended,
            1 => ContextState::Running,
            _ => ContextState::Closed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContextState::Suspended => "suspended",
            ContextState::Running => "running",
            ContextState::Closed => "closed",
        }
    }
}

impl std::fmt::Display for ContextState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("audio context is closed")]
    Closed,

    #[error("unknown source {0}")]
    UnknownSource(SourceId),

    #[error("unknown tap {0}")]
    UnknownTap(TapId),
}

/// Engine format settings
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Interleaved output channels (the bus itself is mono)
    pub channels: u16,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 2,
        }
    }
}

impl EngineConfig {
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate.max(1);
        self
    }

    pub fn with_channels(mut self, channels: u16) -> Self {
        self.channels = channels.max(1);
        self
    }
}

struct Shared {
    state: AtomicU8,
    sample_rate: u32,
    channels: u16,
    bus: Mutex<OutputBus>,
    events: broadcast::Sender<BusEvent>,
}

/// Process-wide audio context. Cheap to clone; clones share one bus.
#[derive(Clone)]
pub struct AudioContext {
    shared: Arc<Shared>,
}

impl AudioContext {
    pub fn new(config: EngineConfig) -> Self {
        let (events, _) = broadcast::channel(BUS_EVENT_CAPACITY);
        let sample_rate = config.sample_rate.max(1);
        let bus = OutputBus::new(sample_rate as f32, events.clone());

        debug!(sample_rate, channels = config.channels, "audio context created (suspended)");

        Self {
            shared: Arc::new(Shared {
                state: AtomicU8::new(ContextState::Suspended as u8),
                sample_rate,
                channels: config.channels.max(1),
                bus: Mutex::new(bus),
                events,
            }),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.shared.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.shared.channels
    }

    pub fn state(&self) -> ContextState {
        ContextState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.state() == ContextState::Running
    }

    /// Resume processing. Returns `Ok(true)` only for the call that actually
    /// moved the context out of `Suspended`; later calls are no-ops.
    pub fn resume(&self) -> Result<bool, EngineError> {
        match self.shared.state.compare_exchange(
            ContextState::Suspended as u8,
            ContextState::Running as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                info!("audio context resumed");
                Ok(true)
            }
            Err(current) => match ContextState::from_u8(current) {
                ContextState::Closed => Err(EngineError::Closed),
                _ => Ok(false),
            },
        }
    }

    /// Close the context and drop every source and tap. Returns false if it
    /// was already closed.
    pub fn close(&self) -> bool {
        let previous = self
            .shared
            .state
            .swap(ContextState::Closed as u8, Ordering::AcqRel);
        if previous == ContextState::Closed as u8 {
            return false;
        }
        self.shared.bus.lock().clear();
        info!("audio context closed");
        true
    }

    fn ensure_open(&self) -> Result<(), EngineError> {
        match self.state() {
            ContextState::Closed => Err(EngineError::Closed),
            _ => Ok(()),
        }
    }

    /// Subscribe to render-path signals (sources ending)
    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.shared.events.subscribe()
    }

    /// Connect a node to the main output
    pub fn add_source<N: GraphNode + 'static>(&self, node: N) -> Result<SourceId, EngineError> {
        self.ensure_open()?;
        Ok(self.shared.bus.lock().add_source(Box::new(node)))
    }

    pub fn remove_source(&self, id: SourceId) -> bool {
        self.shared.bus.lock().remove_source(id)
    }

    pub fn has_source(&self, id: SourceId) -> bool {
        self.shared.bus.lock().has_source(id)
    }

    pub fn source_count(&self) -> usize {
        self.shared.bus.lock().source_count()
    }

    /// Create a recording tap holding up to `capacity` samples
    pub fn create_tap(&self, capacity: usize) -> Result<(TapId, Consumer<f32>), EngineError> {
        self.ensure_open()?;
        Ok(self.shared.bus.lock().create_tap(capacity))
    }

    pub fn connect_tap(&self, source: SourceId, tap: TapId) -> Result<(), EngineError> {
        self.ensure_open()?;
        let mut bus = self.shared.bus.lock();
        if !bus.has_tap(tap) {
            return Err(EngineError::UnknownTap(tap));
        }
        if !bus.connect_tap(source, tap) {
            return Err(EngineError::UnknownSource(source));
        }
        Ok(())
    }

    pub fn arm_tap(&self, tap: TapId) -> Result<(), EngineError> {
        self.ensure_open()?;
        if self.shared.bus.lock().arm_tap(tap) {
            Ok(())
        } else {
            Err(EngineError::UnknownTap(tap))
        }
    }

    pub fn remove_tap(&self, tap: TapId) -> Option<TapStats> {
        self.shared.bus.lock().remove_tap(tap)
    }

    /// Bus time in seconds (only advances while running)
    pub fn current_time(&self) -> f64 {
        self.shared.bus.lock().time()
    }

    /// Fill an interleaved device buffer. Silence unless running.
    pub fn render(&self, data: &mut [f32]) {
        if !self.is_running() {
            data.fill(0.0);
            return;
        }
        self.shared
            .bus
            .lock()
            .render_interleaved(data, self.shared.channels as usize);
    }

    /// Render `frames` of mono output without a device
    pub fn render_offline(&self, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0; frames];
        if self.is_running() {
            self.shared.bus.lock().render(&mut out);
        }
        out
    }
}

impl std::fmt::Debug for AudioContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioContext")
            .field("state", &self.state())
            .field("sample_rate", &self.shared.sample_rate)
            .field("channels", &self.shared.channels)
            .finish()
    }
}
