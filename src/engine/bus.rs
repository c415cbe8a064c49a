//! Output bus - mixes sources to the main output and feeds recording taps
//!
//! Every source is summed into the main output. A source can additionally be
//! routed to any number of taps; an armed tap pushes that source's samples
//! into an `rtrb` ring that a recorder drains from the control side.
//!
//! Sources that report `is_active() == false` after a block are removed and
//! announced as [`BusEvent::SourceEnded`].

use std::fmt;

use rtrb::{Consumer, Producer, RingBuffer};
use tokio::sync::broadcast;

use crate::{
    dsp::mix,
    graph::{GraphNode, RenderCtx},
    MAX_BLOCK_SIZE,
};

/// Handle to a source connected to the bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(u64);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "src#{}", self.0)
    }
}

/// Handle to a recording tap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TapId(u64);

impl fmt::Display for TapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tap#{}", self.0)
    }
}

/// Signals emitted from the render path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusEvent {
    /// A source went quiet and was removed from the bus
    SourceEnded(SourceId),
}

/// Counters for a tap, reported when the tap is removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TapStats {
    /// Samples pushed into the ring
    pub captured: u64,
    /// Samples lost because the ring was full
    pub dropped: u64,
}

struct BusSource {
    id: SourceId,
    node: Box<dyn GraphNode>,
    taps: Vec<TapId>,
}

struct Tap {
    id: TapId,
    armed: bool,
    producer: Producer<f32>,
    stats: TapStats,
}

impl Tap {
    fn capture(&mut self, block: &[f32]) {
        if !self.armed {
            return;
        }

        for &sample in block {
            if self.producer.push(sample).is_ok() {
                self.stats.captured += 1;
            } else {
                self.stats.dropped += 1;
            }
        }
    }
}

pub struct OutputBus {
    ctx: RenderCtx,
    next_id: u64,
    sources: Vec<BusSource>,
    taps: Vec<Tap>,
    /// Per-source render buffer
    scratch: Vec<f32>,
    /// Mono mix buffer for interleaved rendering
    mix_buffer: Vec<f32>,
    events: broadcast::Sender<BusEvent>,
}

impl OutputBus {
    pub(crate) fn new(sample_rate: f32, events: broadcast::Sender<BusEvent>) -> Self {
        Self {
            ctx: RenderCtx::new(sample_rate),
            next_id: 0,
            sources: Vec::new(),
            taps: Vec::new(),
            scratch: vec![0.0; MAX_BLOCK_SIZE],
            mix_buffer: vec![0.0; MAX_BLOCK_SIZE],
            events,
        }
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Connect a node to the main output
    pub fn add_source(&mut self, node: Box<dyn GraphNode>) -> SourceId {
        let id = SourceId(self.allocate_id());
        self.sources.push(BusSource {
            id,
            node,
            taps: Vec::new(),
        });
        id
    }

    /// Disconnect and drop a source. Returns false if it was already gone.
    pub fn remove_source(&mut self, id: SourceId) -> bool {
        let before = self.sources.len();
        self.sources.retain(|source| source.id != id);
        self.sources.len() != before
    }

    pub fn has_source(&self, id: SourceId) -> bool {
        self.sources.iter().any(|source| source.id == id)
    }

    pub fn source_count(&self) -> usize {
        self.sources.len()
    }

    /// Create a disarmed tap backed by a ring of `capacity` samples
    pub fn create_tap(&mut self, capacity: usize) -> (TapId, Consumer<f32>) {
        let id = TapId(self.allocate_id());
        let (producer, consumer) = RingBuffer::new(capacity.max(1));
        self.taps.push(Tap {
            id,
            armed: false,
            producer,
            stats: TapStats::default(),
        });
        (id, consumer)
    }

    pub fn has_tap(&self, id: TapId) -> bool {
        self.taps.iter().any(|tap| tap.id == id)
    }

    /// Route `source` into `tap` in addition to the main output
    pub fn connect_tap(&mut self, source: SourceId, tap: TapId) -> bool {
        if !self.has_tap(tap) {
            return false;
        }
        match self.sources.iter_mut().find(|s| s.id == source) {
            Some(source) => {
                if !source.taps.contains(&tap) {
                    source.taps.push(tap);
                }
                true
            }
            None => false,
        }
    }

    /// Start pushing routed samples into the tap
    pub fn arm_tap(&mut self, id: TapId) -> bool {
        match self.taps.iter_mut().find(|tap| tap.id == id) {
            Some(tap) => {
                tap.armed = true;
                true
            }
            None => false,
        }
    }

    /// Remove a tap and every route into it
    pub fn remove_tap(&mut self, id: TapId) -> Option<TapStats> {
        let index = self.taps.iter().position(|tap| tap.id == id)?;
        let tap = self.taps.swap_remove(index);
        for source in &mut self.sources {
            source.taps.retain(|&t| t != id);
        }
        Some(tap.stats)
    }

    /// Drop every source and tap
    pub fn clear(&mut self) {
        self.sources.clear();
        self.taps.clear();
    }

    /// Bus time in seconds
    pub fn time(&self) -> f64 {
        self.ctx.time
    }

    pub fn sample_rate(&self) -> f32 {
        self.ctx.sample_rate
    }

    /// Render one mono block of at most `MAX_BLOCK_SIZE` frames
    pub fn render_block(&mut self, out: &mut [f32]) {
        debug_assert!(out.len() <= MAX_BLOCK_SIZE);
        out.fill(0.0);

        let frames = out.len();
        let Self {
            ctx,
            sources,
            taps,
            scratch,
            events,
            ..
        } = self;

        for source in sources.iter_mut() {
            let block = &mut scratch[..frames];
            block.fill(0.0);
            source.node.render_block(block, ctx);

            mix::sum_into(out, block);
            for tap_id in &source.taps {
                if let Some(tap) = taps.iter_mut().find(|tap| tap.id == *tap_id) {
                    tap.capture(block);
                }
            }
        }

        ctx.advance(frames);

        sources.retain(|source| {
            if source.node.is_active() {
                true
            } else {
                // No receivers is fine; nobody is tracking this source
                let _ = events.send(BusEvent::SourceEnded(source.id));
                false
            }
        });
    }

    /// Render mono output of any length, in `MAX_BLOCK_SIZE` chunks
    pub fn render(&mut self, out: &mut [f32]) {
        for chunk in out.chunks_mut(MAX_BLOCK_SIZE) {
            self.render_block(chunk);
        }
    }

    /// Render interleaved frames with the mono mix copied to every channel
    pub fn render_interleaved(&mut self, data: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        let mut mix_buffer = std::mem::take(&mut self.mix_buffer);

        for chunk in data.chunks_mut(MAX_BLOCK_SIZE * channels) {
            let frames = chunk.len() / channels;
            let block = &mut mix_buffer[..frames];
            self.render_block(block);
            mix::fan_out(block, chunk, channels);
        }

        self.mix_buffer = mix_buffer;
    }
}
