use rtrb::Consumer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    /// Bound to a destination, not capturing yet
    Inactive,
    Recording,
}

/// Recorder bound to a tap's sample stream
///
/// The render thread pushes into the tap's ring; the recorder only reads, so
/// it needs no lock on the bus.
pub struct Recorder {
    stream: Consumer<f32>,
    state: RecorderState,
    sample_rate: u32,
}

impl Recorder {
    pub(crate) fn new(stream: Consumer<f32>, sample_rate: u32) -> Self {
        Self {
            stream,
            state: RecorderState::Inactive,
            sample_rate,
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Samples captured and not yet drained
    pub fn buffered(&self) -> usize {
        self.stream.slots()
    }

    pub(crate) fn mark_recording(&mut self) {
        self.state = RecorderState::Recording;
    }

    /// Take everything the tap has pushed so far
    pub(crate) fn drain(&mut self) -> Vec<f32> {
        let available = self.stream.slots();
        let mut samples = Vec::with_capacity(available);
        while let Ok(sample) = self.stream.pop() {
            samples.push(sample);
        }
        samples
    }
}

impl std::fmt::Debug for Recorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recorder")
            .field("state", &self.state)
            .field("buffered", &self.buffered())
            .field("sample_rate", &self.sample_rate)
            .finish()
    }
}
