use std::io::Cursor;
use std::time::Duration;

use super::{CaptureError, SessionId};

pub const WAV_MIME: &str = "audio/wav";

/// Turns captured mono samples into a container blob
pub trait ArtifactEncoder: Send + Sync {
    fn mime_type(&self) -> &'static str;

    fn encode(&self, samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, CaptureError>;
}

/// 32-bit float mono WAV via hound
#[derive(Debug, Default, Clone, Copy)]
pub struct WavEncoder;

impl ArtifactEncoder for WavEncoder {
    fn mime_type(&self) -> &'static str {
        WAV_MIME
    }

    fn encode(&self, samples: &[f32], sample_rate: u32) -> Result<Vec<u8>, CaptureError> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };

        let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 4));
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(encode_error)?;
            for &sample in samples {
                writer.write_sample(sample).map_err(encode_error)?;
            }
            writer.finalize().map_err(encode_error)?;
        }

        Ok(cursor.into_inner())
    }
}

fn encode_error(err: hound::Error) -> CaptureError {
    CaptureError::Encode(err.to_string())
}

/// Finalized recording. Opaque bytes plus enough metadata to play them.
///
/// Not `Clone`: an artifact moves from the capture sink to the playback path
/// once and is consumed there.
pub struct RecordedArtifact {
    session: SessionId,
    data: Vec<u8>,
    mime_type: &'static str,
    sample_rate: u32,
    frames: u64,
}

impl RecordedArtifact {
    pub fn new(
        session: SessionId,
        data: Vec<u8>,
        mime_type: &'static str,
        sample_rate: u32,
        frames: u64,
    ) -> Self {
        Self {
            session,
            data,
            mime_type,
            sample_rate,
            frames,
        }
    }

    /// Session that produced this artifact
    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Captured mono frames
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.frames as f64 / self.sample_rate.max(1) as f64)
    }
}

impl std::fmt::Debug for RecordedArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordedArtifact")
            .field("session", &self.session)
            .field("mime_type", &self.mime_type)
            .field("bytes", &self.data.len())
            .field("sample_rate", &self.sample_rate)
            .field("frames", &self.frames)
            .finish()
    }
}
