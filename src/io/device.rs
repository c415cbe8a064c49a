//! cpal output device driving an [`AudioContext`]
//!
//! The device callback pulls interleaved frames straight from the context.
//! An optional scope ring receives the first channel of everything played,
//! dropping samples when the reader falls behind.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rtrb::{Producer, PushError};
use tracing::{error, info};

use crate::engine::{AudioContext, EngineConfig};

#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("no default output device available")]
    NoOutputDevice,

    #[error("failed to fetch default output config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("output device uses {0:?} samples, only f32 is supported")]
    UnsupportedFormat(cpal::SampleFormat),

    #[error("output device is configured for {device} channels, context has {context}")]
    ChannelMismatch { device: u16, context: u16 },

    #[error("failed to build output stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start output stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

pub struct OutputDevice {
    device: cpal::Device,
    config: cpal::SupportedStreamConfig,
}

impl OutputDevice {
    /// Open the host's default output device with its default config
    pub fn open_default() -> Result<Self, DeviceError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(DeviceError::NoOutputDevice)?;
        let config = device.default_output_config()?;
        if config.sample_format() != cpal::SampleFormat::F32 {
            return Err(DeviceError::UnsupportedFormat(config.sample_format()));
        }

        let name = device.name().unwrap_or_else(|_| "unknown".into());
        info!(
            device = %name,
            sample_rate = config.sample_rate().0,
            channels = config.channels(),
            "output device opened"
        );
        Ok(Self { device, config })
    }

    /// Engine settings matching the device
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig::default()
            .with_sample_rate(self.config.sample_rate().0)
            .with_channels(self.config.channels())
    }

    /// Start a stream rendering `context`. Audio stops when the returned
    /// stream is dropped.
    pub fn start(
        &self,
        context: AudioContext,
        scope: Option<Producer<f32>>,
    ) -> Result<cpal::Stream, DeviceError> {
        let channels = self.config.channels();
        if channels != context.channels() {
            return Err(DeviceError::ChannelMismatch {
                device: channels,
                context: context.channels(),
            });
        }
        let channels = channels as usize;

        let mut scope = scope;
        let stream = self.device.build_output_stream(
            &self.config.config(),
            move |data: &mut [f32], _| {
                context.render(data);

                if let Some(scope) = scope.as_mut() {
                    for frame in data.chunks_exact(channels) {
                        if let Err(PushError::Full(_)) = scope.push(frame[0]) {
                            break;
                        }
                    }
                }
            },
            |err| error!(%err, "output stream error"),
            None,
        )?;

        stream.play()?;
        Ok(stream)
    }
}
