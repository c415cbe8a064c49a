//! Top-level configuration
//!
//! Each subsystem owns its own settings struct; [`TonetapeConfig`] bundles
//! them with chainable setters:
//!
//! ```ignore
//! let config = TonetapeConfig::default()
//!     .with_delay(Duration::from_secs(2))
//!     .with_frequency(220.0);
//! ```
//!
//! The binary layers environment overrides on top via
//! [`TonetapeConfig::apply_overrides`].

use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::{
    capture::CaptureConfig, engine::EngineConfig, playback::PlaybackConfig, tone::ToneConfig,
};

pub const ENV_DELAY_MS: &str = "TONETAPE_DELAY_MS";
pub const ENV_FREQUENCY: &str = "TONETAPE_FREQUENCY";
pub const ENV_GAIN: &str = "TONETAPE_GAIN";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TonetapeConfig {
    pub engine: EngineConfig,
    pub tone: ToneConfig,
    pub capture: CaptureConfig,
    pub playback: PlaybackConfig,
}

impl TonetapeConfig {
    pub fn with_engine(mut self, engine: EngineConfig) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_tone(mut self, tone: ToneConfig) -> Self {
        self.tone = tone;
        self
    }

    pub fn with_frequency(mut self, frequency: f32) -> Self {
        self.tone.frequency = frequency;
        self
    }

    pub fn with_gain(mut self, gain: f32) -> Self {
        self.tone.gain = gain;
        self
    }

    /// Delay between finalize completion and playback
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.playback.delay = delay;
        self
    }

    pub fn with_max_recording(mut self, max_duration: Duration) -> Self {
        self.capture.max_duration = max_duration;
        self
    }

    /// Apply overrides from a key lookup (usually `std::env::var`).
    pub fn apply_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_DELAY_MS) {
            let ms: u64 = parse(ENV_DELAY_MS, &value)?;
            self.playback.delay = Duration::from_millis(ms);
        }
        if let Some(value) = lookup(ENV_FREQUENCY) {
            let frequency: f32 = parse(ENV_FREQUENCY, &value)?;
            if !(20.0..=20_000.0).contains(&frequency) {
                return Err(invalid(ENV_FREQUENCY, &value));
            }
            self.tone.frequency = frequency;
        }
        if let Some(value) = lookup(ENV_GAIN) {
            let gain: f32 = parse(ENV_GAIN, &value)?;
            if !(0.0..=1.0).contains(&gain) {
                return Err(invalid(ENV_GAIN, &value));
            }
            self.tone.gain = gain;
        }
        Ok(self)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().apply_overrides(|key| std::env::var(key).ok())
    }
}

fn parse<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| invalid(key, value))
}

fn invalid(key: &'static str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    }
}

/// Serialize `Duration` as integer milliseconds
#[cfg(feature = "serde")]
pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
