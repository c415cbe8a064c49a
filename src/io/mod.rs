//! External interfaces: the audio output device

mod device;

pub use device::{DeviceError, OutputDevice};
