//! Composable building blocks for the audio graph.
//!
//! Graph nodes wrap the low-level DSP primitives with block-based rendering
//! and an activity flag the output bus uses to retire finished sources. The
//! `extensions` module adds fluent helpers so chains read left to right.

/// Fluent combinators (`.through()`, `.gain()`).
pub mod extensions;
/// Fixed gain stage.
pub mod gain;
/// Core traits shared by all graph nodes.
pub mod node;
/// Audio-band oscillators.
pub mod oscillator;
/// Serial chaining of two nodes (source → effect).
pub mod through;

pub use extensions::NodeExt;
pub use gain::GainNode;
pub use node::{GraphNode, RenderCtx};
pub use oscillator::OscNode;
pub use through::Through;
