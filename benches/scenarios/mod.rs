//! Real-world scenario benchmarks.
//!
//! These model what the device callback and the finalize path actually do:
//! render the bus with a live tone (optionally recording it), and encode or
//! decode a finished take.

mod artifact;
mod bus;

pub use artifact::bench_artifact;
pub use bus::bench_bus;
