//! Audio pipeline
//!
//! Decoding of network streams, ring buffering and device output.

pub mod buffer;
pub mod config;
pub mod decoder;
pub mod output;
pub mod resampler;
pub mod types;

pub use config::{AudioConfig, AudioSettings, SampleFormat};
pub use decoder::{StreamDecoder, StreamInfo};
pub use output::CpalSink;
pub use types::{AudioSink, PcmSource, RenderHandle};
