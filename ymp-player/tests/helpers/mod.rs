//! Test helper modules for ymp-player integration tests
//!
//! Provides reusable test infrastructure components:
//! - test_audio: in-memory WAV streams
//! - fakes: counting transport, recording sink and pulling sink standing in
//!   for HTTP and audio hardware

#![allow(dead_code)]

pub mod fakes;
pub mod test_audio;

pub use fakes::{MemoryTransport, PullingSink, RecordingSink, SinkEvent, STALL_LIMIT};
pub use test_audio::wav_bytes;
