//! Playback control
//!
//! Single-stream controller owning the network stream, its decoder and the
//! render handle.

pub mod controller;
pub mod state;

pub use controller::StreamPlayer;
pub use state::PlaybackState;
