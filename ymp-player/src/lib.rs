//! # ymp Player Library (ymp-player)
//!
//! Streaming playback client for the Yandex Music catalog.
//!
//! **Purpose:** Search the catalog, resolve track download URLs, stream the
//! compressed audio over HTTP, decode it incrementally and render it on the
//! default output device. Tracks can also be saved to disk.
//!
//! **Architecture:** transport (reqwest) -> decoder (symphonia) -> ring buffer
//! (ringbuf) -> output device (cpal), driven by a single-mutex controller.

pub mod audio;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod playback;
pub mod session;
pub mod transport;
pub mod update;

pub use error::{Error, Result};
pub use playback::{PlaybackState, StreamPlayer};
pub use session::MusicSession;
