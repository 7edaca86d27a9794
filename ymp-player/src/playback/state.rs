//! Playback state
//!
//! Intended logical state of the controller. Reaching the end of the stream
//! does not change it; only controller operations do.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// No render handle (nothing opened, freshly opened, or stopped)
    #[default]
    Idle,
    Playing,
    Paused,
    /// Controller has been closed
    Stopped,
}

impl PlaybackState {
    /// Whether a render handle must exist in this state
    pub fn has_render_handle(self) -> bool {
        matches!(self, Self::Playing | Self::Paused)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}
