//! Audio output configuration
//!
//! `AudioConfig` is captured once when the player is constructed and never
//! mutated afterwards. Unset (zero) values fall back to CD-quality defaults.

use serde::Deserialize;
use std::fmt;
use tracing::warn;

pub const DEFAULT_SAMPLE_RATE: u32 = 44100;
pub const DEFAULT_CHANNELS: u16 = 2;
pub const DEFAULT_SAMPLE_FORMAT: SampleFormat = SampleFormat::S16Le;
/// Default buffer size in bytes
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Output sample encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    /// 8-bit unsigned
    U8,
    /// 16-bit signed little-endian
    S16Le,
    /// 32-bit float little-endian
    F32Le,
}

impl SampleFormat {
    /// Size of one sample of one channel
    pub fn bytes_per_sample(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::S16Le => 2,
            Self::F32Le => 4,
        }
    }

    /// Parse a format name from configuration.
    ///
    /// Unrecognized names fall back to 16-bit signed (2 bytes per sample).
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "u8" | "uint8" => Self::U8,
            "s16" | "s16le" | "int16" | "i16" => Self::S16Le,
            "f32" | "f32le" | "float32" => Self::F32Le,
            other => {
                warn!("Unrecognized sample format '{}', using s16le", other);
                DEFAULT_SAMPLE_FORMAT
            }
        }
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::U8 => "u8",
            Self::S16Le => "s16le",
            Self::F32Le => "f32le",
        };
        f.write_str(name)
    }
}

/// Raw audio settings as read from the TOML `[audio]` table or CLI flags
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AudioSettings {
    #[serde(default)]
    pub sample_rate: Option<u32>,
    #[serde(default)]
    pub channels: Option<u16>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub buffer_size: Option<usize>,
}

/// Immutable audio configuration for a player
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioConfig {
    sample_rate: u32,
    channels: u16,
    format: SampleFormat,
    buffer_size: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            channels: DEFAULT_CHANNELS,
            format: DEFAULT_SAMPLE_FORMAT,
            buffer_size: DEFAULT_BUFFER_SIZE,
        }
    }
}

impl AudioConfig {
    /// Build a configuration, replacing zero values with defaults.
    pub fn new(
        sample_rate: u32,
        channels: u16,
        format: Option<SampleFormat>,
        buffer_size: usize,
    ) -> Self {
        Self {
            sample_rate: if sample_rate == 0 { DEFAULT_SAMPLE_RATE } else { sample_rate },
            channels: if channels == 0 { DEFAULT_CHANNELS } else { channels },
            format: format.unwrap_or(DEFAULT_SAMPLE_FORMAT),
            buffer_size: if buffer_size == 0 { DEFAULT_BUFFER_SIZE } else { buffer_size },
        }
    }

    /// Build a configuration from optional settings.
    pub fn from_settings(settings: &AudioSettings) -> Self {
        Self::new(
            settings.sample_rate.unwrap_or(0),
            settings.channels.unwrap_or(0),
            settings.format.as_deref().map(SampleFormat::from_name),
            settings.buffer_size.unwrap_or(0),
        )
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    /// Buffer size in bytes
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Buffer size expressed in samples of the configured format
    pub fn buffer_samples(&self) -> usize {
        (self.buffer_size / self.format.bytes_per_sample()).max(self.channels as usize)
    }
}
