//! Stream playback controller
//!
//! Owns at most one playback session: the network stream, the decoder reading
//! it and the render handle driving the decoder on the sink's thread.
//!
//! All session state sits behind one mutex that every public operation holds
//! for its whole duration. The render thread never takes it; it only reads
//! through the shared decoder.
//!
//! Teardown order is fixed: the connection is aborted so a render thread
//! blocked on the network wakes up, then the render handle is closed (its
//! thread is joined), then the decoder is closed together with its network
//! stream.

use crate::audio::config::AudioConfig;
use crate::audio::decoder::{duration_from_byte_len, SharedDecoder, StreamDecoder, StreamInfo};
use crate::audio::output::CpalSink;
use crate::audio::types::{AudioSink, RenderHandle};
use crate::error::{Error, ReleaseFailures, Result};
use crate::playback::state::PlaybackState;
use crate::transport::{HttpTransport, Transport};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Default)]
struct PlayerInner {
    url: Option<String>,
    state: PlaybackState,
    decoder: Option<SharedDecoder>,
    info: Option<StreamInfo>,
    render: Option<Box<dyn RenderHandle>>,
}

impl PlayerInner {
    /// Close the render handle, then the decoder and its stream.
    ///
    /// Both steps always run. The URL is kept.
    fn release(&mut self) -> std::result::Result<(), ReleaseFailures> {
        let mut failures = ReleaseFailures::default();

        if let Some(decoder) = self.decoder.as_ref() {
            decoder.abort();
        }

        if let Some(render) = self.render.take() {
            if let Err(e) = render.close() {
                failures.render = Some(e.to_string());
            }
        }

        self.info = None;
        if let Some(decoder) = self.decoder.take() {
            if let Err(e) = decoder.close() {
                failures.stream = Some(e.to_string());
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(failures)
        }
    }
}

/// Single-stream playback controller
pub struct StreamPlayer {
    config: AudioConfig,
    transport: Arc<dyn Transport>,
    sink: Arc<dyn AudioSink>,
    inner: Mutex<PlayerInner>,
}

impl StreamPlayer {
    pub fn new(config: AudioConfig, transport: Arc<dyn Transport>, sink: Arc<dyn AudioSink>) -> Self {
        Self {
            config,
            transport,
            sink,
            inner: Mutex::new(PlayerInner::default()),
        }
    }

    /// Player streaming over HTTP to the default output device.
    pub fn with_default_output(config: AudioConfig) -> Result<Self> {
        let transport = Arc::new(HttpTransport::new()?);
        let sink = Arc::new(CpalSink::new(config)?);
        Ok(Self::new(config, transport, sink))
    }

    fn lock(&self) -> MutexGuard<'_, PlayerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    /// Open `url` as the current stream.
    ///
    /// Any previous session is released first. On failure nothing stays open
    /// and no URL is recorded.
    pub fn open(&self, url: &str) -> Result<()> {
        let mut inner = self.lock();

        if let Err(failures) = inner.release() {
            warn!("Failed to release previous stream: {}", failures);
        }
        inner.state = PlaybackState::Idle;
        inner.url = Some(url.to_string());

        let stream = match self.transport.fetch(url) {
            Ok(stream) => stream,
            Err(e) => {
                inner.url = None;
                return Err(e);
            }
        };

        let decoder = match StreamDecoder::open(stream, url, &self.config) {
            Ok(decoder) => decoder,
            Err(e) => {
                inner.url = None;
                return Err(e);
            }
        };

        inner.info = Some(decoder.info());
        inner.decoder = Some(SharedDecoder::new(decoder));
        info!("Opened stream: {}", url);
        Ok(())
    }

    /// Start or continue rendering the open stream.
    pub fn play(&self) -> Result<()> {
        let mut inner = self.lock();

        let decoder = inner
            .decoder
            .clone()
            .ok_or_else(|| Error::NotReady("no stream is open".to_string()))?;

        match inner.state {
            PlaybackState::Playing => Ok(()),
            PlaybackState::Paused => {
                if let Some(render) = inner.render.as_mut() {
                    render.resume()?;
                }
                inner.state = PlaybackState::Playing;
                debug!("Playback resumed");
                Ok(())
            }
            PlaybackState::Idle | PlaybackState::Stopped => {
                let mut render = self.sink.open(Box::new(decoder))?;
                if let Err(e) = render.start() {
                    if let Err(close_err) = render.close() {
                        warn!("Failed to close render handle after start error: {}", close_err);
                    }
                    return Err(e);
                }
                inner.render = Some(render);
                inner.state = PlaybackState::Playing;
                debug!("Playback started");
                Ok(())
            }
        }
    }

    /// Suspend output, keeping the session. No-op unless playing.
    pub fn pause(&self) {
        let mut inner = self.lock();
        if inner.state != PlaybackState::Playing {
            return;
        }
        if let Some(render) = inner.render.as_mut() {
            if let Err(e) = render.pause() {
                warn!("Failed to pause output: {}", e);
            }
        }
        inner.state = PlaybackState::Paused;
        debug!("Playback paused");
    }

    /// Continue output after a pause. No-op unless paused.
    pub fn resume(&self) {
        let mut inner = self.lock();
        if inner.state != PlaybackState::Paused {
            return;
        }
        if let Some(render) = inner.render.as_mut() {
            if let Err(e) = render.resume() {
                warn!("Failed to resume output: {}", e);
            }
        }
        inner.state = PlaybackState::Playing;
        debug!("Playback resumed");
    }

    /// Release the session and return to idle.
    ///
    /// Safe to call in any state. Release failures of the render handle and
    /// the stream are combined into one error.
    pub fn stop(&self) -> Result<()> {
        let mut inner = self.lock();
        let result = inner.release();
        inner.state = PlaybackState::Idle;
        result.map_err(Error::ResourceRelease)
    }

    /// Stop the current stream, then open and play `url`.
    ///
    /// A failure to stop is logged and does not prevent the new stream.
    pub fn replace(&self, url: &str) -> Result<()> {
        if let Err(e) = self.stop() {
            warn!("{}", e);
        }
        self.open(url)?;
        self.play()
    }

    /// Release everything before the controller is discarded.
    pub fn close(&self) -> Result<()> {
        let mut inner = self.lock();
        let result = inner.release();
        inner.state = PlaybackState::Stopped;
        result.map_err(Error::ResourceRelease)
    }

    /// Whether playback was requested and not paused or stopped.
    ///
    /// Stays true after the stream has been fully rendered.
    pub fn is_playing(&self) -> bool {
        self.lock().state == PlaybackState::Playing
    }

    pub fn is_paused(&self) -> bool {
        self.lock().state == PlaybackState::Paused
    }

    pub fn state(&self) -> PlaybackState {
        self.lock().state
    }

    /// URL of the most recently opened stream
    pub fn url(&self) -> Option<String> {
        self.lock().url.clone()
    }

    /// Total play time of the open stream.
    ///
    /// Zero when nothing is open or the stream does not declare its length.
    pub fn length(&self) -> Duration {
        let inner = self.lock();
        match inner.info {
            Some(info) => duration_from_byte_len(
                info.byte_len,
                self.config.channels(),
                self.config.format(),
                info.sample_rate,
            ),
            None => Duration::ZERO,
        }
    }
}

impl Drop for StreamPlayer {
    fn drop(&mut self) {
        let inner = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Err(failures) = inner.release() {
            warn!("Error releasing stream on drop: {}", failures);
        }
    }
}
