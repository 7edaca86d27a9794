//! Audio pipeline seams
//!
//! The controller talks to decoding and output only through these traits so
//! that a device-free sink can stand in for tests.

use crate::error::Result;

/// Pull-based producer of interleaved f32 PCM samples
pub trait PcmSource: Send {
    /// Fill `out` with interleaved samples.
    ///
    /// Returns the number of samples written; `Ok(0)` signals end of stream.
    fn read_samples(&mut self, out: &mut [f32]) -> Result<usize>;

    /// Sample rate of the produced samples in Hz
    fn sample_rate(&self) -> u32;

    /// Number of interleaved channels
    fn channels(&self) -> u16;
}

/// Audio output that renders a source on its own playback thread
pub trait AudioSink: Send + Sync {
    /// Bind a source to a new render handle.
    ///
    /// The handle starts out suspended; call [`RenderHandle::start`].
    fn open(&self, source: Box<dyn PcmSource>) -> Result<Box<dyn RenderHandle>>;
}

/// Control surface of one bound source
pub trait RenderHandle: Send {
    /// Begin rendering.
    fn start(&mut self) -> Result<()>;

    /// Suspend output in place, keeping the source position.
    fn pause(&mut self) -> Result<()>;

    /// Continue output from where it was suspended.
    fn resume(&mut self) -> Result<()>;

    /// Stop rendering and release the device stream.
    ///
    /// After this returns, the playback thread has exited and no further
    /// samples of the source are rendered.
    fn close(self: Box<Self>) -> Result<()>;
}
