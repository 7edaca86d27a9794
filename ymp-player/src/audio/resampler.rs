//! Streaming sample rate conversion using rubato
//!
//! Decoded packets arrive in arbitrary sizes while rubato's fixed-input
//! resampler consumes whole chunks, so input is queued per channel until a
//! chunk is complete. At end of stream the remainder and the resampler's
//! delay line are flushed and the output is trimmed to the exact converted
//! length.

use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::debug;

/// Input frames per resampler chunk
const CHUNK_FRAMES: usize = 1024;

/// Resampler fed with interleaved packets of any size
pub struct StreamResampler {
    resampler: FastFixedIn<f32>,
    input_rate: u32,
    output_rate: u32,
    /// Queued planar input not yet processed
    queued: Vec<Vec<f32>>,
    /// Leading output frames that are resampler delay
    delay: usize,
    frames_in: u64,
    frames_out: u64,
    flushed: bool,
}

impl StreamResampler {
    pub fn new(input_rate: u32, output_rate: u32, channels: u16) -> Result<Self> {
        let channels = channels.max(1) as usize;
        let resampler = FastFixedIn::<f32>::new(
            output_rate as f64 / input_rate as f64,
            1.0,
            PolynomialDegree::Septic,
            CHUNK_FRAMES,
            channels,
        )
        .map_err(|e| Error::Decode(format!("Failed to create resampler: {}", e)))?;

        debug!(
            "Resampling {} Hz to {} Hz ({} channels)",
            input_rate, output_rate, channels
        );

        Ok(Self {
            delay: resampler.output_delay(),
            resampler,
            input_rate,
            output_rate,
            queued: vec![Vec::with_capacity(CHUNK_FRAMES); channels],
            frames_in: 0,
            frames_out: 0,
            flushed: false,
        })
    }

    fn channels(&self) -> usize {
        self.queued.len()
    }

    /// Queue interleaved `samples` and append every completed output chunk to
    /// `out` (interleaved).
    pub fn push(&mut self, samples: &[f32], out: &mut Vec<f32>) -> Result<()> {
        let channels = self.channels();
        for frame in samples.chunks_exact(channels) {
            for (queue, sample) in self.queued.iter_mut().zip(frame) {
                queue.push(*sample);
            }
        }
        self.frames_in += (samples.len() / channels) as u64;

        loop {
            let needed = self.resampler.input_frames_next();
            if self.queued[0].len() < needed {
                return Ok(());
            }
            let chunk: Vec<Vec<f32>> = self
                .queued
                .iter_mut()
                .map(|queue| queue.drain(..needed).collect())
                .collect();
            let planar = self
                .resampler
                .process(&chunk, None)
                .map_err(|e| Error::Decode(format!("Resampling failed: {}", e)))?;
            self.emit(&planar, out, u64::MAX);
        }
    }

    /// Drain queued input and the delay line at end of stream.
    ///
    /// Only the first call produces output.
    pub fn flush(&mut self, out: &mut Vec<f32>) -> Result<()> {
        if self.flushed {
            return Ok(());
        }
        self.flushed = true;

        let total = (self.frames_in * self.output_rate as u64).div_ceil(self.input_rate as u64);

        if !self.queued[0].is_empty() {
            let rest: Vec<Vec<f32>> = self.queued.iter_mut().map(std::mem::take).collect();
            let planar = self
                .resampler
                .process_partial(Some(rest.as_slice()), None)
                .map_err(|e| Error::Decode(format!("Resampling failed: {}", e)))?;
            self.emit(&planar, out, total);
        }

        while self.frames_out < total {
            let planar = self
                .resampler
                .process_partial::<Vec<f32>>(None, None)
                .map_err(|e| Error::Decode(format!("Resampling failed: {}", e)))?;
            if planar.first().map_or(true, Vec::is_empty) {
                break;
            }
            self.emit(&planar, out, total);
        }

        debug!(
            "Resampled {} frames to {} frames",
            self.frames_in, self.frames_out
        );
        Ok(())
    }

    /// Interleave `planar` into `out`, skipping delay frames and stopping once
    /// `limit` frames have been produced in total.
    fn emit(&mut self, planar: &[Vec<f32>], out: &mut Vec<f32>, limit: u64) {
        let frames = planar.first().map_or(0, Vec::len);
        let skip = self.delay.min(frames);
        self.delay -= skip;

        let available = (frames - skip) as u64;
        let take = available.min(limit.saturating_sub(self.frames_out)) as usize;

        out.reserve(take * planar.len());
        for i in skip..skip + take {
            out.extend(planar.iter().map(|channel| channel[i]));
        }
        self.frames_out += take as u64;
    }
}
