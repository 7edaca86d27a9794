//! Ring buffer between the decoder and the device callback
//!
//! The render thread pulls decoded samples from the source into the producer
//! half; the cpal callback drains the consumer half. Both halves are
//! lock-free (ringbuf crate).
//!
//! # Sample Format
//!
//! Interleaved f32 samples in the configured channel layout.

use crate::audio::config::AudioConfig;
use crate::audio::types::PcmSource;
use crate::error::Result;
use ringbuf::{
    traits::{Consumer, Observer, Producer, Split},
    HeapCons, HeapProd, HeapRb,
};

/// Ring capacity in multiples of the configured buffer size
pub const RING_BLOCKS: usize = 16;

/// Result of one fill pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillStatus {
    /// Samples were moved into the ring
    Filled(usize),
    /// The ring has no free space
    Full,
    /// The source reported end of stream
    EndOfStream,
}

/// Ring capacity in samples for a configuration
pub fn ring_capacity(config: &AudioConfig) -> usize {
    config.buffer_samples() * RING_BLOCKS
}

/// Create a ring buffer and split it into its two halves.
pub fn sample_ring(capacity: usize) -> (HeapProd<f32>, HeapCons<f32>) {
    HeapRb::<f32>::new(capacity.max(1)).split()
}

/// Move as many samples as fit from `source` into `producer`.
///
/// `scratch` is reused between calls to avoid allocating on every pass.
pub fn fill_from_source(
    source: &mut dyn PcmSource,
    producer: &mut HeapProd<f32>,
    scratch: &mut Vec<f32>,
) -> Result<FillStatus> {
    let vacant = producer.vacant_len();
    if vacant == 0 {
        return Ok(FillStatus::Full);
    }

    if scratch.len() < vacant {
        scratch.resize(vacant, 0.0);
    }

    let read = source.read_samples(&mut scratch[..vacant])?;
    if read == 0 {
        return Ok(FillStatus::EndOfStream);
    }

    let pushed = producer.push_slice(&scratch[..read]);
    Ok(FillStatus::Filled(pushed))
}

/// Fill a device buffer from `consumer`.
///
/// While `paused`, or on underrun, the remainder is written as silence and
/// the ring is left untouched. Returns the number of samples taken from the
/// ring.
pub fn write_output<T>(consumer: &mut HeapCons<f32>, out: &mut [T], paused: bool) -> usize
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    if paused {
        out.fill(T::from_sample(0.0f32));
        return 0;
    }

    let mut taken = 0;
    for slot in out.iter_mut() {
        match consumer.try_pop() {
            Some(sample) => {
                *slot = T::from_sample(sample.clamp(-1.0, 1.0));
                taken += 1;
            }
            None => *slot = T::from_sample(0.0f32),
        }
    }
    taken
}
