//! Incremental stream decoder using symphonia
//!
//! Wraps an open network stream, probes its container and decodes packets on
//! demand. Decoded samples are converted to interleaved f32, remapped to
//! the configured output channel count and resampled to the configured rate.

use crate::audio::config::{AudioConfig, SampleFormat};
use crate::audio::resampler::StreamResampler;
use crate::audio::types::PcmSource;
use crate::error::{Error, Result};
use crate::transport::{NetworkStream, StreamAbort};
use std::io::{self, Read};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::{MediaSourceStream, ReadOnlySource};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

type SharedStream = Arc<Mutex<Option<Box<dyn NetworkStream>>>>;

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Metadata of an opened stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamInfo {
    /// Sample rate declared by the stream
    pub sample_rate: u32,
    /// Channel count declared by the stream
    pub source_channels: u16,
    /// Total frames, when the container declares them
    pub total_frames: Option<u64>,
    /// Total length in bytes of the stream expressed in the output format
    /// (0 when unknown)
    pub byte_len: u64,
}

/// Convert a byte length in the output format to a play time.
///
/// `byte_len / bytes_per_sample / channels` samples at `sample_rate`.
pub fn duration_from_byte_len(
    byte_len: u64,
    channels: u16,
    format: SampleFormat,
    sample_rate: u32,
) -> Duration {
    let frame_bytes = format.bytes_per_sample() as u64 * channels.max(1) as u64;
    if sample_rate == 0 {
        return Duration::ZERO;
    }
    let samples = (byte_len / frame_bytes) as u128;
    let nanos = samples * 1_000_000_000 / sample_rate as u128;
    Duration::from_nanos(nanos.min(u64::MAX as u128) as u64)
}

/// Length in output-format bytes of `frames` declared by the container.
///
/// The count comes from the stream itself and may be absurd, so the product
/// saturates.
fn declared_byte_len(frames: Option<u64>, config: &AudioConfig) -> u64 {
    let bytes_per_frame = config.channels() as u64 * config.format().bytes_per_sample() as u64;
    frames.map_or(0, |frames| frames.saturating_mul(bytes_per_frame))
}

/// Byte reader over the shared network stream.
///
/// Reads after the stream has been closed report end of stream.
struct NetworkSource {
    stream: SharedStream,
}

impl Read for NetworkSource {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match lock(&self.stream).as_mut() {
            Some(stream) => stream.read(buf),
            None => Ok(0),
        }
    }
}

/// Decoder bound to one network stream
pub struct StreamDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    info: StreamInfo,
    output_channels: u16,
    output_rate: u32,
    sample_buf: Option<SampleBuffer<f32>>,
    resampler: Option<StreamResampler>,
    /// Remapped samples waiting for the resampler
    remapped: Vec<f32>,
    /// Output samples not yet handed out
    pending: Vec<f32>,
    pending_pos: usize,
    finished: bool,
    stream: SharedStream,
    abort: Arc<dyn StreamAbort>,
}

impl StreamDecoder {
    /// Probe `stream` and prepare a decoder for its default audio track.
    ///
    /// On failure the stream is closed before the error is returned.
    pub fn open(stream: Box<dyn NetworkStream>, url: &str, config: &AudioConfig) -> Result<Self> {
        let abort = stream.abort_handle();
        let shared: SharedStream = Arc::new(Mutex::new(Some(stream)));

        match Self::probe(Arc::clone(&shared), abort, url, config) {
            Ok(decoder) => Ok(decoder),
            Err(e) => {
                if let Some(mut stream) = lock(&shared).take() {
                    if let Err(close_err) = stream.close() {
                        warn!("Failed to close stream after decode error: {}", close_err);
                    }
                }
                Err(e)
            }
        }
    }

    fn probe(
        shared: SharedStream,
        abort: Arc<dyn StreamAbort>,
        url: &str,
        config: &AudioConfig,
    ) -> Result<Self> {
        let source = ReadOnlySource::new(NetworkSource {
            stream: Arc::clone(&shared),
        });
        let mss = MediaSourceStream::new(Box::new(source), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = url_extension(url) {
            hint.with_extension(&ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| Error::Decode(format!("Failed to probe format: {}", e)))?;

        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| Error::Decode("No audio track found".to_string()))?;

        let track_id = track.id;
        let params = track.codec_params.clone();

        let sample_rate = params
            .sample_rate
            .ok_or_else(|| Error::Decode("Sample rate not found".to_string()))?;
        let source_channels = params
            .channels
            .map(|c| c.count() as u16)
            .ok_or_else(|| Error::Decode("Channel count not found".to_string()))?;

        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| Error::Decode(format!("Failed to create decoder: {}", e)))?;

        let info = StreamInfo {
            sample_rate,
            source_channels,
            total_frames: params.n_frames,
            byte_len: declared_byte_len(params.n_frames, config),
        };

        let resampler = if sample_rate != config.sample_rate() {
            Some(StreamResampler::new(
                sample_rate,
                config.sample_rate(),
                config.channels(),
            )?)
        } else {
            None
        };

        debug!(
            "Stream format: sample_rate={}, channels={}, frames={:?}",
            sample_rate, source_channels, info.total_frames
        );

        Ok(Self {
            format,
            decoder,
            track_id,
            info,
            output_channels: config.channels(),
            output_rate: config.sample_rate(),
            sample_buf: None,
            resampler,
            remapped: Vec::new(),
            pending: Vec::new(),
            pending_pos: 0,
            finished: false,
            stream: shared,
            abort,
        })
    }

    pub fn info(&self) -> StreamInfo {
        self.info
    }

    /// Handle that closes the connection without waiting for a read in
    /// progress on another thread.
    pub fn abort_handle(&self) -> Arc<dyn StreamAbort> {
        Arc::clone(&self.abort)
    }

    /// Close the underlying network stream.
    ///
    /// Only the first call reaches the stream; later calls succeed trivially.
    pub fn close(&mut self) -> Result<()> {
        self.finished = true;
        match lock(&self.stream).take() {
            Some(mut stream) => stream.close().map_err(Error::Io),
            None => Ok(()),
        }
    }

    pub fn is_closed(&self) -> bool {
        lock(&self.stream).is_none()
    }

    /// Decode packets until one yields samples.
    ///
    /// Returns `false` at end of stream.
    fn decode_next(&mut self) -> Result<bool> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::IoError(ref e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    debug!("Reached end of stream");
                    return Ok(false);
                }
                Err(SymphoniaError::ResetRequired) => return Ok(false),
                Err(e) => return Err(Error::Decode(format!("Failed to read packet: {}", e))),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    warn!("Skipping malformed packet: {}", e);
                    continue;
                }
                Err(SymphoniaError::IoError(ref e)) if e.kind() == io::ErrorKind::UnexpectedEof => {
                    return Ok(false);
                }
                Err(e) => return Err(Error::Decode(format!("Decode failed: {}", e))),
            };

            if decoded.frames() == 0 {
                continue;
            }

            let spec = *decoded.spec();
            let source_channels = spec.channels.count();
            let needed = decoded.capacity() * source_channels;
            if self.sample_buf.as_ref().map_or(true, |b| b.capacity() < needed) {
                self.sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
            }

            if let Some(buf) = self.sample_buf.as_mut() {
                buf.copy_interleaved_ref(decoded);

                self.pending.clear();
                self.pending_pos = 0;
                match self.resampler.as_mut() {
                    Some(resampler) => {
                        self.remapped.clear();
                        remap_channels(
                            buf.samples(),
                            source_channels,
                            self.output_channels as usize,
                            &mut self.remapped,
                        );
                        resampler.push(&self.remapped, &mut self.pending)?;
                    }
                    None => remap_channels(
                        buf.samples(),
                        source_channels,
                        self.output_channels as usize,
                        &mut self.pending,
                    ),
                }
                return Ok(true);
            }
        }
    }
}

impl PcmSource for StreamDecoder {
    fn read_samples(&mut self, out: &mut [f32]) -> Result<usize> {
        let mut written = 0;

        while written < out.len() {
            let available = self.pending.len() - self.pending_pos;
            if available > 0 {
                let n = available.min(out.len() - written);
                out[written..written + n]
                    .copy_from_slice(&self.pending[self.pending_pos..self.pending_pos + n]);
                self.pending_pos += n;
                written += n;
                continue;
            }

            if self.finished {
                break;
            }

            if !self.decode_next()? {
                self.finished = true;
                if let Some(resampler) = self.resampler.as_mut() {
                    self.pending.clear();
                    self.pending_pos = 0;
                    resampler.flush(&mut self.pending)?;
                }
            }
        }

        Ok(written)
    }

    fn sample_rate(&self) -> u32 {
        self.output_rate
    }

    fn channels(&self) -> u16 {
        self.output_channels
    }
}

impl Drop for StreamDecoder {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!("Error closing stream on drop: {}", e);
        }
    }
}

/// Decoder shared between the controller and the render thread.
///
/// The controller keeps one clone to close the stream; the sink reads
/// through the other. A read holds the decoder lock for as long as the
/// network blocks, so [`SharedDecoder::abort`] bypasses it.
#[derive(Clone)]
pub struct SharedDecoder {
    decoder: Arc<Mutex<StreamDecoder>>,
    abort: Arc<dyn StreamAbort>,
}

impl SharedDecoder {
    pub fn new(decoder: StreamDecoder) -> Self {
        Self {
            abort: decoder.abort_handle(),
            decoder: Arc::new(Mutex::new(decoder)),
        }
    }

    /// Close the connection under a reader. The blocked read returns end of
    /// stream and the reader releases the decoder.
    pub fn abort(&self) {
        self.abort.abort();
    }

    pub fn close(&self) -> Result<()> {
        lock(&self.decoder).close()
    }
}

impl PcmSource for SharedDecoder {
    fn read_samples(&mut self, out: &mut [f32]) -> Result<usize> {
        lock(&self.decoder).read_samples(out)
    }

    fn sample_rate(&self) -> u32 {
        lock(&self.decoder).sample_rate()
    }

    fn channels(&self) -> u16 {
        lock(&self.decoder).channels()
    }
}

/// Remap interleaved frames from `source` to `target` channels.
///
/// Mono is duplicated to every output channel, a mono target averages all
/// source channels, and other layouts keep the leading channels and pad
/// with silence.
fn remap_channels(input: &[f32], source: usize, target: usize, out: &mut Vec<f32>) {
    if source == 0 || target == 0 {
        return;
    }
    if source == target {
        out.extend_from_slice(input);
        return;
    }

    out.reserve(input.len() / source * target);
    for frame in input.chunks_exact(source) {
        if source == 1 {
            out.extend(std::iter::repeat(frame[0]).take(target));
        } else if target == 1 {
            out.push(frame.iter().sum::<f32>() / source as f32);
        } else {
            out.extend((0..target).map(|c| frame.get(c).copied().unwrap_or(0.0)));
        }
    }
}

/// File extension of the last path segment of a URL, used as a probe hint.
fn url_extension(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next()?;
    let path = path.split_once("://").map_or(path, |(_, rest)| rest);
    let (_, path) = path.split_once('/')?;
    let segment = path.rsplit('/').next()?;
    let (stem, ext) = segment.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() || ext.len() > 5 {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NoAbort;

    impl StreamAbort for NoAbort {
        fn abort(&self) {}
    }

    struct CursorStream {
        data: Cursor<Vec<u8>>,
        closes: Arc<AtomicUsize>,
        fail_close: bool,
    }

    impl Read for CursorStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.data.read(buf)
        }
    }

    impl NetworkStream for CursorStream {
        fn close(&mut self) -> io::Result<()> {
            self.closes.fetch_add(1, Ordering::SeqCst);
            if self.fail_close {
                return Err(io::Error::new(io::ErrorKind::Other, "reset"));
            }
            Ok(())
        }

        fn abort_handle(&self) -> Arc<dyn StreamAbort> {
            Arc::new(NoAbort)
        }
    }

    fn wav_bytes(sample_rate: u32, channels: u16, frames: u32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..frames {
                let value = ((i % 100) as i16 - 50) * 300;
                for _ in 0..channels {
                    writer.write_sample(value).unwrap();
                }
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    fn stream(data: Vec<u8>) -> (Box<dyn NetworkStream>, Arc<AtomicUsize>) {
        let closes = Arc::new(AtomicUsize::new(0));
        let stream = CursorStream {
            data: Cursor::new(data),
            closes: Arc::clone(&closes),
            fail_close: false,
        };
        (Box::new(stream), closes)
    }

    fn drain(decoder: &mut StreamDecoder) -> usize {
        let mut buf = vec![0.0f32; 1000];
        let mut total = 0;
        loop {
            let n = decoder.read_samples(&mut buf).unwrap();
            if n == 0 {
                return total;
            }
            total += n;
        }
    }

    #[test]
    fn test_decodes_all_frames() {
        let (stream, _) = stream(wav_bytes(44100, 2, 4410));
        let mut decoder =
            StreamDecoder::open(stream, "http://host/a.wav", &AudioConfig::default()).unwrap();

        let info = decoder.info();
        assert_eq!(info.sample_rate, 44100);
        assert_eq!(info.source_channels, 2);
        assert_eq!(info.total_frames, Some(4410));
        assert_eq!(info.byte_len, 4410 * 2 * 2);

        assert_eq!(drain(&mut decoder), 4410 * 2);
        // Stays at end of stream
        let mut buf = [0.0f32; 16];
        assert_eq!(decoder.read_samples(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_mono_stream_is_duplicated_to_stereo() {
        let config = AudioConfig::new(22050, 2, None, 0);
        let (stream, _) = stream(wav_bytes(22050, 1, 1000));
        let mut decoder = StreamDecoder::open(stream, "http://host/mono.wav", &config).unwrap();

        assert_eq!(decoder.channels(), 2);
        assert_eq!(decoder.sample_rate(), 22050);
        assert_eq!(drain(&mut decoder), 2000);
    }

    #[test]
    fn test_stream_resampled_to_configured_rate() {
        // Half a second of 22050 Hz mono through a 44100 Hz stereo output
        let (stream, _) = stream(wav_bytes(22050, 1, 11025));
        let mut decoder =
            StreamDecoder::open(stream, "http://host/low.wav", &AudioConfig::default()).unwrap();

        assert_eq!(decoder.info().sample_rate, 22050);
        assert_eq!(decoder.sample_rate(), 44100);
        assert_eq!(drain(&mut decoder), 22050 * 2);
    }

    #[test]
    fn test_declared_byte_len() {
        let config = AudioConfig::default();
        assert_eq!(declared_byte_len(None, &config), 0);
        assert_eq!(declared_byte_len(Some(44100), &config), 176_400);
        // A crafted 64-bit frame count must not overflow
        assert_eq!(declared_byte_len(Some(u64::MAX / 2), &config), u64::MAX);

        let length = duration_from_byte_len(u64::MAX, config.channels(), config.format(), 44100);
        assert!(length > Duration::from_secs(1_000_000));
    }

    #[test]
    fn test_invalid_data_is_decode_error_and_closes_stream() {
        let (stream, closes) = stream(vec![0x42; 4096]);
        let result = StreamDecoder::open(stream, "http://host/track", &AudioConfig::default());

        assert!(matches!(result, Err(Error::Decode(_))));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_close_reaches_stream_once() {
        let (stream, closes) = stream(wav_bytes(44100, 2, 100));
        let mut decoder =
            StreamDecoder::open(stream, "http://host/a.wav", &AudioConfig::default()).unwrap();

        decoder.close().unwrap();
        decoder.close().unwrap();
        assert!(decoder.is_closed());
        drop(decoder);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_drop_survives_failing_close() {
        let closes = Arc::new(AtomicUsize::new(0));
        let stream = Box::new(CursorStream {
            data: Cursor::new(wav_bytes(44100, 2, 100)),
            closes: Arc::clone(&closes),
            fail_close: true,
        });
        let decoder =
            StreamDecoder::open(stream, "http://host/a.wav", &AudioConfig::default()).unwrap();

        drop(decoder);
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_duration_from_byte_len() {
        let one_second = duration_from_byte_len(176_400, 2, SampleFormat::S16Le, 44100);
        assert_eq!(one_second, Duration::from_secs(1));

        let half = duration_from_byte_len(22050, 1, SampleFormat::U8, 44100);
        assert_eq!(half, Duration::from_millis(500));

        assert_eq!(
            duration_from_byte_len(0, 2, SampleFormat::F32Le, 48000),
            Duration::ZERO
        );
        assert_eq!(
            duration_from_byte_len(1000, 2, SampleFormat::S16Le, 0),
            Duration::ZERO
        );
    }

    #[test]
    fn test_remap_channels() {
        let mut out = Vec::new();
        remap_channels(&[0.1, 0.2], 1, 2, &mut out);
        assert_eq!(out, vec![0.1, 0.1, 0.2, 0.2]);

        out.clear();
        remap_channels(&[0.2, 0.4, 0.6, 0.8], 2, 1, &mut out);
        assert_eq!(out.len(), 2);
        assert!((out[0] - 0.3).abs() < 1e-6);
        assert!((out[1] - 0.7).abs() < 1e-6);

        out.clear();
        remap_channels(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6], 3, 2, &mut out);
        assert_eq!(out, vec![0.1, 0.2, 0.4, 0.5]);
    }

    #[test]
    fn test_url_extension() {
        assert_eq!(url_extension("https://h/a/b.mp3?x=1").as_deref(), Some("mp3"));
        assert_eq!(url_extension("https://h/get-mp3/abc/123/rest").as_deref(), None);
        assert_eq!(url_extension("https://example.com").as_deref(), None);
        assert_eq!(url_extension("http://h/x.FLAC").as_deref(), Some("flac"));
    }
}
