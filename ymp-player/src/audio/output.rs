//! Audio output using cpal
//!
//! Each bound source gets its own render thread. The thread owns the cpal
//! stream (which is not `Send`), keeps the ring buffer topped up from the
//! source and exits when the handle is closed.

use crate::audio::buffer::{fill_from_source, ring_capacity, sample_ring, write_output, FillStatus};
use crate::audio::config::{AudioConfig, SampleFormat};
use crate::audio::types::{AudioSink, PcmSource, RenderHandle};
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, Device, SampleRate, Stream, StreamConfig};
use ringbuf::HeapCons;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Sleep between fill passes when the ring is full or the source is drained
const FILL_INTERVAL: Duration = Duration::from_millis(5);

/// Audio sink rendering to the default output device
pub struct CpalSink {
    config: AudioConfig,
}

impl CpalSink {
    /// Check that an output device exists and capture the output format.
    pub fn new(config: AudioConfig) -> Result<Self> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?;

        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!(
            "Audio output: {} ({} Hz, {} ch, {})",
            name,
            config.sample_rate(),
            config.channels(),
            config.format()
        );

        Ok(Self { config })
    }
}

impl AudioSink for CpalSink {
    fn open(&self, source: Box<dyn PcmSource>) -> Result<Box<dyn RenderHandle>> {
        let paused = Arc::new(AtomicBool::new(true));
        let stop = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = mpsc::channel();

        let thread = {
            let config = self.config;
            let paused = Arc::clone(&paused);
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("ymp-render".to_string())
                .spawn(move || render_thread(config, source, paused, stop, ready_tx))
                .map_err(|e| Error::AudioOutput(format!("Failed to spawn render thread: {}", e)))?
        };

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(CpalRenderHandle {
                paused,
                stop,
                thread: Some(thread),
            })),
            Ok(Err(e)) => {
                join_setup_thread(thread);
                Err(e)
            }
            Err(_) => {
                join_setup_thread(thread);
                Err(Error::AudioOutput("Render thread exited during setup".to_string()))
            }
        }
    }
}

/// Join a render thread that gave up during setup.
///
/// Returns the panic message when it panicked.
fn join_setup_thread(thread: JoinHandle<()>) -> Option<String> {
    let panic = thread.join().err()?;
    let message = panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    warn!("Render thread panicked during setup: {}", message);
    Some(message)
}

/// Handle to one render thread
struct CpalRenderHandle {
    paused: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl CpalRenderHandle {
    fn shutdown(&mut self) -> Result<()> {
        self.stop.store(true, Ordering::SeqCst);
        match self.thread.take() {
            Some(thread) => thread
                .join()
                .map_err(|_| Error::AudioOutput("Render thread panicked".to_string())),
            None => Ok(()),
        }
    }
}

impl RenderHandle for CpalRenderHandle {
    fn start(&mut self) -> Result<()> {
        self.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.paused.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        self.paused.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        self.shutdown()
    }
}

impl Drop for CpalRenderHandle {
    fn drop(&mut self) {
        // Ensure the thread is gone even if close was never called
        if let Err(e) = self.shutdown() {
            warn!("{}", e);
        }
    }
}

fn render_thread(
    config: AudioConfig,
    mut source: Box<dyn PcmSource>,
    paused: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    ready: mpsc::Sender<Result<()>>,
) {
    let (mut producer, consumer) = sample_ring(ring_capacity(&config));

    if source.sample_rate() != config.sample_rate() {
        warn!(
            "Source produces {} Hz for a {} Hz output",
            source.sample_rate(),
            config.sample_rate()
        );
    }

    let stream = match open_stream(&config, consumer, Arc::clone(&paused)) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };
    let _ = ready.send(Ok(()));

    let mut scratch = Vec::new();
    let mut drained = false;
    while !stop.load(Ordering::SeqCst) {
        if drained {
            thread::sleep(FILL_INTERVAL);
            continue;
        }
        match fill_from_source(source.as_mut(), &mut producer, &mut scratch) {
            Ok(FillStatus::Filled(_)) => {}
            Ok(FillStatus::Full) => thread::sleep(FILL_INTERVAL),
            Ok(FillStatus::EndOfStream) => {
                debug!("Source drained");
                drained = true;
            }
            Err(e) => {
                warn!("Stopping render after source error: {}", e);
                drained = true;
            }
        }
    }

    if let Err(e) = stream.pause() {
        warn!("Failed to pause output stream: {}", e);
    }
    drop(stream);
    debug!("Render thread exiting");
}

/// Open the default device and start an output stream draining `consumer`.
fn open_stream(
    config: &AudioConfig,
    consumer: HeapCons<f32>,
    paused: Arc<AtomicBool>,
) -> Result<Stream> {
    let device = cpal::default_host()
        .default_output_device()
        .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?;

    let stream_config = StreamConfig {
        channels: config.channels(),
        sample_rate: SampleRate(config.sample_rate()),
        buffer_size: BufferSize::Default,
    };

    let stream = match config.format() {
        SampleFormat::F32Le => build_stream::<f32>(&device, &stream_config, consumer, paused)?,
        SampleFormat::S16Le => build_stream::<i16>(&device, &stream_config, consumer, paused)?,
        SampleFormat::U8 => build_stream::<u8>(&device, &stream_config, consumer, paused)?,
    };

    stream
        .play()
        .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)))?;

    Ok(stream)
}

fn build_stream<T>(
    device: &Device,
    config: &StreamConfig,
    mut consumer: HeapCons<f32>,
    paused: Arc<AtomicBool>,
) -> Result<Stream>
where
    T: cpal::SizedSample + cpal::FromSample<f32>,
{
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                write_output(&mut consumer, data, paused.load(Ordering::Relaxed));
            },
            |err| {
                error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))
}
