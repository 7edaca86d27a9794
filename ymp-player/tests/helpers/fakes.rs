//! Stand-ins for the network and the audio device

use std::collections::HashMap;
use std::io::{self, Cursor, Read};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use ymp_player::audio::{AudioSink, PcmSource, RenderHandle};
use ymp_player::error::{Error, NetworkError, Result};
use ymp_player::transport::{NetworkStream, StreamAbort, Transport};

/// Longest a stalled read waits before giving up on its own
pub const STALL_LIMIT: Duration = Duration::from_secs(5);

enum Route {
    Body(Vec<u8>),
    /// Serves the body, then blocks until aborted or closed
    Stalling(Vec<u8>),
    Status(u16, &'static str),
}

#[derive(Default)]
struct StreamCounters {
    opened: AtomicUsize,
    closed: AtomicUsize,
    max_live: AtomicUsize,
}

/// Transport serving fixed bodies and counting open streams
#[derive(Default)]
pub struct MemoryTransport {
    routes: Mutex<HashMap<String, Route>>,
    counters: Arc<StreamCounters>,
    fail_close: Arc<AtomicBool>,
}

impl MemoryTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn serve(&self, url: &str, body: Vec<u8>) {
        self.routes.lock().unwrap().insert(url.to_string(), Route::Body(body));
    }

    pub fn serve_stalling(&self, url: &str, body: Vec<u8>) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), Route::Stalling(body));
    }

    pub fn serve_status(&self, url: &str, code: u16, reason: &'static str) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), Route::Status(code, reason));
    }

    /// Make every stream's close report an error (the stream still counts as closed).
    pub fn set_fail_close(&self, fail: bool) {
        self.fail_close.store(fail, Ordering::SeqCst);
    }

    pub fn opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }

    /// Streams opened and not yet closed
    pub fn live(&self) -> usize {
        self.opened() - self.closed()
    }

    /// Highest number of streams that were open at the same time
    pub fn max_live(&self) -> usize {
        self.counters.max_live.load(Ordering::SeqCst)
    }
}

impl Transport for MemoryTransport {
    fn fetch(&self, url: &str) -> Result<Box<dyn NetworkStream>> {
        let routes = self.routes.lock().unwrap();
        let (body, stalls) = match routes.get(url) {
            Some(Route::Body(body)) => (body, false),
            Some(Route::Stalling(body)) => (body, true),
            Some(Route::Status(code, reason)) => {
                return Err(NetworkError::Status {
                    code: *code,
                    reason: reason.to_string(),
                }
                .into())
            }
            None => return Err(NetworkError::Connection(format!("no route to {}", url)).into()),
        };

        let opened = self.counters.opened.fetch_add(1, Ordering::SeqCst) + 1;
        let live = opened - self.counters.closed.load(Ordering::SeqCst);
        self.counters.max_live.fetch_max(live, Ordering::SeqCst);
        Ok(Box::new(MemoryStream {
            data: Cursor::new(body.clone()),
            stalls,
            gate: Arc::new(AbortGate::default()),
            counters: Arc::clone(&self.counters),
            fail_close: Arc::clone(&self.fail_close),
        }))
    }
}

/// Abort flag a stalled read can wait on
#[derive(Default)]
struct AbortGate {
    aborted: Mutex<bool>,
    wake: Condvar,
}

impl AbortGate {
    fn is_aborted(&self) -> bool {
        *self.aborted.lock().unwrap()
    }

    fn wait(&self) {
        let aborted = self.aborted.lock().unwrap();
        let _unused = self
            .wake
            .wait_timeout_while(aborted, STALL_LIMIT, |aborted| !*aborted)
            .unwrap();
    }
}

impl StreamAbort for AbortGate {
    fn abort(&self) {
        *self.aborted.lock().unwrap() = true;
        self.wake.notify_all();
    }
}

struct MemoryStream {
    data: Cursor<Vec<u8>>,
    stalls: bool,
    gate: Arc<AbortGate>,
    counters: Arc<StreamCounters>,
    fail_close: Arc<AtomicBool>,
}

impl Read for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.gate.is_aborted() {
            return Ok(0);
        }
        let n = self.data.read(buf)?;
        if n == 0 && self.stalls && !buf.is_empty() {
            self.gate.wait();
        }
        Ok(n)
    }
}

impl NetworkStream for MemoryStream {
    fn abort_handle(&self) -> Arc<dyn StreamAbort> {
        Arc::clone(&self.gate) as Arc<dyn StreamAbort>
    }

    fn close(&mut self) -> io::Result<()> {
        self.gate.abort();
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "connection reset"));
        }
        Ok(())
    }
}

/// Calls received by render handles, tagged with the handle id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkEvent {
    Start(usize),
    Pause(usize),
    Resume(usize),
    Close(usize),
}

#[derive(Default)]
struct SinkLog {
    events: Mutex<Vec<SinkEvent>>,
    created: AtomicUsize,
    alive: AtomicUsize,
}

/// Sink that records handle lifecycles instead of producing sound
#[derive(Default)]
pub struct RecordingSink {
    log: Arc<SinkLog>,
    fail_start: AtomicBool,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    pub fn created(&self) -> usize {
        self.log.created.load(Ordering::SeqCst)
    }

    /// Handles created and not yet closed or dropped
    pub fn alive(&self) -> usize {
        self.log.alive.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<SinkEvent> {
        self.log.events.lock().unwrap().clone()
    }
}

impl AudioSink for RecordingSink {
    fn open(&self, source: Box<dyn PcmSource>) -> Result<Box<dyn RenderHandle>> {
        let id = self.log.created.fetch_add(1, Ordering::SeqCst) + 1;
        self.log.alive.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(RecordingHandle {
            id,
            source: Some(source),
            log: Arc::clone(&self.log),
            fail_start: self.fail_start.load(Ordering::SeqCst),
        }))
    }
}

struct RecordingHandle {
    id: usize,
    source: Option<Box<dyn PcmSource>>,
    log: Arc<SinkLog>,
    fail_start: bool,
}

impl RecordingHandle {
    fn record(&self, event: SinkEvent) {
        self.log.events.lock().unwrap().push(event);
    }
}

impl RenderHandle for RecordingHandle {
    fn start(&mut self) -> Result<()> {
        self.record(SinkEvent::Start(self.id));
        if self.fail_start {
            return Err(Error::AudioOutput("device busy".to_string()));
        }
        // Pull one block like a real render thread would
        if let Some(source) = self.source.as_mut() {
            let mut block = vec![0.0f32; 256];
            source.read_samples(&mut block)?;
        }
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.record(SinkEvent::Pause(self.id));
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        self.record(SinkEvent::Resume(self.id));
        Ok(())
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        self.record(SinkEvent::Close(self.id));
        self.source.take();
        Ok(())
    }
}

impl Drop for RecordingHandle {
    fn drop(&mut self) {
        self.log.alive.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct PullLog {
    created: AtomicUsize,
    alive: AtomicUsize,
    threads: AtomicUsize,
    samples: AtomicUsize,
}

/// Decrements the live thread count when a pulling thread exits
struct ThreadGuard(Arc<PullLog>);

impl Drop for ThreadGuard {
    fn drop(&mut self) {
        self.0.threads.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Sink whose handles pull from the source on their own thread, like a
/// device callback would, pacing each block with a short sleep
#[derive(Default)]
pub struct PullingSink {
    log: Arc<PullLog>,
}

impl PullingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn created(&self) -> usize {
        self.log.created.load(Ordering::SeqCst)
    }

    pub fn alive(&self) -> usize {
        self.log.alive.load(Ordering::SeqCst)
    }

    /// Pulling threads that have not exited
    pub fn threads(&self) -> usize {
        self.log.threads.load(Ordering::SeqCst)
    }

    /// Samples read from sources so far
    pub fn samples(&self) -> usize {
        self.log.samples.load(Ordering::SeqCst)
    }
}

impl AudioSink for PullingSink {
    fn open(&self, mut source: Box<dyn PcmSource>) -> Result<Box<dyn RenderHandle>> {
        self.log.created.fetch_add(1, Ordering::SeqCst);
        self.log.alive.fetch_add(1, Ordering::SeqCst);
        self.log.threads.fetch_add(1, Ordering::SeqCst);

        let running = Arc::new(AtomicBool::new(false));
        let stop = Arc::new(AtomicBool::new(false));

        let thread = {
            let (running, stop) = (Arc::clone(&running), Arc::clone(&stop));
            let guard = ThreadGuard(Arc::clone(&self.log));
            thread::spawn(move || {
                let mut block = vec![0.0f32; 256];
                while !stop.load(Ordering::SeqCst) {
                    if running.load(Ordering::SeqCst) {
                        let n = source.read_samples(&mut block).unwrap_or(0);
                        guard.0.samples.fetch_add(n, Ordering::SeqCst);
                    }
                    thread::sleep(Duration::from_millis(1));
                }
                drop(guard);
            })
        };

        Ok(Box::new(PullingHandle {
            running,
            stop,
            thread: Some(thread),
            log: Arc::clone(&self.log),
        }))
    }
}

struct PullingHandle {
    running: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    log: Arc<PullLog>,
}

impl PullingHandle {
    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            thread.join().unwrap();
        }
    }
}

impl RenderHandle for PullingHandle {
    fn start(&mut self) -> Result<()> {
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn pause(&mut self) -> Result<()> {
        self.running.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn close(mut self: Box<Self>) -> Result<()> {
        self.shutdown();
        Ok(())
    }
}

impl Drop for PullingHandle {
    fn drop(&mut self) {
        self.shutdown();
        self.log.alive.fetch_sub(1, Ordering::SeqCst);
    }
}
