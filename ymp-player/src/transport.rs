//! Network transport for audio streams
//!
//! A single GET per stream. The response body is handed to the decoder as a
//! plain byte reader and consumed by the render thread for the whole length
//! of the track, so no overall request timeout is set. Instead every stream
//! can be aborted from another thread, which drops the connection and wakes
//! a reader blocked on it.

use crate::error::{NetworkError, Result};
use std::io::{self, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use tokio::sync::{mpsc, Notify};
use tracing::debug;

/// Body chunks buffered between the connection and the reader
const CHUNK_QUEUE: usize = 32;

/// Interrupts a stream from a thread other than its reader
pub trait StreamAbort: Send + Sync {
    /// Drop the connection. A blocked read returns end of stream, and so do
    /// all later reads.
    fn abort(&self);
}

/// An open byte stream owned by exactly one playback session
pub trait NetworkStream: Read + Send {
    /// Release the underlying connection.
    ///
    /// Reads after `close` return end of stream.
    fn close(&mut self) -> io::Result<()>;

    /// Handle usable while another thread is blocked in `read`.
    fn abort_handle(&self) -> Arc<dyn StreamAbort>;
}

/// Opens network streams for URLs
pub trait Transport: Send + Sync {
    /// Issue a GET for `url`.
    ///
    /// A non-success status is reported as [`NetworkError::Status`] and the
    /// response body is released before returning.
    fn fetch(&self, url: &str) -> Result<Box<dyn NetworkStream>>;
}

/// HTTP transport backed by reqwest.
///
/// Each stream gets a "ymp-fetch" thread running the request on its own
/// runtime, so fetches work from plain threads and from inside tokio alike.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self> {
        // Connections belong to the runtime of the fetch thread that opened
        // them and cannot outlive it
        let client = reqwest::Client::builder()
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| NetworkError::Connection(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn fetch(&self, url: &str) -> Result<Box<dyn NetworkStream>> {
        debug!("Fetching audio stream: {}", url);

        let signal = Arc::new(FetchSignal::default());
        let (chunk_tx, chunk_rx) = mpsc::channel(CHUNK_QUEUE);
        let (ready_tx, ready_rx) = std::sync::mpsc::channel();
        let request = self.client.get(url);

        {
            let signal = Arc::clone(&signal);
            thread::Builder::new()
                .name("ymp-fetch".to_string())
                .spawn(move || fetch_thread(request, signal, chunk_tx, ready_tx))
                .map_err(|e| NetworkError::Connection(format!("Failed to spawn fetch thread: {}", e)))?;
        }

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Box::new(HttpStream {
                chunks: Some(chunk_rx),
                current: Vec::new(),
                pos: 0,
                signal,
            })),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(NetworkError::Connection("Fetch thread exited before a response".to_string()).into()),
        }
    }
}

/// Abort flag shared by a stream, its abort handles and its fetch thread
#[derive(Default)]
struct FetchSignal {
    aborted: AtomicBool,
    notify: Notify,
}

impl FetchSignal {
    fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }
}

impl StreamAbort for FetchSignal {
    fn abort(&self) {
        if !self.aborted.swap(true, Ordering::SeqCst) {
            self.notify.notify_one();
        }
    }
}

type ReadySender = std::sync::mpsc::Sender<std::result::Result<(), NetworkError>>;

/// Send the request, report the status, then forward body chunks until the
/// body ends, the reader goes away or the stream is aborted. The response is
/// dropped on return, which closes the connection.
fn fetch_thread(
    request: reqwest::RequestBuilder,
    signal: Arc<FetchSignal>,
    chunks: mpsc::Sender<io::Result<Vec<u8>>>,
    ready: ReadySender,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            let _ = ready.send(Err(NetworkError::Connection(format!(
                "Failed to start fetch runtime: {}",
                e
            ))));
            return;
        }
    };

    runtime.block_on(async move {
        let mut response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                let _ = ready.send(Err(NetworkError::Connection(e.to_string())));
                return;
            }
        };

        let status = response.status();
        if !status.is_success() {
            let _ = ready.send(Err(NetworkError::Status {
                code: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            }));
            return;
        }

        debug!(
            "Stream opened: status={}, content_length={:?}",
            status,
            response.content_length()
        );
        if ready.send(Ok(())).is_err() {
            return;
        }

        while !signal.is_aborted() {
            let item = tokio::select! {
                _ = signal.notify.notified() => break,
                chunk = response.chunk() => match chunk {
                    Ok(Some(bytes)) => Ok(bytes.to_vec()),
                    Ok(None) => break,
                    Err(e) => Err(io::Error::new(io::ErrorKind::Other, e)),
                },
            };

            let failed = item.is_err();
            tokio::select! {
                _ = signal.notify.notified() => break,
                sent = chunks.send(item) => {
                    if sent.is_err() {
                        break;
                    }
                }
            }
            if failed {
                break;
            }
        }

        debug!("Connection released (aborted={})", signal.is_aborted());
    });
}

/// Body of a successful HTTP response
struct HttpStream {
    chunks: Option<mpsc::Receiver<io::Result<Vec<u8>>>>,
    current: Vec<u8>,
    pos: usize,
    signal: Arc<FetchSignal>,
}

impl Read for HttpStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if self.signal.is_aborted() || buf.is_empty() {
                return Ok(0);
            }

            if self.pos < self.current.len() {
                let n = buf.len().min(self.current.len() - self.pos);
                buf[..n].copy_from_slice(&self.current[self.pos..self.pos + n]);
                self.pos += n;
                return Ok(n);
            }

            let Some(chunks) = self.chunks.as_mut() else {
                return Ok(0);
            };
            // Wakes with None once an abort ends the fetch thread
            match chunks.blocking_recv() {
                Some(Ok(chunk)) => {
                    self.current = chunk;
                    self.pos = 0;
                }
                Some(Err(e)) => return Err(e),
                None => {
                    self.chunks = None;
                    return Ok(0);
                }
            }
        }
    }
}

impl NetworkStream for HttpStream {
    fn close(&mut self) -> io::Result<()> {
        self.signal.abort();
        self.chunks.take();
        self.current.clear();
        self.pos = 0;
        Ok(())
    }

    fn abort_handle(&self) -> Arc<dyn StreamAbort> {
        Arc::clone(&self.signal) as Arc<dyn StreamAbort>
    }
}

impl Drop for HttpStream {
    fn drop(&mut self) {
        self.signal.abort();
    }
}
