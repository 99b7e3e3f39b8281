//! `RemoteClient`: typed stub for the worker.
//!
//! - tickets + routing by `request_id`
//! - caps for in-flight + outbound queue (backpressure)
//! - one FIFO outbound queue and one writer thread, so calls reach the worker in submit order
//! - TCP, UDS and in-process channel transports

use std::collections::HashMap;
use std::io;
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use thiserror::Error;

use ps_core::{ClientConfig, SolverConfig};
use ps_session::SessionInfo;

use crate::codec::{decode_response, encode_request_into, DecodeError};
use crate::frame::FrameError;
use crate::protocol::{RemoteFailure, Request, Response};
use crate::transport::{FrameSink, FrameSource, StreamSink, StreamSource};

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("backpressure: {0}")]
    Backpressure(&'static str),
    #[error("client disconnected")]
    Disconnected,
    #[error("request timed out")]
    Timeout,
    #[error("unexpected {got} response, wanted {expected}")]
    UnexpectedResponse {
        expected: &'static str,
        got: &'static str,
    },
    #[error(transparent)]
    Remote(#[from] RemoteFailure),
}

#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Maximum number of requests awaiting a response.
    pub max_inflight_total: usize,
    /// Bounded outbound queue capacity in number of frames.
    pub max_outbound_queue: usize,
    /// Request id starting value (useful for tests).
    pub request_id_start: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            max_inflight_total: 64,
            max_outbound_queue: 256,
            request_id_start: 1,
        }
    }
}

impl From<&ClientConfig> for ClientOptions {
    fn from(cfg: &ClientConfig) -> Self {
        Self {
            max_inflight_total: cfg.max_inflight,
            max_outbound_queue: cfg.max_outbound_queue,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone)]
pub struct LatencySummary {
    pub count: u64,
    pub min_us: u64,
    pub max_us: u64,
    pub mean_us: f64,
}

#[derive(Debug, Clone)]
pub struct ClientStatsSnapshot {
    pub inflight: usize,
    pub sent: u64,
    pub received: u64,
    pub errors: u64,
    pub latency_us: LatencySummary,
}

type Reply = Result<Response, RemoteError>;

#[derive(Debug)]
struct PendingEntry {
    start: Instant,
    tx: mpsc::Sender<Reply>,
}

/// Pending result of one submitted request.
#[derive(Debug)]
pub struct Ticket<T> {
    pub request_id: u64,
    rx: mpsc::Receiver<Reply>,
    extract: fn(Response) -> Result<T, RemoteError>,
}

impl<T> Ticket<T> {
    fn finish(&self, reply: Reply) -> Result<T, RemoteError> {
        match reply? {
            Response::Error(f) => Err(RemoteError::Remote(f)),
            r => (self.extract)(r),
        }
    }

    pub fn recv(&self) -> Result<T, RemoteError> {
        match self.rx.recv() {
            Ok(r) => self.finish(r),
            Err(_) => Err(RemoteError::Disconnected),
        }
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<T, RemoteError> {
        match self.rx.recv_timeout(timeout) {
            Ok(r) => self.finish(r),
            Err(mpsc::RecvTimeoutError::Timeout) => Err(RemoteError::Timeout),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(RemoteError::Disconnected),
        }
    }

    pub fn try_recv(&self) -> Result<Option<T>, RemoteError> {
        match self.rx.try_recv() {
            Ok(r) => self.finish(r).map(Some),
            Err(mpsc::TryRecvError::Empty) => Ok(None),
            Err(mpsc::TryRecvError::Disconnected) => Err(RemoteError::Disconnected),
        }
    }
}

fn unexpected<T>(expected: &'static str, got: Response) -> Result<T, RemoteError> {
    Err(RemoteError::UnexpectedResponse {
        expected,
        got: got.tag().as_str(),
    })
}

fn as_response(r: Response) -> Result<Response, RemoteError> {
    Ok(r)
}

fn as_unit(r: Response) -> Result<(), RemoteError> {
    match r {
        Response::Unit => Ok(()),
        other => unexpected("unit", other),
    }
}

fn as_bytes(r: Response) -> Result<u64, RemoteError> {
    match r {
        Response::Bytes(n) => Ok(n),
        other => unexpected("bytes", other),
    }
}

fn as_scalar(r: Response) -> Result<f32, RemoteError> {
    match r {
        Response::Scalar(x) => Ok(x),
        other => unexpected("scalar", other),
    }
}

fn as_values(r: Response) -> Result<Vec<f32>, RemoteError> {
    match r {
        Response::Values(v) => Ok(v),
        other => unexpected("values", other),
    }
}

fn as_handle(r: Response) -> Result<SessionInfo, RemoteError> {
    match r {
        Response::Handle(info) => Ok(info),
        other => unexpected("handle", other),
    }
}

/// Connection-level handle kept for shutdown.
#[derive(Debug)]
enum Link {
    Tcp(TcpStream),
    Uds(UnixStream),
    /// Closing the outbound queue is enough to stop an in-process worker.
    Channel,
}

impl Link {
    fn shutdown(&self) {
        match self {
            Link::Tcp(s) => {
                let _ = s.shutdown(Shutdown::Both);
            }
            Link::Uds(s) => {
                let _ = s.shutdown(Shutdown::Both);
            }
            Link::Channel => {}
        }
    }
}

pub struct RemoteClient {
    next_request_id: AtomicU64,
    opts: ClientOptions,

    inflight: Arc<AtomicUsize>,
    pending: Arc<Mutex<HashMap<u64, PendingEntry>>>,

    outbound_tx: Option<mpsc::SyncSender<Vec<u8>>>,
    link: Link,
    shutdown: Arc<AtomicBool>,
    reader_handle: Option<JoinHandle<()>>,
    writer_handle: Option<JoinHandle<()>>,
    /// In-process worker thread, joined after the link closes.
    worker_handle: Option<JoinHandle<()>>,

    stats: Arc<Mutex<Stats>>,
}

impl RemoteClient {
    pub fn connect_tcp<A: ToSocketAddrs>(
        addr: A,
        opts: ClientOptions,
    ) -> Result<Self, RemoteError> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true).ok();
        let source = Box::new(StreamSource(stream.try_clone()?));
        let sink = Box::new(StreamSink(stream.try_clone()?));
        Self::from_parts(source, sink, Link::Tcp(stream), opts, None)
    }

    pub fn connect_uds(
        path: impl AsRef<std::path::Path>,
        opts: ClientOptions,
    ) -> Result<Self, RemoteError> {
        let stream = UnixStream::connect(path)?;
        let source = Box::new(StreamSource(stream.try_clone()?));
        let sink = Box::new(StreamSink(stream.try_clone()?));
        Self::from_parts(source, sink, Link::Uds(stream), opts, None)
    }

    pub(crate) fn from_channel(
        source: Box<dyn FrameSource + Send>,
        sink: Box<dyn FrameSink + Send>,
        opts: ClientOptions,
        worker: JoinHandle<()>,
    ) -> Result<Self, RemoteError> {
        Self::from_parts(source, sink, Link::Channel, opts, Some(worker))
    }

    fn from_parts(
        source: Box<dyn FrameSource + Send>,
        sink: Box<dyn FrameSink + Send>,
        link: Link,
        opts: ClientOptions,
        worker_handle: Option<JoinHandle<()>>,
    ) -> Result<Self, RemoteError> {
        let pending = Arc::new(Mutex::new(HashMap::<u64, PendingEntry>::new()));
        let stats = Arc::new(Mutex::new(Stats::default()));
        let shutdown = Arc::new(AtomicBool::new(false));
        let inflight = Arc::new(AtomicUsize::new(0));

        let (outbound_tx, outbound_rx) = mpsc::sync_channel::<Vec<u8>>(opts.max_outbound_queue);

        let pending_r = Arc::clone(&pending);
        let pending_w = Arc::clone(&pending);
        let shutdown_r = Arc::clone(&shutdown);
        let stats_r = Arc::clone(&stats);
        let stats_w = Arc::clone(&stats);
        let inflight_r = Arc::clone(&inflight);
        let inflight_w = Arc::clone(&inflight);

        let reader_handle = thread::Builder::new()
            .name("ps-remote-reader".to_string())
            .spawn(move || reader_loop(source, pending_r, inflight_r, shutdown_r, stats_r))?;
        let writer_handle = thread::Builder::new()
            .name("ps-remote-writer".to_string())
            .spawn(move || writer_loop(sink, outbound_rx, pending_w, inflight_w, stats_w))?;

        Ok(Self {
            next_request_id: AtomicU64::new(opts.request_id_start),
            opts,
            inflight,
            pending,
            outbound_tx: Some(outbound_tx),
            link,
            shutdown,
            reader_handle: Some(reader_handle),
            writer_handle: Some(writer_handle),
            worker_handle,
            stats,
        })
    }

    /// Submit a raw request. Prefer the typed methods.
    pub fn submit(&self, req: Request) -> Result<Ticket<Response>, RemoteError> {
        self.submit_as(req, as_response)
    }

    fn submit_as<T>(
        &self,
        req: Request,
        extract: fn(Response) -> Result<T, RemoteError>,
    ) -> Result<Ticket<T>, RemoteError> {
        if !self.try_acquire_inflight() {
            self.stats_lock().on_error();
            return Err(RemoteError::Backpressure("max_inflight_total exceeded"));
        }

        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel::<Reply>();
        self.pending.lock().unwrap().insert(
            request_id,
            PendingEntry {
                start: Instant::now(),
                tx,
            },
        );

        let mut payload = Vec::with_capacity(64);
        encode_request_into(&mut payload, request_id, &req);

        let Some(tx) = self.outbound_tx.as_ref() else {
            self.remove_pending_with_error(request_id, RemoteError::Disconnected);
            return Err(RemoteError::Disconnected);
        };
        match tx.try_send(payload) {
            Ok(()) => {
                self.stats_lock().on_sent();
                Ok(Ticket {
                    request_id,
                    rx,
                    extract,
                })
            }
            Err(mpsc::TrySendError::Full(_)) => {
                self.remove_pending_with_error(
                    request_id,
                    RemoteError::Backpressure("outbound queue full"),
                );
                Err(RemoteError::Backpressure("outbound queue full"))
            }
            Err(mpsc::TrySendError::Disconnected(_)) => {
                self.remove_pending_with_error(request_id, RemoteError::Disconnected);
                Err(RemoteError::Disconnected)
            }
        }
    }

    /// Ask the worker to select, load and initialize an engine with `thread_count` workers.
    pub fn bootstrap(&self, thread_count: u32) -> Result<Ticket<()>, RemoteError> {
        self.submit_as(Request::Bootstrap { thread_count }, as_unit)
    }

    /// Handle to the worker's session. Fails with a `NoSession` remote error before bootstrap.
    pub fn get_handle(&self) -> Result<SessionHandle<'_>, RemoteError> {
        let info = self.submit_as(Request::GetHandle, as_handle)?.recv()?;
        Ok(SessionHandle { client: self, info })
    }

    pub fn stats_snapshot(&self) -> ClientStatsSnapshot {
        let inflight = self.inflight.load(Ordering::Relaxed);
        let s = self.stats.lock().unwrap();
        ClientStatsSnapshot {
            inflight,
            sent: s.sent,
            received: s.received,
            errors: s.errors,
            latency_us: s.latency.summary(),
        }
    }

    fn try_acquire_inflight(&self) -> bool {
        let cap = self.opts.max_inflight_total;
        let mut cur = self.inflight.load(Ordering::Relaxed);
        loop {
            if cur >= cap {
                return false;
            }
            match self.inflight.compare_exchange_weak(
                cur,
                cur + 1,
                Ordering::SeqCst,
                Ordering::Relaxed,
            ) {
                Ok(_) => return true,
                Err(next) => cur = next,
            }
        }
    }

    fn remove_pending_with_error(&self, request_id: u64, err: RemoteError) {
        let entry = { self.pending.lock().unwrap().remove(&request_id) };
        if let Some(e) = entry {
            let _ = e.tx.send(Err(err));
        }
        self.inflight.fetch_sub(1, Ordering::SeqCst);
        self.stats_lock().on_error();
    }

    fn stats_lock(&self) -> std::sync::MutexGuard<'_, Stats> {
        self.stats.lock().unwrap()
    }
}

impl Drop for RemoteClient {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.link.shutdown();
        // Dropping outbound_tx closes the writer loop, which closes the worker's source.
        self.outbound_tx.take();
        self.writer_handle.take().map(|h| h.join().ok());
        self.worker_handle.take().map(|h| h.join().ok());
        self.reader_handle.take().map(|h| h.join().ok());
        fail_all_pending(&self.pending, &self.inflight, || RemoteError::Disconnected);
    }
}

/// Typed view of the worker's session. Every call returns a ticket for its result.
pub struct SessionHandle<'a> {
    client: &'a RemoteClient,
    info: SessionInfo,
}

impl<'a> SessionHandle<'a> {
    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    pub fn session_id(&self) -> u64 {
        self.info.session_id
    }

    pub fn init(&self, config: SolverConfig) -> Result<Ticket<()>, RemoteError> {
        self.client.submit_as(Request::Init(config), as_unit)
    }

    pub fn memory_usage(&self, enable_compression: bool) -> Result<Ticket<u64>, RemoteError> {
        self.client
            .submit_as(Request::MemoryUsage { enable_compression }, as_bytes)
    }

    pub fn allocate_memory(&self, enable_compression: bool) -> Result<Ticket<()>, RemoteError> {
        self.client
            .submit_as(Request::AllocateMemory { enable_compression }, as_unit)
    }

    pub fn iterate(&self, iteration: u32) -> Result<Ticket<()>, RemoteError> {
        self.client.submit_as(Request::Iterate { iteration }, as_unit)
    }

    pub fn exploitability(&self) -> Result<Ticket<f32>, RemoteError> {
        self.client.submit_as(Request::Exploitability, as_scalar)
    }

    pub fn ev(&self) -> Result<Ticket<Vec<f32>>, RemoteError> {
        self.client.submit_as(Request::Ev, as_values)
    }

    pub fn finalize(&self) -> Result<Ticket<()>, RemoteError> {
        self.client.submit_as(Request::Finalize, as_unit)
    }
}

fn reader_loop(
    mut source: Box<dyn FrameSource + Send>,
    pending: Arc<Mutex<HashMap<u64, PendingEntry>>>,
    inflight: Arc<AtomicUsize>,
    shutdown: Arc<AtomicBool>,
    stats: Arc<Mutex<Stats>>,
) {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            break;
        }
        let payload = match source.recv_frame() {
            Ok(Some(p)) => p,
            Ok(None) => break,
            Err(_) => {
                stats.lock().unwrap().on_error();
                break;
            }
        };
        let (request_id, resp) = match decode_response(&payload) {
            Ok(r) => r,
            Err(_) => {
                stats.lock().unwrap().on_error();
                break;
            }
        };

        let entry = { pending.lock().unwrap().remove(&request_id) };
        if let Some(e) = entry {
            stats.lock().unwrap().on_received(e.start.elapsed());
            inflight.fetch_sub(1, Ordering::SeqCst);
            let _ = e.tx.send(Ok(resp));
        } else {
            // Unknown request_id; count it and keep reading.
            stats.lock().unwrap().on_error();
        }
    }
    fail_all_pending(&pending, &inflight, || RemoteError::Disconnected);
}

fn writer_loop(
    mut sink: Box<dyn FrameSink + Send>,
    outbound_rx: mpsc::Receiver<Vec<u8>>,
    pending: Arc<Mutex<HashMap<u64, PendingEntry>>>,
    inflight: Arc<AtomicUsize>,
    stats: Arc<Mutex<Stats>>,
) {
    while let Ok(payload) = outbound_rx.recv() {
        if sink.send_frame(payload).is_err() {
            stats.lock().unwrap().on_error();
            fail_all_pending(&pending, &inflight, || RemoteError::Disconnected);
            break;
        }
    }
}

fn fail_all_pending<F: Fn() -> RemoteError>(
    pending: &Arc<Mutex<HashMap<u64, PendingEntry>>>,
    inflight: &AtomicUsize,
    mk_err: F,
) {
    let entries: Vec<PendingEntry> = {
        let mut g = pending.lock().unwrap();
        g.drain().map(|(_, e)| e).collect()
    };
    if !entries.is_empty() {
        let n = entries.len();
        let mut cur = inflight.load(Ordering::Relaxed);
        loop {
            let next = cur.saturating_sub(n);
            match inflight.compare_exchange_weak(cur, next, Ordering::SeqCst, Ordering::Relaxed) {
                Ok(_) => break,
                Err(v) => cur = v,
            }
        }
    }
    for e in entries {
        let _ = e.tx.send(Err(mk_err()));
    }
}

#[derive(Debug, Default)]
struct Stats {
    sent: u64,
    received: u64,
    errors: u64,
    latency: Latency,
}

impl Stats {
    fn on_sent(&mut self) {
        self.sent += 1;
    }

    fn on_received(&mut self, dt: Duration) {
        self.received += 1;
        self.latency.record(dt);
    }

    fn on_error(&mut self) {
        self.errors += 1;
    }
}

#[derive(Debug, Default)]
struct Latency {
    count: u64,
    sum_us: u128,
    min_us: u64,
    max_us: u64,
}

impl Latency {
    fn record(&mut self, dt: Duration) {
        let us = dt.as_micros().min(u128::from(u64::MAX)) as u64;
        self.count += 1;
        self.sum_us += us as u128;
        if self.count == 1 {
            self.min_us = us;
            self.max_us = us;
        } else {
            self.min_us = self.min_us.min(us);
            self.max_us = self.max_us.max(us);
        }
    }

    fn summary(&self) -> LatencySummary {
        LatencySummary {
            count: self.count,
            min_us: self.min_us,
            max_us: self.max_us,
            mean_us: if self.count == 0 {
                0.0
            } else {
                self.sum_us as f64 / self.count as f64
            },
        }
    }
}
