//! Connection ownership and lifecycle.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Track active connections so shutdown can drain
//! - Drive one connection: read bytes, parse pipelined requests, queue
//!   exchanges, write responses back in parse order
//! - Apply outbound watermark backpressure and the idle timeout
//!
//! Each connection is owned by exactly one task; all of its mutable state
//! lives on that task's stack. The route table and pipeline are shared
//! read-only.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use futures_util::stream::FuturesOrdered;
use futures_util::StreamExt;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, Notify};

use crate::error::ConnectionError;
use crate::http::{RequestParser, Response};
use crate::observability::metrics;
use crate::pipeline::{Outcome, Pipeline};

/// Global atomic counter for connection IDs. Relaxed ordering is enough:
/// only uniqueness matters.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn next() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Tracks open connections for graceful drain.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    inner: Arc<TrackerInner>,
}

#[derive(Debug, Default)]
struct TrackerInner {
    active: AtomicUsize,
    idle: Notify,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an open connection; the guard unregisters on drop.
    pub fn track(&self) -> ConnectionGuard {
        self.inner.active.fetch_add(1, Ordering::SeqCst);
        metrics::connection_opened();
        ConnectionGuard {
            inner: self.inner.clone(),
        }
    }

    pub fn active(&self) -> usize {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Resolve once no connections remain. Registers interest before
    /// checking the count so a concurrent close cannot be missed.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.active() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Decrements the active count on drop, panics included.
#[derive(Debug)]
pub struct ConnectionGuard {
    inner: Arc<TrackerInner>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let before = self.inner.active.fetch_sub(1, Ordering::SeqCst);
        metrics::connection_closed();
        if before == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}

/// Per-connection tuning, derived from the server config.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionSettings {
    pub idle_secs: u64,
    /// Pause reading once buffered response bytes exceed this.
    pub high_watermark: usize,
    /// Resume reading once buffered response bytes fall to this.
    pub low_watermark: usize,
    /// Cap on exchanges in flight on one connection.
    pub max_pipelined: usize,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            idle_secs: 60,
            high_watermark: 256 * 1024,
            low_watermark: 64 * 1024,
            max_pipelined: 32,
        }
    }
}

type ExchangeFuture = std::pin::Pin<Box<dyn std::future::Future<Output = Outcome> + Send>>;

/// Drive one connection to completion. Runs inside the per-connection
/// tracing span the dispatch loop opens.
///
/// Responses are written in the order their requests were parsed: each
/// exchange future goes into a `FuturesOrdered`, so a response that
/// finishes early waits buffered in its slot until its turn.
pub async fn drive(
    mut stream: TcpStream,
    pipeline: Arc<Pipeline>,
    parser: RequestParser,
    settings: ConnectionSettings,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<(), ConnectionError> {
    let (mut reader, mut writer) = stream.split();

    let mut inbuf = BytesMut::with_capacity(8 * 1024);
    let mut outbuf = BytesMut::with_capacity(8 * 1024);
    let mut in_flight: FuturesOrdered<ExchangeFuture> = FuturesOrdered::new();

    // closing: stop parsing new requests, finish what is queued, then exit.
    let mut closing = false;
    let mut paused = false;
    let mut result: Result<(), ConnectionError> = Ok(());

    let idle = Duration::from_secs(settings.idle_secs.max(1));
    let idle_sleep = tokio::time::sleep(idle);
    tokio::pin!(idle_sleep);

    loop {
        // Outbound watermark hysteresis.
        if !paused && outbuf.len() >= settings.high_watermark {
            paused = true;
            tracing::debug!(buffered = outbuf.len(), "read side paused");
        } else if paused && outbuf.len() <= settings.low_watermark {
            paused = false;
            tracing::debug!(buffered = outbuf.len(), "read side resumed");
        }

        // Parse every complete request already buffered, up to the
        // pipelining cap.
        if !closing && !paused {
            while in_flight.len() < settings.max_pipelined {
                match parser.parse(&mut inbuf) {
                    Ok(Some(parsed)) => {
                        let p = Arc::clone(&pipeline);
                        in_flight.push_back(Box::pin(async move { p.process(parsed).await }));
                    }
                    Ok(None) => break,
                    Err(err) => {
                        metrics::record_error(err.kind());
                        tracing::warn!(error = %err, "request parse failed");
                        // Framing is unreliable from here on (even a 413
                        // leaves unread body bytes in the stream), so the
                        // error response is the connection's last.
                        let response = Response::error_json(err.status(), &err.to_string())
                            .close_connection();
                        in_flight.push_back(Box::pin(async move {
                            Outcome {
                                response,
                                request_id: None,
                                head_only: false,
                                keep_alive: false,
                            }
                        }));
                        closing = true;
                        break;
                    }
                }
            }
        }

        if closing && in_flight.is_empty() && outbuf.is_empty() {
            break;
        }

        let can_read = !closing && !paused && in_flight.len() < settings.max_pipelined;

        tokio::select! {
            // Flush buffered response bytes.
            wrote = writer.write_buf(&mut outbuf), if !outbuf.is_empty() => {
                match wrote {
                    Ok(0) => {
                        result = Err(ConnectionError::Io(std::io::Error::from(
                            std::io::ErrorKind::WriteZero,
                        )));
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        result = Err(ConnectionError::Io(e));
                        break;
                    }
                }
            }

            // Next response in parse order became ready.
            Some(outcome) = in_flight.next(), if !in_flight.is_empty() => {
                outcome.response.write_to(&mut outbuf, outcome.request_id, outcome.head_only);
                if !outcome.keep_alive {
                    closing = true;
                    // Nothing may follow a close-marked response; exchanges
                    // parsed after it are abandoned.
                    if !in_flight.is_empty() {
                        metrics::record_error(ConnectionError::Closed.kind());
                        in_flight = FuturesOrdered::new();
                    }
                }
                idle_sleep.as_mut().reset(tokio::time::Instant::now() + idle);
            }

            // More request bytes.
            read = reader.read_buf(&mut inbuf), if can_read => {
                match read {
                    Ok(0) => {
                        tracing::debug!("peer closed read side");
                        closing = true;
                    }
                    Ok(_) => {
                        idle_sleep.as_mut().reset(tokio::time::Instant::now() + idle);
                    }
                    Err(e) => {
                        result = Err(ConnectionError::Io(e));
                        break;
                    }
                }
            }

            // Idle: no bytes and nothing in flight for the whole window.
            _ = idle_sleep.as_mut(), if in_flight.is_empty() && outbuf.is_empty() && !closing => {
                tracing::debug!("idle timeout");
                result = Err(ConnectionError::IdleTimeout);
                break;
            }

            // Graceful shutdown: stop reading, drain what is in flight.
            _ = shutdown.recv(), if !closing => {
                tracing::debug!("draining for shutdown");
                closing = true;
            }
        }
    }

    // A terminating connection abandons exchanges whose responses were not
    // yet written; handlers already running finish on the pool and their
    // results are discarded.
    if !in_flight.is_empty() {
        metrics::record_error(ConnectionError::Closed.kind());
        tracing::debug!(aborted = in_flight.len(), "exchanges aborted with the connection");
    }

    // Best-effort flush of whatever is left (e.g. a final error response).
    if !outbuf.is_empty() && result.is_ok() {
        if let Err(e) = writer.write_all(&outbuf).await {
            result = Err(ConnectionError::Io(e));
        }
    }
    let _ = writer.shutdown().await;

    match &result {
        Ok(()) => tracing::debug!("connection closed"),
        Err(err) => {
            metrics::record_error(err.kind());
            tracing::debug!(error = %err, "connection terminated");
        }
    }
    result
}
