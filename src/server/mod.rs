//! Dispatch engine.
//!
//! # Data Flow
//! ```text
//! Listener (bounded accept)
//!     → one task per connection (connection.rs)
//!     → shared Pipeline (route lookup, binding, invocation)
//!     → bounded HandlerPool (workers.rs)
//!
//! Shutdown:
//!     trigger → stop accepting → drain connections up to the deadline
//!     → force-close stragglers
//! ```
//!
//! The route table and pipeline are immutable and shared; each
//! connection's mutable state has exactly one owning task.

pub mod connection;
pub mod listener;
pub mod workers;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::Instrument;

use crate::config::ServerConfig;
use crate::error::StartupError;
use crate::http::{ParserLimits, RequestParser};
use crate::lifecycle::Shutdown;
use crate::pipeline::middleware::Chain;
use crate::pipeline::Pipeline;
use crate::route::RouteTable;
use crate::server::connection::{ConnectionId, ConnectionSettings, ConnectionTracker};
use crate::server::listener::Listener;
use crate::server::workers::HandlerPool;

/// A bound server, ready to run.
pub struct Server {
    listener: Listener,
    pipeline: Arc<Pipeline>,
    parser: RequestParser,
    settings: ConnectionSettings,
    tracker: ConnectionTracker,
    drain: Duration,
}

impl Server {
    /// Bind the listener and wire the pipeline. The route table must be
    /// compiled before this point; bind failure is fatal.
    pub async fn bind(
        config: &ServerConfig,
        table: RouteTable,
        middleware: Chain,
    ) -> Result<Self, StartupError> {
        let listener = Listener::bind(&config.listener).await?;

        let pool = HandlerPool::new(config.handler_pool.max_in_flight());
        let pipeline = Arc::new(Pipeline::new(
            Arc::new(table),
            Arc::new(middleware),
            pool,
            config.timeouts.handler_secs,
        ));
        let parser = RequestParser::new(ParserLimits {
            max_uri_bytes: config.limits.max_uri_bytes,
            max_header_bytes: config.limits.max_header_bytes,
            max_body_bytes: config.limits.max_body_bytes,
        });
        let settings = ConnectionSettings {
            idle_secs: config.timeouts.idle_secs,
            high_watermark: config.connection.high_watermark_bytes,
            low_watermark: config.connection.low_watermark_bytes,
            max_pipelined: config.connection.max_pipelined,
        };

        Ok(Self {
            listener,
            pipeline,
            parser,
            settings,
            tracker: ConnectionTracker::new(),
            drain: Duration::from_secs(config.timeouts.drain_secs),
        })
    }

    /// The bound address, useful when binding to port 0.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.listener.local_addr()
    }

    /// Accept and serve until shutdown triggers, then drain.
    pub async fn run(self, shutdown: &Shutdown) -> Result<(), StartupError> {
        let mut accept_shutdown = shutdown.subscribe();
        let mut connections: JoinSet<()> = JoinSet::new();

        tracing::info!(
            routes = self.pipeline_routes(),
            address = %self.listener.local_addr().map(|a| a.to_string()).unwrap_or_default(),
            "server running"
        );

        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer, permit)) => {
                            let id = ConnectionId::next();
                            let guard = self.tracker.track();
                            let pipeline = Arc::clone(&self.pipeline);
                            let parser = self.parser;
                            let settings = self.settings;
                            let conn_shutdown = shutdown.subscribe();
                            let span = tracing::debug_span!("connection", id = %id, peer = %peer);
                            connections.spawn(
                                async move {
                                    let _permit = permit;
                                    let _guard = guard;
                                    tracing::debug!("connection opened");
                                    // drive() logs and records its own errors.
                                    let _ = connection::drive(
                                        stream, pipeline, parser, settings, conn_shutdown,
                                    )
                                    .await;
                                }
                                .instrument(span),
                            );
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "accept failed");
                        }
                    }
                }
                // Reap finished connection tasks as they complete.
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
                _ = accept_shutdown.recv() => break,
            }
        }

        tracing::info!(
            active = self.tracker.active(),
            drain_secs = self.drain.as_secs(),
            "shutdown: no longer accepting, draining connections"
        );

        if tokio::time::timeout(self.drain, self.tracker.wait_idle())
            .await
            .is_err()
        {
            tracing::warn!(
                remaining = self.tracker.active(),
                "drain deadline passed, force-closing remaining connections"
            );
            connections.abort_all();
        }
        while connections.join_next().await.is_some() {}

        tracing::info!("server stopped");
        Ok(())
    }

    fn pipeline_routes(&self) -> usize {
        self.pipeline.route_count()
    }
}
