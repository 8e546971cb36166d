//! Bounded handler pool.
//!
//! # Responsibilities
//! - Cap concurrent handler invocations (workers + queue slots as one
//!   semaphore)
//! - Isolate handler panics from the I/O tasks
//! - Run blocking-marked handlers on the runtime's blocking pool
//! - Enforce the cooperative handler timeout
//!
//! Submission awaits a permit, so a saturated pool pushes back on the
//! submitting connection's pipeline slot only; other connections keep
//! being accepted, parsed, and queued. A timed-out handler is not
//! interrupted: its task keeps the permit until it actually finishes and
//! its result is discarded.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::error::HandlerFault;
use crate::handler::reply::{Problem, Reply};
use crate::handler::Args;
use crate::route::RouteRef;

#[derive(Clone)]
pub struct HandlerPool {
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl HandlerPool {
    /// `max_in_flight` covers running plus queued invocations.
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_in_flight)),
            capacity: max_in_flight,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits currently free; zero means submissions will wait.
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Invoke a route's handler. Waits for pool capacity, then runs the
    /// handler as its own task so a panic never unwinds into the caller.
    /// `timeout_secs == 0` disables the timeout.
    pub async fn invoke(
        &self,
        route: &RouteRef,
        args: Args,
        timeout_secs: u64,
    ) -> Result<Result<Reply, Problem>, HandlerFault> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| HandlerFault::Failed("handler pool is shut down".to_string()))?;

        // The permit lives inside the handler task, so capacity is released
        // exactly when the handler finishes, even if this caller goes away
        // with its connection.
        let fut = route.handler.call(args);
        let mut join = if route.blocking {
            let handle = tokio::runtime::Handle::current();
            tokio::task::spawn_blocking(move || {
                let _permit = permit;
                handle.block_on(fut)
            })
        } else {
            tokio::spawn(async move {
                let _permit = permit;
                fut.await
            })
        };

        let result = if timeout_secs == 0 {
            (&mut join).await
        } else {
            match tokio::time::timeout(Duration::from_secs(timeout_secs), &mut join).await {
                Ok(res) => res,
                Err(_elapsed) => {
                    let pattern = route.pattern.clone();
                    // The task runs on holding its permit; only the result
                    // is discarded.
                    tokio::spawn(async move {
                        match join.await {
                            Ok(_) => tracing::debug!(
                                pattern = %pattern,
                                "handler finished after timeout; result discarded"
                            ),
                            Err(e) if e.is_panic() => tracing::debug!(
                                pattern = %pattern,
                                "handler panicked after timeout"
                            ),
                            Err(_) => {}
                        }
                    });
                    return Err(HandlerFault::Timeout(timeout_secs));
                }
            }
        };

        match result {
            Ok(outcome) => Ok(outcome),
            Err(join_err) if join_err.is_panic() => Err(HandlerFault::Panicked),
            Err(join_err) => Err(HandlerFault::Failed(join_err.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler_fn;
    use crate::route::model::Route;
    use crate::route::Segment;
    use http::Method;

    fn route_with(handler: crate::handler::HandlerRef, blocking: bool) -> RouteRef {
        Arc::new(Route {
            method: Method::GET,
            pattern: "/test".to_string(),
            segments: vec![Segment::Literal("test".into())],
            handler,
            params: Vec::new(),
            produces: "application/json".to_string(),
            blocking,
        })
    }

    #[tokio::test]
    async fn invokes_and_releases_permit() {
        let pool = HandlerPool::new(2);
        let route = route_with(
            handler_fn(|_| async { Ok(Reply::text("done")) }),
            false,
        );
        let reply = pool.invoke(&route, Args::default(), 0).await.unwrap().unwrap();
        assert_eq!(reply.status(), http::StatusCode::OK);
        assert_eq!(pool.available(), 2);
    }

    #[tokio::test]
    async fn saturation_blocks_submission_until_release() {
        let pool = HandlerPool::new(1);
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let release_rx = std::sync::Mutex::new(Some(release_rx));

        let slow = route_with(
            handler_fn(move |_| {
                let rx = release_rx.lock().unwrap().take();
                async move {
                    if let Some(rx) = rx {
                        let _ = rx.await;
                    }
                    Ok(Reply::no_content())
                }
            }),
            false,
        );

        let pool2 = pool.clone();
        let slow2 = slow.clone();
        let first = tokio::spawn(async move { pool2.invoke(&slow2, Args::default(), 0).await });

        // Wait until the slow handler owns the only permit.
        while pool.available() != 0 {
            tokio::task::yield_now().await;
        }

        let fast = route_with(handler_fn(|_| async { Ok(Reply::no_content()) }), false);
        let pool3 = pool.clone();
        let second = tokio::spawn(async move { pool3.invoke(&fast, Args::default(), 0).await });

        // The second invocation cannot complete while the permit is held.
        tokio::task::yield_now().await;
        assert!(!second.is_finished());

        release_tx.send(()).unwrap();
        first.await.unwrap().unwrap().unwrap();
        second.await.unwrap().unwrap().unwrap();
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test]
    async fn panic_is_contained() {
        let pool = HandlerPool::new(1);
        let route = route_with(handler_fn(|_| async { panic!("boom") }), false);
        let err = pool.invoke(&route, Args::default(), 0).await.unwrap_err();
        assert!(matches!(err, HandlerFault::Panicked));
        // The permit is back despite the panic.
        assert_eq!(pool.available(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_discards_result() {
        let pool = HandlerPool::new(1);
        let route = route_with(
            handler_fn(|_| async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(Reply::no_content())
            }),
            false,
        );
        let err = pool.invoke(&route, Args::default(), 1).await.unwrap_err();
        assert!(matches!(err, HandlerFault::Timeout(1)));
    }

    #[tokio::test]
    async fn blocking_route_runs_on_blocking_pool() {
        let pool = HandlerPool::new(1);
        let route = route_with(
            handler_fn(|_| async {
                // Deliberately blocking work.
                std::thread::sleep(Duration::from_millis(10));
                Ok(Reply::text("blocked"))
            }),
            true,
        );
        let reply = pool.invoke(&route, Args::default(), 0).await.unwrap().unwrap();
        assert_eq!(reply.status(), http::StatusCode::OK);
    }

    #[tokio::test]
    async fn problem_passes_through_as_declared_mapping() {
        let pool = HandlerPool::new(1);
        let route = route_with(
            handler_fn(|_| async { Err(Problem::conflict("already exists")) }),
            false,
        );
        let problem = pool
            .invoke(&route, Args::default(), 0)
            .await
            .unwrap()
            .unwrap_err();
        assert_eq!(problem.status(), http::StatusCode::CONFLICT);
    }
}
