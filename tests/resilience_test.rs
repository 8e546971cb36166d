//! Fault isolation, overload, and lifecycle behavior.

use std::time::Duration;

use trellis::{Endpoint, Endpoints, Reply};

mod common;

fn faulty_endpoints() -> Endpoints {
    Endpoints::new()
        .mount(Endpoint::get("/ok", |_args| async { Ok(Reply::text("ok")) }))
        .mount(Endpoint::get("/panic", |_args| async { panic!("handler exploded") }))
        .mount(Endpoint::get("/sleep/{ms}", |args: trellis::Args| async move {
            let ms: u64 = args.parse("ms").map_err(|e| {
                trellis::Problem::new(http::StatusCode::BAD_REQUEST, e.to_string())
            })?;
            tokio::time::sleep(Duration::from_millis(ms)).await;
            Ok(Reply::text("woke"))
        }))
}

#[tokio::test]
async fn handler_panic_is_isolated_to_one_exchange() {
    let (addr, shutdown, _h) = common::start_server(common::test_config(), faulty_endpoints()).await;

    // Connection B has a request in flight while A's handler panics.
    let mut conn_b = common::RawClient::connect(addr).await;
    conn_b.send(&common::get("/sleep/100")).await;

    let mut conn_a = common::RawClient::connect(addr).await;
    conn_a.send(&common::get("/panic")).await;
    let resp = conn_a.read_response().await;
    assert_eq!(resp.status, 500);

    // A stays open and serves the next request.
    conn_a.send(&common::get("/ok")).await;
    let resp = conn_a.read_response().await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body, "ok");

    // B is unaffected.
    let resp = conn_b.read_response().await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body, "woke");

    shutdown.trigger();
}

#[tokio::test]
async fn saturated_pool_still_accepts_and_serves_everyone() {
    let mut config = common::test_config();
    config.handler_pool.workers = 1;
    config.handler_pool.queue_depth = 0;
    let (addr, shutdown, _h) = common::start_server(config, faulty_endpoints()).await;

    // More concurrent slow requests than the pool has capacity for. New
    // connections must still be accepted and parsed; submissions queue at
    // the pool and every request eventually completes.
    let mut tasks = Vec::new();
    for _ in 0..6 {
        tasks.push(tokio::spawn(async move {
            common::request(addr, &common::get("/sleep/50")).await
        }));
    }
    for task in tasks {
        let resp = task.await.unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body, "woke");
    }

    shutdown.trigger();
}

#[tokio::test]
async fn handler_timeout_answers_504() {
    let mut config = common::test_config();
    config.timeouts.handler_secs = 1;
    let (addr, shutdown, _h) = common::start_server(config, faulty_endpoints()).await;

    let resp = common::request(addr, &common::get("/sleep/5000")).await;
    assert_eq!(resp.status, 504);

    shutdown.trigger();
}

#[tokio::test]
async fn slow_reader_still_gets_every_response_in_order() {
    let mut config = common::test_config();
    config.connection.high_watermark_bytes = 1024;
    config.connection.low_watermark_bytes = 256;
    let endpoints = Endpoints::new().mount(Endpoint::get("/big", |_args| async {
        Ok(Reply::text("x".repeat(8 * 1024)))
    }));
    let (addr, shutdown, _h) = common::start_server(config, endpoints).await;

    // Pipeline ten large responses while reading nothing, so buffered
    // output crosses the high watermark and the read side pauses.
    let mut client = common::RawClient::connect(addr).await;
    let mut batch = Vec::new();
    for _ in 0..10 {
        batch.extend_from_slice(&common::get("/big"));
    }
    client.send(&batch).await;
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Once the client drains, reading resumes and nothing is lost.
    for _ in 0..10 {
        let resp = client.read_response().await;
        assert_eq!(resp.status, 200);
        assert_eq!(resp.body.len(), 8 * 1024);
    }

    shutdown.trigger();
}

#[tokio::test]
async fn idle_connection_is_closed() {
    let mut config = common::test_config();
    config.timeouts.idle_secs = 1;
    let (addr, shutdown, _h) = common::start_server(config, faulty_endpoints()).await;

    let mut client = common::RawClient::connect(addr).await;
    // Send nothing; the server should hang up after the idle window.
    client.expect_close().await;

    shutdown.trigger();
}

#[tokio::test]
async fn graceful_shutdown_drains_in_flight_requests() {
    let (addr, shutdown, handle) = common::start_server(common::test_config(), faulty_endpoints()).await;

    let mut client = common::RawClient::connect(addr).await;
    client.send(&common::get("/sleep/200")).await;
    // Let the request reach the handler before triggering shutdown.
    tokio::time::sleep(Duration::from_millis(50)).await;

    shutdown.trigger();

    // The in-flight request still completes.
    let resp = client.read_response().await;
    assert_eq!(resp.status, 200);
    assert_eq!(resp.body, "woke");

    handle.await.unwrap();

    // Shutting down an already-drained server is a no-op.
    shutdown.trigger();
}

#[tokio::test]
async fn connection_limit_queues_but_serves() {
    let mut config = common::test_config();
    config.listener.max_connections = 1;
    let (addr, shutdown, _h) = common::start_server(config, faulty_endpoints()).await;

    // First connection holds the only slot until it asks to close.
    let mut first = common::RawClient::connect(addr).await;
    first
        .send(b"GET /ok HTTP/1.1\r\nhost: t\r\nconnection: close\r\n\r\n")
        .await;

    // Second connection sits in the backlog (not rejected) and is served
    // once the first slot frees.
    let second = tokio::spawn(async move {
        common::request(addr, &common::get("/ok")).await
    });

    let resp = first.read_response().await;
    assert_eq!(resp.status, 200);
    first.expect_close().await;

    let resp = second.await.unwrap();
    assert_eq!(resp.status, 200);

    shutdown.trigger();
}
