//! Shared utilities for integration testing.
//!
//! Tests speak raw HTTP/1.1 over `TcpStream` on purpose: the framing
//! produced by the server is itself under test, so a client library would
//! hide exactly the bytes we care about.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use trellis::pipeline::middleware::Chain;
use trellis::{Endpoints, Server, ServerConfig, Shutdown};

/// A server config suitable for tests: ephemeral port, no metrics
/// exporter, short drain.
pub fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.observability.metrics_enabled = false;
    config.timeouts.drain_secs = 2;
    config
}

/// Compile the endpoints, bind, and run the server on a background task.
pub async fn start_server(
    config: ServerConfig,
    endpoints: Endpoints,
) -> (SocketAddr, Arc<Shutdown>, tokio::task::JoinHandle<()>) {
    let table = endpoints.compile().expect("route compilation failed");
    let server = Server::bind(&config, table, Chain::new())
        .await
        .expect("bind failed");
    let addr = server.local_addr().unwrap();

    let shutdown = Arc::new(Shutdown::new());
    let handle = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            server.run(&shutdown).await.expect("server run failed");
        })
    };
    (addr, shutdown, handle)
}

/// One parsed response off the wire.
#[derive(Debug)]
pub struct RawResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RawResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A test client that keeps its connection open between requests.
pub struct RawClient {
    stream: TcpStream,
    buffer: Vec<u8>,
}

impl RawClient {
    pub async fn connect(addr: SocketAddr) -> Self {
        Self {
            stream: TcpStream::connect(addr).await.expect("connect failed"),
            buffer: Vec::new(),
        }
    }

    pub async fn send(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.expect("write failed");
    }

    /// Read until one complete response (per Content-Length) is buffered,
    /// then parse it out.
    pub async fn read_response(&mut self) -> RawResponse {
        loop {
            if let Some((response, consumed)) = try_parse_response(&self.buffer) {
                self.buffer.drain(..consumed);
                return response;
            }
            let mut chunk = [0u8; 4096];
            let n = self.stream.read(&mut chunk).await.expect("read failed");
            assert!(n > 0, "connection closed before a full response arrived");
            self.buffer.extend_from_slice(&chunk[..n]);
        }
    }

    /// Expect the server to close without further bytes.
    pub async fn expect_close(&mut self) {
        let mut chunk = [0u8; 256];
        let n = self.stream.read(&mut chunk).await.expect("read failed");
        assert_eq!(n, 0, "expected server to close the connection");
    }
}

/// Connect, send one request, read one response.
pub async fn request(addr: SocketAddr, bytes: &[u8]) -> RawResponse {
    let mut client = RawClient::connect(addr).await;
    client.send(bytes).await;
    client.read_response().await
}

/// Format a simple GET request.
pub fn get(path: &str) -> Vec<u8> {
    format!("GET {path} HTTP/1.1\r\nhost: test\r\n\r\n").into_bytes()
}

/// Format a request with a JSON body.
pub fn post_json(path: &str, body: &str) -> Vec<u8> {
    format!(
        "POST {path} HTTP/1.1\r\nhost: test\r\ncontent-type: application/json\r\ncontent-length: {}\r\n\r\n{body}",
        body.len()
    )
    .into_bytes()
}

fn try_parse_response(buffer: &[u8]) -> Option<(RawResponse, usize)> {
    let header_end = buffer.windows(4).position(|w| w == b"\r\n\r\n")?;
    let head = std::str::from_utf8(&buffer[..header_end]).ok()?;
    let mut lines = head.split("\r\n");

    let status_line = lines.next()?;
    let status: u16 = status_line.split(' ').nth(1)?.parse().ok()?;

    let headers: Vec<(String, String)> = lines
        .filter_map(|line| {
            let (k, v) = line.split_once(':')?;
            Some((k.trim().to_string(), v.trim().to_string()))
        })
        .collect();

    let content_length: usize = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .map(|(_, v)| v.parse().unwrap_or(0))
        .unwrap_or(0);

    let body_start = header_end + 4;
    if buffer.len() < body_start + content_length {
        return None;
    }
    let body =
        String::from_utf8_lossy(&buffer[body_start..body_start + content_length]).to_string();

    Some((
        RawResponse {
            status,
            headers,
            body,
        },
        body_start + content_length,
    ))
}
