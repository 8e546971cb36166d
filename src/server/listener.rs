//! Bounded TCP accept.
//!
//! # Responsibilities
//! - Bind the configured address
//! - Accept connections, capped by a semaphore
//!
//! The cap is applied before `accept`: when every slot is taken the
//! listener simply stops accepting, so pending clients queue in the
//! kernel backlog instead of being rejected at the socket level. Each
//! accepted connection holds a permit that returns on drop, panics
//! included.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::ListenerConfig;
use crate::error::StartupError;

#[derive(Debug)]
pub struct Listener {
    inner: TcpListener,
    connection_limit: Arc<Semaphore>,
    max_connections: usize,
}

impl Listener {
    /// Bind to the configured address. Failure here is fatal to startup.
    pub async fn bind(config: &ListenerConfig) -> Result<Self, StartupError> {
        let addr: SocketAddr =
            config
                .bind_address
                .parse()
                .map_err(|e| StartupError::Bind {
                    addr: config.bind_address.clone(),
                    source: std::io::Error::new(std::io::ErrorKind::InvalidInput, e),
                })?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| StartupError::Bind {
                addr: config.bind_address.clone(),
                source,
            })?;

        let local_addr = listener.local_addr().map_err(|source| StartupError::Bind {
            addr: config.bind_address.clone(),
            source,
        })?;

        tracing::info!(
            address = %local_addr,
            max_connections = config.max_connections,
            "listener bound"
        );

        Ok(Self {
            inner: listener,
            connection_limit: Arc::new(Semaphore::new(config.max_connections)),
            max_connections: config.max_connections,
        })
    }

    /// Accept the next connection, waiting for a free slot first.
    pub async fn accept(
        &self,
    ) -> Result<(TcpStream, SocketAddr, ConnectionPermit), std::io::Error> {
        let permit = self
            .connection_limit
            .clone()
            .acquire_owned()
            .await
            .expect("connection semaphore closed");

        let (stream, addr) = self.inner.accept().await?;

        tracing::debug!(
            peer_addr = %addr,
            available_slots = self.connection_limit.available_permits(),
            "connection accepted"
        );

        Ok((stream, addr, ConnectionPermit { _permit: permit }))
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    pub fn available_slots(&self) -> usize {
        self.connection_limit.available_permits()
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

/// A held connection slot; dropping it frees the slot.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(addr: &str, max: usize) -> ListenerConfig {
        ListenerConfig {
            bind_address: addr.to_string(),
            max_connections: max,
        }
    }

    #[tokio::test]
    async fn binds_to_ephemeral_port() {
        let listener = Listener::bind(&config("127.0.0.1:0", 4)).await.unwrap();
        assert_eq!(listener.available_slots(), 4);
        assert_ne!(listener.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn invalid_address_is_a_bind_error() {
        let err = Listener::bind(&config("not-an-address", 4)).await.unwrap_err();
        assert!(matches!(err, StartupError::Bind { .. }));
    }

    #[tokio::test]
    async fn permits_return_on_drop() {
        let listener = Listener::bind(&config("127.0.0.1:0", 1)).await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = TcpStream::connect(addr).await.unwrap();
        let (_stream, _peer, permit) = listener.accept().await.unwrap();
        assert_eq!(listener.available_slots(), 0);

        drop(permit);
        assert_eq!(listener.available_slots(), 1);
        drop(client);
    }
}
