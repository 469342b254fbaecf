//! Client connections and connection pooling
//!
//! Produces client connections against a running listener and maintains a
//! bounded pool of idle connections.

use std::net::{SocketAddr, TcpStream};
use std::sync::Arc;

use crossbeam::queue::ArrayQueue;

use crate::error::{MemDirError, Result};
use crate::network::socket::{ClientSocketFactory, DefaultClientSocketFactory};

/// A client connection to a running listener
pub struct ClientConnection {
    stream: TcpStream,
    addr: SocketAddr,
}

impl ClientConnection {
    pub(crate) fn establish(
        addr: SocketAddr,
        factory: Option<&Arc<dyn ClientSocketFactory>>,
    ) -> Result<Self> {
        let default_factory = DefaultClientSocketFactory;
        let factory: &dyn ClientSocketFactory = match factory {
            Some(f) => f.as_ref(),
            None => &default_factory,
        };

        let stream = factory.connect(addr)?;
        stream.set_nodelay(true)?;
        Ok(Self { stream, addr })
    }

    /// The address the connection was established to
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The underlying stream, for callers that speak the wire protocol
    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }

    /// Mutable access to the underlying stream
    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }
}

/// A bounded pool of client connections to one listener.
///
/// Seeded with `initial` established connections; grows on demand up to
/// `max`. Connections checked back in beyond capacity are dropped (closed).
pub struct ConnectionPool {
    addr: SocketAddr,
    factory: Option<Arc<dyn ClientSocketFactory>>,
    idle: ArrayQueue<ClientConnection>,
    max_connections: usize,
}

impl ConnectionPool {
    pub(crate) fn establish(
        addr: SocketAddr,
        factory: Option<Arc<dyn ClientSocketFactory>>,
        initial_connections: usize,
        max_connections: usize,
    ) -> Result<Self> {
        if initial_connections < 1 {
            return Err(MemDirError::Config(
                "initial pool size must be at least 1".to_string(),
            ));
        }
        if max_connections < initial_connections {
            return Err(MemDirError::Config(format!(
                "maximum pool size {max_connections} is less than initial size \
                 {initial_connections}"
            )));
        }

        let idle = ArrayQueue::new(max_connections);

        // Establish the seed connections eagerly so a dead listener is
        // reported at pool creation, not first checkout.
        for _ in 0..initial_connections {
            let connection = ClientConnection::establish(addr, factory.as_ref())?;
            let _ = idle.push(connection);
        }

        Ok(Self {
            addr,
            factory,
            idle,
            max_connections,
        })
    }

    /// Check out a connection, establishing a new one if none are idle
    pub fn get(&self) -> Result<ClientConnection> {
        match self.idle.pop() {
            Some(connection) => Ok(connection),
            None => ClientConnection::establish(self.addr, self.factory.as_ref()),
        }
    }

    /// Return a connection to the pool; dropped if the pool is full
    pub fn release(&self, connection: ClientConnection) {
        let _ = self.idle.push(connection);
    }

    /// Number of currently idle connections
    pub fn idle_count(&self) -> usize {
        self.idle.len()
    }

    /// Configured maximum pool size
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}
