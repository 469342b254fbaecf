//! Socket factory seams
//!
//! Listener sockets, client sockets, and transport upgrades are created
//! through these traits so tests and TLS-capable callers can substitute their
//! own implementations.

use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};

/// Creates the server socket a listener accepts connections on
pub trait ServerSocketFactory: Send + Sync {
    fn bind(&self, addr: SocketAddr) -> io::Result<TcpListener>;
}

/// Plain TCP server sockets
#[derive(Debug, Default)]
pub struct DefaultServerSocketFactory;

impl ServerSocketFactory for DefaultServerSocketFactory {
    fn bind(&self, addr: SocketAddr) -> io::Result<TcpListener> {
        TcpListener::bind(addr)
    }
}

/// Creates client connections to a listener
pub trait ClientSocketFactory: Send + Sync {
    fn connect(&self, addr: SocketAddr) -> io::Result<TcpStream>;
}

/// Plain TCP client sockets
#[derive(Debug, Default)]
pub struct DefaultClientSocketFactory;

impl ClientSocketFactory for DefaultClientSocketFactory {
    fn connect(&self, addr: SocketAddr) -> io::Result<TcpStream> {
        TcpStream::connect(addr)
    }
}

/// Upgrades an established connection's transport in place, e.g. wrapping it
/// in TLS after a successful StartTLS exchange.
pub trait TransportUpgrade: Send + Sync {
    fn upgrade(&self, stream: TcpStream) -> io::Result<TcpStream>;
}
