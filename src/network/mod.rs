//! Network Module
//!
//! Listener accept loops, per-connection dispatch, socket factory seams, and
//! client connection pooling.
//!
//! ## Architecture
//! - One accept thread per started listener
//! - One worker thread per accepted connection
//! - Requests routed through the listener's handler chain

mod connection;
mod listener;
mod pool;
mod socket;

pub use pool::{ClientConnection, ConnectionPool};
pub use socket::{
    ClientSocketFactory, DefaultClientSocketFactory, DefaultServerSocketFactory,
    ServerSocketFactory, TransportUpgrade,
};

pub(crate) use listener::{start_listener, ListenerHandle};
