//! Listener accept loop
//!
//! One accept thread per started listener, polling a non-blocking socket so
//! the shutdown flag is observed promptly. Accepted connections are handed to
//! per-connection worker threads.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::{ExceptionCallback, ListenerDefinition};
use crate::error::Result;
use crate::handler::OperationHandler;
use crate::network::connection::ConnectionWorker;
use crate::network::socket::{DefaultServerSocketFactory, ServerSocketFactory, TransportUpgrade};
use crate::protocol::WireCodec;

/// Poll interval of the accept loop while no connection is pending
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Ids for tracked connections, so a worker can drop its own entry on exit
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(0);

/// Open connections tracked for forced shutdown, keyed by connection id
type ConnectionTable = Arc<Mutex<Vec<(u64, TcpStream)>>>;

/// A running listener: exists only while active, owned by the registry
pub(crate) struct ListenerHandle {
    name: String,
    port: u16,
    shutdown: Arc<AtomicBool>,
    accept_thread: Option<JoinHandle<()>>,
    connections: ConnectionTable,
}

impl ListenerHandle {
    /// The network port actually bound
    pub(crate) fn port(&self) -> u16 {
        self.port
    }

    /// Number of connections currently tracked for forced shutdown
    pub(crate) fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Stop accepting connections; optionally shut down existing ones.
    pub(crate) fn stop(mut self, close_existing_connections: bool) {
        self.shutdown.store(true, Ordering::SeqCst);

        if close_existing_connections {
            let connections = self.connections.lock();
            for (_, stream) in connections.iter() {
                let _ = stream.shutdown(std::net::Shutdown::Both);
            }
        }

        if let Some(handle) = self.accept_thread.take() {
            if handle.join().is_err() {
                tracing::warn!(listener = %self.name, "Accept thread panicked during shutdown");
            }
        }

        tracing::info!(listener = %self.name, port = self.port, "Listener stopped");
    }
}

/// Bind and start a listener from its definition.
///
/// Returns a handle holding the accept thread and the bound port (which may
/// differ from the configured one when an ephemeral port was requested).
pub(crate) fn start_listener(
    definition: &ListenerDefinition,
    chain: Arc<dyn OperationHandler>,
    codec: Arc<dyn WireCodec>,
    exception_callback: Option<ExceptionCallback>,
) -> Result<ListenerHandle> {
    let bind_addr = SocketAddr::new(
        definition
            .address
            .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED)),
        definition.port,
    );

    let default_factory = DefaultServerSocketFactory;
    let factory: &dyn ServerSocketFactory = definition
        .server_socket_factory
        .as_deref()
        .unwrap_or(&default_factory);

    let socket = factory.bind(bind_addr)?;
    socket.set_nonblocking(true)?;
    let port = socket.local_addr()?.port();

    let name = definition.name.clone();
    let shutdown = Arc::new(AtomicBool::new(false));
    let connections: ConnectionTable = Arc::new(Mutex::new(Vec::new()));

    let accept_thread = {
        let name = name.clone();
        let shutdown = Arc::clone(&shutdown);
        let connections = Arc::clone(&connections);
        let upgrade = definition.transport_upgrade.clone();

        thread::Builder::new()
            .name(format!("memdir-listener-{name}"))
            .spawn(move || {
                accept_loop(
                    &name,
                    &socket,
                    &shutdown,
                    &connections,
                    chain,
                    codec,
                    upgrade,
                    exception_callback,
                );
            })?
    };

    tracing::info!(listener = %name, port, "Listener started");

    Ok(ListenerHandle {
        name,
        port,
        shutdown,
        accept_thread: Some(accept_thread),
        connections,
    })
}

#[allow(clippy::too_many_arguments)]
fn accept_loop(
    name: &str,
    socket: &TcpListener,
    shutdown: &AtomicBool,
    connections: &ConnectionTable,
    chain: Arc<dyn OperationHandler>,
    codec: Arc<dyn WireCodec>,
    upgrade: Option<Arc<dyn TransportUpgrade>>,
    exception_callback: Option<ExceptionCallback>,
) {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            return;
        }

        match socket.accept() {
            Ok((stream, peer)) => {
                tracing::debug!(listener = %name, %peer, "Accepted connection");

                if let Err(e) = dispatch_connection(
                    name,
                    stream,
                    connections,
                    Arc::clone(&chain),
                    Arc::clone(&codec),
                    upgrade.clone(),
                ) {
                    report_error(name, &e.into(), &exception_callback);
                }
            }
            Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => {
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
            Err(e) => {
                report_error(name, &e.into(), &exception_callback);
                thread::sleep(ACCEPT_POLL_INTERVAL);
            }
        }
    }
}

fn dispatch_connection(
    listener_name: &str,
    stream: TcpStream,
    connections: &ConnectionTable,
    chain: Arc<dyn OperationHandler>,
    codec: Arc<dyn WireCodec>,
    upgrade: Option<Arc<dyn TransportUpgrade>>,
) -> io::Result<()> {
    // The accepted socket inherits non-blocking mode from the acceptor.
    stream.set_nonblocking(false)?;
    stream.set_nodelay(true)?;

    let connection_id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
    connections.lock().push((connection_id, stream.try_clone()?));

    let name = listener_name.to_string();
    let connections = Arc::clone(connections);
    thread::Builder::new()
        .name(format!("memdir-conn-{listener_name}"))
        .spawn(move || {
            let worker = ConnectionWorker::new(stream, chain, codec, upgrade);
            if let Err(e) = worker.run() {
                tracing::warn!(listener = %name, "Connection terminated with error: {e}");
            }
            // Untrack the connection so the cloned fd is released.
            connections.lock().retain(|(id, _)| *id != connection_id);
        })?;

    Ok(())
}

fn report_error(name: &str, error: &crate::error::MemDirError, callback: &Option<ExceptionCallback>) {
    tracing::warn!(listener = %name, "Listener error: {error}");
    if let Some(callback) = callback {
        callback(name, error);
    }
}
