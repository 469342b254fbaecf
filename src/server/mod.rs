//! Server Module
//!
//! The embeddable directory server: owns the frozen configuration, the
//! per-listener handler chains, and the set of running listeners, and exposes
//! the synchronous operation façade plus bulk-state coordination.
//!
//! ## Concurrency Model
//!
//! - All lifecycle operations and address/port/connection accessors are
//!   serialized under one exclusive lock per server instance.
//! - Operation dispatch (façade and network paths) is not serialized here;
//!   the backend must support full concurrent access.

mod bulk;
mod ops;

use std::net::{IpAddr, SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use crate::config::{DirectoryConfig, FrozenConfig, ListenerDefinition};
use crate::error::{MemDirError, Result};
use crate::handler::{build_listener_chain, DirectoryBackend, OperationHandler};
use crate::network::{
    start_listener, ClientConnection, ClientSocketFactory, ConnectionPool, ListenerHandle,
};

/// Pause between the stop and start phases of a restart, giving the OS time
/// to release the listen socket.
const RESTART_PAUSE: Duration = Duration::from_millis(100);

/// Registry slot for one configured listener. The definition and chain are
/// fixed at construction; only the assigned port and running handle change,
/// always under the registry lock.
struct ListenerSlot {
    /// Lowercase listener name, the lookup key
    key: String,
    definition: ListenerDefinition,
    chain: Arc<dyn OperationHandler>,
    /// Port recorded after a successful start; ephemeral listeners keep it
    /// across restarts.
    assigned_port: Option<u16>,
    running: Option<ListenerHandle>,
}

/// An embeddable, in-process directory-protocol server.
///
/// Callers either invoke operations directly through the façade methods
/// (bypassing the network entirely) or connect over a socket to a running
/// listener. Both paths converge on the same [`DirectoryBackend`], so
/// behavior is identical for in-process and networked invocations.
pub struct DirectoryServer {
    config: FrozenConfig,
    backend: Arc<dyn DirectoryBackend>,
    slots: Mutex<Vec<ListenerSlot>>,
}

impl DirectoryServer {
    /// Create a server from the given configuration and storage backend.
    ///
    /// The configuration is frozen here: listener definitions, log sinks, and
    /// codec can no longer change. Handler chains are built once per
    /// listener. No listener is started yet.
    pub fn new(config: DirectoryConfig, backend: Arc<dyn DirectoryBackend>) -> Result<Self> {
        let config = FrozenConfig::freeze(config)?;

        let base: Arc<dyn OperationHandler> = upcast(Arc::clone(&backend));
        let slots = config
            .listeners()
            .iter()
            .map(|definition| ListenerSlot {
                key: definition.name.to_lowercase(),
                definition: definition.clone(),
                chain: build_listener_chain(
                    Arc::clone(&base),
                    config.access_log(),
                    config.debug_log(),
                    definition.transport_upgrade.is_some(),
                ),
                assigned_port: None,
                running: None,
            })
            .collect();

        Ok(Self {
            config,
            backend,
            slots: Mutex::new(slots),
        })
    }

    /// The frozen configuration this server was built from
    pub fn config(&self) -> &FrozenConfig {
        &self.config
    }

    /// The storage backend, for callers that need direct access
    pub fn backend(&self) -> &Arc<dyn DirectoryBackend> {
        &self.backend
    }

    // =========================================================================
    // Listener lifecycle
    // =========================================================================

    /// Start every configured listener that is not already running.
    ///
    /// Best-effort: a bind failure for one listener does not prevent the
    /// others from starting. If any listener failed, a single aggregated
    /// error enumerating all failures is returned; successfully started
    /// listeners stay running.
    pub fn start_all(&self) -> Result<()> {
        let mut slots = self.slots.lock();
        self.start_all_locked(&mut slots)
    }

    /// Start the named listener. No-op if it is already running.
    pub fn start(&self, listener_name: &str) -> Result<()> {
        let mut slots = self.slots.lock();
        self.start_one_locked(&mut slots, listener_name)
    }

    /// Stop every running listener, best-effort; the running set is cleared
    /// unconditionally.
    pub fn stop_all(&self, close_existing_connections: bool) {
        let mut slots = self.slots.lock();
        stop_all_locked(&mut slots, close_existing_connections);
    }

    /// Stop the named listener. No-op if it is unknown or not running.
    pub fn stop(&self, listener_name: &str, close_existing_connections: bool) {
        let mut slots = self.slots.lock();
        let key = listener_name.to_lowercase();
        if let Some(slot) = slots.iter_mut().find(|s| s.key == key) {
            if let Some(handle) = slot.running.take() {
                handle.stop(close_existing_connections);
            }
        }
    }

    /// Stop all listeners (closing existing connections), pause briefly for
    /// socket release, then start all configured listeners.
    pub fn restart_all(&self) -> Result<()> {
        let mut slots = self.slots.lock();
        stop_all_locked(&mut slots, true);
        thread::sleep(RESTART_PAUSE);
        self.start_all_locked(&mut slots)
    }

    /// Restart the named listener: stop if running, pause, start.
    pub fn restart(&self, listener_name: &str) -> Result<()> {
        let mut slots = self.slots.lock();
        let key = listener_name.to_lowercase();
        if let Some(slot) = slots.iter_mut().find(|s| s.key == key) {
            if let Some(handle) = slot.running.take() {
                handle.stop(true);
            }
        }
        thread::sleep(RESTART_PAUSE);
        self.start_one_locked(&mut slots, listener_name)
    }

    fn start_all_locked(&self, slots: &mut [ListenerSlot]) -> Result<()> {
        let mut failures: Vec<(String, String)> = Vec::new();

        for slot in slots.iter_mut() {
            if slot.running.is_some() {
                continue;
            }

            if let Err(e) = self.start_slot(slot) {
                failures.push((slot.definition.name.clone(), e.to_string()));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(MemDirError::StartListeners(failures))
        }
    }

    fn start_one_locked(&self, slots: &mut [ListenerSlot], listener_name: &str) -> Result<()> {
        let key = listener_name.to_lowercase();
        let slot = slots
            .iter_mut()
            .find(|s| s.key == key)
            .ok_or_else(|| MemDirError::NoSuchListener(listener_name.to_string()))?;

        if slot.running.is_some() {
            return Ok(());
        }

        self.start_slot(slot)
    }

    fn start_slot(&self, slot: &mut ListenerSlot) -> Result<()> {
        let codec = self.config.codec().cloned().ok_or_else(|| {
            MemDirError::Config(
                "no wire codec configured; listeners cannot serve network connections"
                    .to_string(),
            )
        })?;

        // Reuse the port recorded by an earlier start so ephemeral listeners
        // keep their assignment across restarts when possible.
        let mut definition = slot.definition.clone();
        if let Some(port) = slot.assigned_port {
            definition.port = port;
        }

        let handle = start_listener(
            &definition,
            Arc::clone(&slot.chain),
            codec,
            self.config.exception_callback().cloned(),
        )?;

        slot.assigned_port = Some(handle.port());
        slot.running = Some(handle);
        Ok(())
    }

    // =========================================================================
    // Listener accessors
    // =========================================================================

    /// Name of the first configured listener, in configuration order, that is
    /// currently running.
    pub fn first_listener_name(&self) -> Option<String> {
        let slots = self.slots.lock();
        slots
            .iter()
            .find(|s| s.running.is_some())
            .map(|s| s.definition.name.clone())
    }

    /// Configured bind address for the named listener, or for the first
    /// running one when `listener_name` is `None`. `None` when the listener
    /// is unknown or has no explicitly configured address.
    pub fn listen_address(&self, listener_name: Option<&str>) -> Option<IpAddr> {
        let slots = self.slots.lock();
        resolve_slot(&slots, listener_name).and_then(|slot| slot.definition.address)
    }

    /// Bound port of the named listener, or of the first running one when
    /// `listener_name` is `None`. `None` when the listener is not running.
    pub fn listen_port(&self, listener_name: Option<&str>) -> Option<u16> {
        let slots = self.slots.lock();
        resolve_slot(&slots, listener_name)
            .and_then(|slot| slot.running.as_ref())
            .map(|handle| handle.port())
    }

    /// Number of open connections on the named listener, or on the first
    /// running one when `listener_name` is `None`. `None` when the listener
    /// is not running. Closed connections are untracked by their workers, so
    /// the count may trail a client disconnect briefly.
    pub fn active_connection_count(&self, listener_name: Option<&str>) -> Option<usize> {
        let slots = self.slots.lock();
        resolve_slot(&slots, listener_name)
            .and_then(|slot| slot.running.as_ref())
            .map(|handle| handle.connection_count())
    }

    /// Client socket factory of the named listener, or of the first running
    /// one when `listener_name` is `None`.
    pub fn client_socket_factory(
        &self,
        listener_name: Option<&str>,
    ) -> Option<Arc<dyn ClientSocketFactory>> {
        let slots = self.slots.lock();
        resolve_slot(&slots, listener_name)
            .and_then(|slot| slot.definition.client_socket_factory.clone())
    }

    // =========================================================================
    // Connection factory
    // =========================================================================

    /// Establish a client connection to the first running listener.
    pub fn connection(&self) -> Result<ClientConnection> {
        self.connection_to(None)
    }

    /// Establish a client connection to the named listener, or to the first
    /// running one when `listener_name` is `None`.
    pub fn connection_to(&self, listener_name: Option<&str>) -> Result<ClientConnection> {
        let slots = self.slots.lock();
        let (addr, factory) = resolve_connect_target(&slots, listener_name)?;
        ClientConnection::establish(addr, factory.as_ref())
    }

    /// Create a connection pool of `1..=max_connections` connections against
    /// the first running listener.
    pub fn connection_pool(&self, max_connections: usize) -> Result<ConnectionPool> {
        self.connection_pool_to(None, 1, max_connections)
    }

    /// Create a connection pool against the named listener (or first running
    /// when `None`), seeded with `initial_connections` and bounded by
    /// `max_connections`.
    pub fn connection_pool_to(
        &self,
        listener_name: Option<&str>,
        initial_connections: usize,
        max_connections: usize,
    ) -> Result<ConnectionPool> {
        let slots = self.slots.lock();
        let (addr, factory) = resolve_connect_target(&slots, listener_name)?;
        ConnectionPool::establish(addr, factory, initial_connections, max_connections)
    }
}

impl Drop for DirectoryServer {
    fn drop(&mut self) {
        let mut slots = self.slots.lock();
        stop_all_locked(&mut slots, true);
    }
}

fn stop_all_locked(slots: &mut [ListenerSlot], close_existing_connections: bool) {
    for slot in slots.iter_mut() {
        if let Some(handle) = slot.running.take() {
            handle.stop(close_existing_connections);
        }
    }
}

fn resolve_slot<'a>(
    slots: &'a [ListenerSlot],
    listener_name: Option<&str>,
) -> Option<&'a ListenerSlot> {
    match listener_name {
        Some(name) => {
            let key = name.to_lowercase();
            slots.iter().find(|s| s.key == key)
        }
        None => slots.iter().find(|s| s.running.is_some()),
    }
}

/// Resolve the effective connect address and client socket factory for a
/// listener selection, per the rules in the connection-factory contract.
fn resolve_connect_target(
    slots: &[ListenerSlot],
    listener_name: Option<&str>,
) -> Result<(SocketAddr, Option<Arc<dyn ClientSocketFactory>>)> {
    let slot = match listener_name {
        Some(name) => {
            let key = name.to_lowercase();
            let slot = slots
                .iter()
                .find(|s| s.key == key)
                .ok_or_else(|| MemDirError::NoSuchListener(name.to_string()))?;
            if slot.running.is_none() {
                return Err(MemDirError::ListenerNotRunning(name.to_string()));
            }
            slot
        }
        None => slots
            .iter()
            .find(|s| s.running.is_some())
            .ok_or(MemDirError::NoListenersAvailable)?,
    };

    let port = slot
        .running
        .as_ref()
        .map(|handle| handle.port())
        .unwrap_or_default();

    let address = match slot.definition.address {
        Some(addr) if !addr.is_unspecified() => addr,
        _ => local_host_address(port),
    };

    Ok((
        SocketAddr::new(address, port),
        slot.definition.client_socket_factory.clone(),
    ))
}

/// Resolve the local host's address, falling back to loopback.
fn local_host_address(port: u16) -> IpAddr {
    ("localhost", port)
        .to_socket_addrs()
        .ok()
        .and_then(|mut addrs| addrs.next())
        .map(|addr| addr.ip())
        .unwrap_or_else(|| IpAddr::V4(std::net::Ipv4Addr::LOCALHOST))
}

/// Arc upcast helper: `DirectoryBackend` to its `OperationHandler` supertrait
fn upcast(backend: Arc<dyn DirectoryBackend>) -> Arc<dyn OperationHandler> {
    struct Base(Arc<dyn DirectoryBackend>);

    impl OperationHandler for Base {
        fn process(
            &self,
            message_id: i32,
            request: &crate::protocol::RequestOp,
            controls: &[crate::protocol::Control],
        ) -> crate::protocol::ResponseMessage {
            self.0.process(message_id, request, controls)
        }
    }

    Arc::new(Base(backend))
}
