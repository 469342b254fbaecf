//! Configuration for a directory server instance
//!
//! A mutable builder produces a [`DirectoryConfig`]; server construction
//! freezes it exactly once into a [`FrozenConfig`] that is never mutated
//! afterwards. Only the per-listener assigned-port slot (held by the server,
//! not here) changes after construction.

use std::net::IpAddr;
use std::sync::Arc;

use crate::error::MemDirError;
use crate::handler::LogSink;
use crate::network::{ClientSocketFactory, ServerSocketFactory, TransportUpgrade};
use crate::protocol::{ResultCode, WireCodec, DEFAULT_EXTENDED_FAILURE_CODES};

/// Callback invoked with the listener name when its accept loop hits an error
pub type ExceptionCallback = Arc<dyn Fn(&str, &MemDirError) + Send + Sync>;

/// Definition of one named listener. Immutable once the server is built.
#[derive(Clone)]
pub struct ListenerDefinition {
    /// Listener name, unique within a server (case-insensitive)
    pub name: String,

    /// Bind address; `None` means any local address
    pub address: Option<IpAddr>,

    /// Bind port; 0 requests an ephemeral port assigned at start
    pub port: u16,

    /// Factory for the accepting socket; `None` uses plain TCP
    pub server_socket_factory: Option<Arc<dyn ServerSocketFactory>>,

    /// Factory used when this layer creates client connections back to the
    /// listener; `None` uses plain TCP
    pub client_socket_factory: Option<Arc<dyn ClientSocketFactory>>,

    /// Transport-upgrade factory enabling StartTLS on this listener
    pub transport_upgrade: Option<Arc<dyn TransportUpgrade>>,
}

impl ListenerDefinition {
    /// A plain listener on an ephemeral port bound to any address
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: None,
            port: 0,
            server_socket_factory: None,
            client_socket_factory: None,
            transport_upgrade: None,
        }
    }

    pub fn with_address(mut self, address: IpAddr) -> Self {
        self.address = Some(address);
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_server_socket_factory(mut self, factory: Arc<dyn ServerSocketFactory>) -> Self {
        self.server_socket_factory = Some(factory);
        self
    }

    pub fn with_client_socket_factory(mut self, factory: Arc<dyn ClientSocketFactory>) -> Self {
        self.client_socket_factory = Some(factory);
        self
    }

    pub fn with_transport_upgrade(mut self, upgrade: Arc<dyn TransportUpgrade>) -> Self {
        self.transport_upgrade = Some(upgrade);
        self
    }
}

impl std::fmt::Debug for ListenerDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerDefinition")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("port", &self.port)
            .field("upgrade", &self.transport_upgrade.is_some())
            .finish()
    }
}

/// Mutable configuration for a directory server
#[derive(Clone, Default)]
pub struct DirectoryConfig {
    /// Listener definitions, in configuration order
    pub listeners: Vec<ListenerDefinition>,

    /// Sink for the access-log middleware stage; `None` disables the stage
    pub access_log: Option<LogSink>,

    /// Sink for the protocol-debug middleware stage; `None` disables it
    pub debug_log: Option<LogSink>,

    /// Wire codec for networked dispatch; listeners cannot start without one
    pub codec: Option<Arc<dyn WireCodec>>,

    /// Result codes treated as operational failures for extended operations
    /// carrying neither a response OID nor a response value. `None` uses the
    /// default set.
    pub extended_failure_codes: Option<Vec<ResultCode>>,

    /// Callback for accept-loop errors
    pub exception_callback: Option<ExceptionCallback>,
}

impl DirectoryConfig {
    /// Create a new config builder
    pub fn builder() -> DirectoryConfigBuilder {
        DirectoryConfigBuilder::default()
    }
}

/// Builder for DirectoryConfig
#[derive(Default)]
pub struct DirectoryConfigBuilder {
    config: DirectoryConfig,
}

impl DirectoryConfigBuilder {
    /// Add a listener definition
    pub fn listener(mut self, definition: ListenerDefinition) -> Self {
        self.config.listeners.push(definition);
        self
    }

    /// Set the access-log sink
    pub fn access_log(mut self, sink: LogSink) -> Self {
        self.config.access_log = Some(sink);
        self
    }

    /// Set the protocol-debug sink
    pub fn debug_log(mut self, sink: LogSink) -> Self {
        self.config.debug_log = Some(sink);
        self
    }

    /// Set the wire codec used for networked dispatch
    pub fn codec(mut self, codec: Arc<dyn WireCodec>) -> Self {
        self.config.codec = Some(codec);
        self
    }

    /// Override the extended-operation operational-failure code set
    pub fn extended_failure_codes(mut self, codes: Vec<ResultCode>) -> Self {
        self.config.extended_failure_codes = Some(codes);
        self
    }

    /// Set the accept-loop exception callback
    pub fn exception_callback(mut self, callback: ExceptionCallback) -> Self {
        self.config.exception_callback = Some(callback);
        self
    }

    pub fn build(self) -> DirectoryConfig {
        self.config
    }
}

/// Read-only view of the configuration, produced once at server construction
#[derive(Clone)]
pub struct FrozenConfig {
    listeners: Vec<ListenerDefinition>,
    access_log: Option<LogSink>,
    debug_log: Option<LogSink>,
    codec: Option<Arc<dyn WireCodec>>,
    extended_failure_codes: Vec<ResultCode>,
    exception_callback: Option<ExceptionCallback>,
}

impl FrozenConfig {
    /// One-time conversion from the mutable config. Rejects duplicate
    /// listener names (case-insensitive).
    pub fn freeze(config: DirectoryConfig) -> crate::error::Result<Self> {
        if config.listeners.is_empty() {
            return Err(MemDirError::Config(
                "at least one listener must be configured".to_string(),
            ));
        }

        let mut seen: Vec<String> = Vec::with_capacity(config.listeners.len());
        for definition in &config.listeners {
            let key = definition.name.to_lowercase();
            if key.is_empty() {
                return Err(MemDirError::Config(
                    "listener names must be non-empty".to_string(),
                ));
            }
            if seen.contains(&key) {
                return Err(MemDirError::Config(format!(
                    "duplicate listener name '{}'",
                    definition.name
                )));
            }
            seen.push(key);
        }

        Ok(Self {
            listeners: config.listeners,
            access_log: config.access_log,
            debug_log: config.debug_log,
            codec: config.codec,
            extended_failure_codes: config
                .extended_failure_codes
                .unwrap_or_else(|| DEFAULT_EXTENDED_FAILURE_CODES.to_vec()),
            exception_callback: config.exception_callback,
        })
    }

    pub fn listeners(&self) -> &[ListenerDefinition] {
        &self.listeners
    }

    pub fn access_log(&self) -> Option<&LogSink> {
        self.access_log.as_ref()
    }

    pub fn debug_log(&self) -> Option<&LogSink> {
        self.debug_log.as_ref()
    }

    pub fn codec(&self) -> Option<&Arc<dyn WireCodec>> {
        self.codec.as_ref()
    }

    pub fn extended_failure_codes(&self) -> &[ResultCode] {
        &self.extended_failure_codes
    }

    pub fn exception_callback(&self) -> Option<&ExceptionCallback> {
        self.exception_callback.as_ref()
    }
}
