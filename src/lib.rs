//! # memdir
//!
//! An embeddable, in-process directory-protocol server for testing directory
//! clients, with:
//! - Named listeners with independent start/stop/restart lifecycle
//! - A synchronous operation façade bypassing the network entirely
//! - A handler chain per listener (access log, debug log, transport upgrade)
//! - Snapshot/restore and atomic LDIF import/export
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │          Façade Callers            Network Clients           │
//! └─────────┬───────────────────────────────────┬───────────────┘
//!           │                                   │
//!           │                     ┌─────────────▼──────────────┐
//!           │                     │    Listeners (per name)     │
//!           │                     │  accept loop + wire codec   │
//!           │                     └─────────────┬──────────────┘
//!           │                                   │
//!           │                     ┌─────────────▼──────────────┐
//!           │                     │       Handler Chain         │
//!           │                     │ access log → debug log →    │
//!           │                     │ transport upgrade           │
//!           │                     └─────────────┬──────────────┘
//!           │                                   │
//! ┌─────────▼───────────────────────────────────▼───────────────┐
//! │                    Directory Backend                         │
//! │        (entries, matching, schema, changelog)                │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Both invocation paths converge on the same backend, so in-process and
//! networked calls observe identical behavior.

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod handler;
pub mod network;
pub mod ldif;
pub mod server;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::{
    DirectoryConfig, DirectoryConfigBuilder, ExceptionCallback, FrozenConfig, ListenerDefinition,
};
pub use error::{MemDirError, Result};
pub use handler::{log_sink, DirectoryBackend, LogSink, OperationHandler, Snapshot};
pub use network::{
    ClientConnection, ClientSocketFactory, ConnectionPool, ServerSocketFactory, TransportUpgrade,
};
pub use protocol::{
    Attribute, BindRequest, BindResult, CompareResult, Control, Entry, ExtendedResult, LdapResult,
    Modification, ModificationType, OpResult, RequestOp, ResponseBody, ResponseMessage, ResultCode,
    SearchEntry, SearchListener, SearchReference, SearchRequest, SearchResult, SearchScope,
    WireCodec, OID_INTERNAL_OPERATION_REQUEST_CONTROL,
};
pub use server::DirectoryServer;

// =============================================================================
// Version Info
// =============================================================================

/// Crate version string
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
