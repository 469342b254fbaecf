//! Error types for memdir
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

use crate::protocol::{LdapResult, SearchResult};

/// Result type alias using MemDirError
pub type Result<T> = std::result::Result<T, MemDirError>;

/// Unified error type for memdir operations
#[derive(Debug, Error)]
pub enum MemDirError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No listener named '{0}' is configured")]
    NoSuchListener(String),

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Listener '{0}' is not running")]
    ListenerNotRunning(String),

    #[error("No listeners are currently running")]
    NoListenersAvailable,

    /// Aggregated best-effort start failures: one (name, message) pair per
    /// listener that failed to bind. Sibling listeners that started stay up.
    #[error("Failed to start listeners: {}", format_start_failures(.0))]
    StartListeners(Vec<(String, String)>),

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    /// The handler returned a response whose shape does not match the request.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// An operation completed with a non-success result code.
    #[error("Operation failed: {}", .0.summary())]
    Operation(Box<LdapResult>),

    /// A search completed with a non-success result code. Carries the partial
    /// result accumulated before the failure.
    #[error("Search failed: {}", .0.result.summary())]
    Search(Box<SearchResult>),

    // -------------------------------------------------------------------------
    // Parse Errors
    // -------------------------------------------------------------------------
    /// Malformed interchange-format input. Distinct from a rejected directory
    /// operation; server state is untouched.
    #[error("LDIF parse error: {0}")]
    LdifParse(String),

    // -------------------------------------------------------------------------
    // Assertion Errors
    // -------------------------------------------------------------------------
    /// A verification helper's expectation did not hold.
    #[error("Assertion failed: {0}")]
    Assertion(String),
}

impl MemDirError {
    /// The protocol result carried by this error, if it wraps one.
    pub fn ldap_result(&self) -> Option<&LdapResult> {
        match self {
            MemDirError::Operation(result) => Some(result),
            MemDirError::Search(result) => Some(&result.result),
            _ => None,
        }
    }
}

fn format_start_failures(failures: &[(String, String)]) -> String {
    let parts: Vec<String> = failures
        .iter()
        .map(|(name, message)| format!("{name}: {message}"))
        .collect();
    parts.join("; ")
}
