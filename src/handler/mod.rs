//! Handler Module
//!
//! The operation-handler contract consumed by the listeners and the façade,
//! the storage-backend contract, opaque snapshots, and the middleware chain
//! wrapped around the base handler.
//!
//! ## Architecture
//! - `OperationHandler`: one `process` entry point for all operation kinds
//! - Middleware stages decorate the base handler, each owning the next stage
//! - Chain order: access log -> debug log -> transport upgrade -> base

mod access_log;
mod chain;
mod debug_log;
mod start_tls;

use std::any::Any;
use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::Result;
use crate::protocol::{Control, Entry, RequestOp, ResponseMessage};

pub use access_log::AccessLogHandler;
pub use chain::build_listener_chain;
pub use debug_log::DebugLogHandler;
pub use start_tls::{StartTlsHandler, OID_START_TLS};

/// Processes one protocol operation and produces a response message.
///
/// This is the convergence point for both invocation paths: the façade calls
/// it directly, and networked listeners call it with decoded wire messages.
/// Failures are expressed as result codes in the response, never as panics.
/// Implementations must support full concurrent access.
pub trait OperationHandler: Send + Sync {
    fn process(&self, message_id: i32, request: &RequestOp, controls: &[Control])
        -> ResponseMessage;
}

/// The storage-engine contract: operation processing plus the entry-lookup
/// and bulk-state operations used by convenience methods that bypass full
/// protocol round-tripping.
///
/// Entry matching, filter evaluation, schema, and changelog semantics all
/// live behind this trait.
pub trait DirectoryBackend: OperationHandler {
    /// Whether an entry with the given DN exists
    fn entry_exists(&self, dn: &str) -> Result<bool>;

    /// Whether an entry with the given DN exists and matches the filter
    fn entry_exists_matching(&self, dn: &str, filter: &str) -> Result<bool>;

    /// Fetch an entry by DN
    fn get_entry(&self, dn: &str) -> Result<Option<Entry>>;

    /// Number of entries held, optionally including changelog entries
    fn count_entries(&self, include_changelog: bool) -> Result<usize>;

    /// Number of entries at or below the given base DN
    fn count_entries_below(&self, base_dn: &str) -> Result<usize>;

    /// Remove all entries
    fn clear(&self) -> Result<()>;

    /// Remove the given entry and all subordinates; returns the count removed
    fn delete_subtree(&self, base_dn: &str) -> Result<usize>;

    /// All current entries, for export. Generated operational attributes
    /// and/or changelog entries may be excluded per flags.
    fn export_entries(&self, exclude_generated: bool, exclude_changelog: bool)
        -> Result<Vec<Entry>>;

    /// Capture a point-in-time snapshot of all directory content
    fn create_snapshot(&self) -> Snapshot;

    /// Restore previously captured content
    fn restore_snapshot(&self, snapshot: &Snapshot);
}

/// An opaque, restorable capture of full directory state. The coordinating
/// layer holds only the reference; the backend owns the representation.
#[derive(Clone)]
pub struct Snapshot {
    state: Arc<dyn Any + Send + Sync>,
}

impl Snapshot {
    /// Wrap a backend-owned state capture
    pub fn new<T: Any + Send + Sync>(state: T) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Downcast to the backend's concrete state type
    pub fn downcast_ref<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.state.downcast_ref()
    }
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Snapshot(..)")
    }
}

/// A shared line-oriented log sink for the access-log and debug-log stages
pub type LogSink = Arc<Mutex<Box<dyn Write + Send>>>;

/// Wrap a writer as a shared log sink
pub fn log_sink<W: Write + Send + 'static>(writer: W) -> LogSink {
    Arc::new(Mutex::new(Box::new(writer)))
}
