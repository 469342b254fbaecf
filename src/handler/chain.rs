//! Handler chain composition
//!
//! Builds the per-listener middleware chain once at server construction.
//! Order (outermost to innermost): access log -> debug log -> transport
//! upgrade -> base handler. The ordering is load-bearing: the access log must
//! see every operation, including StartTLS requests the upgrade stage
//! short-circuits, and the debug log must capture traffic after access-log
//! bookkeeping.

use std::sync::Arc;

use super::{AccessLogHandler, DebugLogHandler, LogSink, OperationHandler, StartTlsHandler};

/// Compose the middleware chain for one listener.
///
/// Each stage is optional and skipped when not configured. The access-log and
/// debug-log sinks are shared across all listeners; only `with_upgrade`
/// varies per listener.
pub fn build_listener_chain(
    base: Arc<dyn OperationHandler>,
    access_log: Option<&LogSink>,
    debug_log: Option<&LogSink>,
    with_upgrade: bool,
) -> Arc<dyn OperationHandler> {
    let mut chain = base;

    if with_upgrade {
        chain = Arc::new(StartTlsHandler::new(chain));
    }

    if let Some(sink) = debug_log {
        chain = Arc::new(DebugLogHandler::new(sink.clone(), chain));
    }

    if let Some(sink) = access_log {
        chain = Arc::new(AccessLogHandler::new(sink.clone(), chain));
    }

    chain
}
