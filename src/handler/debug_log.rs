//! Protocol-debug middleware stage
//!
//! Sits inside the access-log stage and outside the upgrade stage: captures
//! the full decoded request and response after access-log bookkeeping but
//! before any upgrade-specific short-circuiting.

use std::io::Write;
use std::sync::Arc;

use crate::protocol::{Control, RequestOp, ResponseMessage};

use super::{LogSink, OperationHandler};

/// Wraps an inner handler and dumps request/response debug representations
pub struct DebugLogHandler {
    sink: LogSink,
    inner: Arc<dyn OperationHandler>,
}

impl DebugLogHandler {
    pub fn new(sink: LogSink, inner: Arc<dyn OperationHandler>) -> Self {
        Self { sink, inner }
    }
}

impl OperationHandler for DebugLogHandler {
    fn process(
        &self,
        message_id: i32,
        request: &RequestOp,
        controls: &[Control],
    ) -> ResponseMessage {
        {
            let mut sink = self.sink.lock();
            let _ = writeln!(sink, ">> msgID={message_id} {request:?} controls={controls:?}");
        }

        let response = self.inner.process(message_id, request, controls);

        {
            let mut sink = self.sink.lock();
            let _ = writeln!(sink, "<< msgID={message_id} {response:?}");
        }

        response
    }
}
