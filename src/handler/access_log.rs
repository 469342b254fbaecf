//! Access-log middleware stage
//!
//! The outermost stage: records one line per request and one per result, so
//! every operation is accounted for, including ones a later stage rejects or
//! short-circuits before they reach the base handler.

use std::io::Write;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::protocol::{Control, RequestOp, ResponseMessage};

use super::{LogSink, OperationHandler};

/// Wraps an inner handler and writes access-log lines around each operation
pub struct AccessLogHandler {
    sink: LogSink,
    inner: Arc<dyn OperationHandler>,
}

impl AccessLogHandler {
    pub fn new(sink: LogSink, inner: Arc<dyn OperationHandler>) -> Self {
        Self { sink, inner }
    }

    fn write_line(&self, line: &str) {
        let mut sink = self.sink.lock();
        let _ = writeln!(sink, "{line}");
    }
}

impl OperationHandler for AccessLogHandler {
    fn process(
        &self,
        message_id: i32,
        request: &RequestOp,
        controls: &[Control],
    ) -> ResponseMessage {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);

        self.write_line(&format!(
            "[{now}] {} REQUEST msgID={message_id} target=\"{}\"",
            request.kind_name().to_uppercase(),
            request.target()
        ));

        let response = self.inner.process(message_id, request, controls);

        let result = response.op_result();
        self.write_line(&format!(
            "[{now}] {} RESULT msgID={message_id} resultCode={}",
            request.kind_name().to_uppercase(),
            result.code.int_value()
        ));

        response
    }
}
