//! Transport-upgrade middleware stage
//!
//! The innermost wrapper, present only on listeners configured with an
//! upgrade factory. Answers the StartTLS extended request itself instead of
//! forwarding it; the connection loop watches for the successful response and
//! performs the actual stream upgrade.

use std::sync::Arc;

use crate::protocol::{
    Control, OpResult, RequestOp, ResponseBody, ResponseMessage, ResultCode,
};

use super::OperationHandler;

/// OID of the StartTLS extended operation (RFC 4511 section 4.14)
pub const OID_START_TLS: &str = "1.3.6.1.4.1.1466.20037";

/// Short-circuits StartTLS extended requests for a listener that supports
/// transport upgrade; all other operations pass through to the inner handler.
pub struct StartTlsHandler {
    inner: Arc<dyn OperationHandler>,
}

impl StartTlsHandler {
    pub fn new(inner: Arc<dyn OperationHandler>) -> Self {
        Self { inner }
    }
}

impl OperationHandler for StartTlsHandler {
    fn process(
        &self,
        message_id: i32,
        request: &RequestOp,
        controls: &[Control],
    ) -> ResponseMessage {
        if let RequestOp::Extended { oid, .. } = request {
            if oid == OID_START_TLS {
                tracing::debug!(message_id, "Accepting StartTLS request");
                return ResponseMessage::new(
                    message_id,
                    ResponseBody::Extended {
                        result: OpResult::of(ResultCode::Success),
                        response_oid: Some(OID_START_TLS.to_string()),
                        response_value: None,
                    },
                );
            }
        }

        self.inner.process(message_id, request, controls)
    }
}
